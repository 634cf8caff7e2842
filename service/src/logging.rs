use crate::config::{Config, RustEnv};
use log::LevelFilter;
use simplelog::{self, CombinedLogger, ConfigBuilder, SharedLogger, WriteLogger};
use std::fs::OpenOptions;
use std::io;

/// Modules to filter out from logging when not in Trace mode.
/// These are typically verbose dependencies that clutter normal log output.
const FILTERED_MODULES: &[&str] = &[
    "sqlx", "sea_orm", "tower", "tracing", "hyper", "axum", "reqwest", "rustls",
];

pub struct Logger {}

impl Logger {
    /// Initializes the global logger with configuration based on the provided Config.
    ///
    /// Output always goes to the terminal, colored only in development. When
    /// `log_file` is configured the same records are appended to that file as well.
    pub fn init_logger(config: &Config) -> io::Result<()> {
        let log_level_filter = Self::convert_level_filter(config.log_level_filter);
        let apply_filters = Self::should_filter_dependencies(config.log_level_filter);

        let mut loggers: Vec<Box<dyn SharedLogger>> = vec![simplelog::TermLogger::new(
            log_level_filter,
            Self::build_log_config(apply_filters),
            simplelog::TerminalMode::Mixed,
            Self::color_choice(&config.runtime_env),
        )];

        if let Some(path) = &config.log_file {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            loggers.push(WriteLogger::new(
                log_level_filter,
                Self::build_log_config(apply_filters),
                file,
            ));
        }

        CombinedLogger::init(loggers).map_err(io::Error::other)
    }

    /// Converts log::LevelFilter to simplelog::LevelFilter.
    fn convert_level_filter(level: LevelFilter) -> simplelog::LevelFilter {
        match level {
            LevelFilter::Off => simplelog::LevelFilter::Off,
            LevelFilter::Error => simplelog::LevelFilter::Error,
            LevelFilter::Warn => simplelog::LevelFilter::Warn,
            LevelFilter::Info => simplelog::LevelFilter::Info,
            LevelFilter::Debug => simplelog::LevelFilter::Debug,
            LevelFilter::Trace => simplelog::LevelFilter::Trace,
        }
    }

    /// No ANSI codes outside development.
    fn color_choice(env: &RustEnv) -> simplelog::ColorChoice {
        match env {
            RustEnv::Development => simplelog::ColorChoice::Auto,
            RustEnv::Production | RustEnv::Staging => simplelog::ColorChoice::Never,
        }
    }

    /// Returns `false` for Trace level (show all logs), `true` for all other levels.
    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
