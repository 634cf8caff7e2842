use domain::pipeline::Pipeline;
use log::*;
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = Config::new();

    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    info!("Starting up the coaching pipeline...");

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(db.as_ref(), None).await {
        error!("Failed to run database migrations: {e}");
        process::exit(1);
    }

    let pipeline = match Pipeline::connect(&config, Arc::clone(&db)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Failed to assemble the event pipeline: {e}");
            process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let mut scheduler = match pipeline.start_scheduler(&config).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("Failed to start scheduled tasks: {e}");
            process::exit(1);
        }
    };

    let worker = tokio::spawn(pipeline.runtime.clone().run(shutdown.clone()));

    let app_state = web::AppState::new(service::AppState::new(config, &db), pipeline);
    if let Err(e) = web::init_server(app_state, shutdown.clone()).await {
        error!("Web server failed: {e}");
        shutdown.cancel();
    }

    if let Err(e) = scheduler.shutdown().await {
        error!("Failed to stop scheduled tasks: {e}");
    }

    // The runtime drains in-flight runs before returning
    if let Err(e) = worker.await {
        error!("Subscriber runtime task panicked: {e}");
    }

    info!("Shutdown complete");
}

/// Cancels `shutdown` on Ctrl+C or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}
