use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use domain::pipeline::Pipeline;
use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod controller;
mod error;
mod extractors;
mod params;
mod protect;
mod router;

pub use error::{Error, Result};

/// State shared by every handler: infrastructure from `service` plus the
/// assembled event pipeline.
#[derive(Clone)]
pub struct AppState {
    pub service: service::AppState,
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(service: service::AppState, pipeline: Pipeline) -> Self {
        Self { service, pipeline }
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.service.db_conn_ref()
    }

    pub fn db(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.service.database_connection)
    }

    pub fn config(&self) -> &Config {
        &self.service.config
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_origin(origins)
}

/// Serves the API until `shutdown` is cancelled.
pub async fn init_server(app_state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let config = app_state.config();
    let host = config.interface.clone().unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{host}:{}", config.port);

    let routes = router::define_routes(app_state.clone())
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(listener, routes)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Server stopped accepting connections");
    Ok(())
}
