//! # Quill Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use config::AppConfig;
use observability::RequestIdMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!("Starting Quill server on {}:{}", config.host, config.port);

    let state = AppState::new(&config).await;

    if let Some(admin) = &config.admin {
        if let Err(e) = state.bootstrap_admin(admin).await {
            tracing::error!(error = %e, "Failed to bootstrap administrator account");
        }
    }

    HttpServer::new(move || {
        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure_app)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
