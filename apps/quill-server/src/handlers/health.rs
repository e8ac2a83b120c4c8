//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
    pub timestamp: String,
}

/// Health check endpoint - returns server and storage status.
///
/// GET /health/
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let storage = match &state.db {
        None => "in-memory",
        #[cfg(feature = "postgres")]
        Some(db) => match db.ping().await {
            Ok(()) => "postgres",
            Err(e) => {
                tracing::error!(error = %e, "Database ping failed");
                "unreachable"
            }
        },
        #[cfg(not(feature = "postgres"))]
        Some(_) => "unknown",
    };

    let response = HealthResponse {
        status: if storage == "unreachable" { "degraded" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        storage,
        timestamp: state.clock.now().to_rfc3339(),
    };

    if storage == "unreachable" {
        HttpResponse::ServiceUnavailable().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}
