/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// { "status": "healthy", "version": "0.1.0", "database": "connected", "migrations_up_to_date": true }
/// ```
///
/// Always answers 200 so load balancers can tell a degraded instance from a
/// dead one.

use crate::app::AppState;
use axum::{extract::State, Json};
use corpdesk_shared::db::{migrations::get_migration_status, pool::health_check as ping};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,
    pub version: String,
    /// `connected` or `disconnected`
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations_up_to_date: Option<bool>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match ping(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    let migrations_up_to_date = if connected {
        get_migration_status(&state.db)
            .await
            .ok()
            .map(|status| status.is_up_to_date)
    } else {
        None
    };

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        migrations_up_to_date,
    })
}
