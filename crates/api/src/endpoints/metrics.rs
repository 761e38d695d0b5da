//! Dashboard metrics endpoint.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use comunimapp_common::AppResult;
use comunimapp_core::DashboardResponse;
use serde::Deserialize;

use crate::extractors::AuthUser;
use crate::middleware::AppState;

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    #[serde(default = "default_range")]
    range: String,
    #[serde(default = "default_status_type")]
    status_type: String,
    #[serde(default)]
    analyze_ai: bool,
}

fn default_range() -> String {
    "historico".to_string()
}

fn default_status_type() -> String {
    "todos".to_string()
}

/// Aggregated dashboard for any authenticated user.
async fn dashboard(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<DashboardResponse>> {
    let payload = state
        .metrics_service
        .dashboard(&query.range, &query.status_type, query.analyze_ai)
        .await?;
    Ok(Json(payload))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}
