//! API endpoints.

mod auth;
mod cases;
mod fcm;
mod metrics;
mod notifications;
mod reports;
mod users;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::middleware::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "message": "Comunimapp API" }))
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/reports", reports::router())
        .nest("/cases", cases::router())
        .nest("/notifications", notifications::router())
        .nest("/fcm", fcm::router())
        .nest("/metrics", metrics::router())
}
