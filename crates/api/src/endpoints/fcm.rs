//! Device token endpoints for push notifications.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use comunimapp_common::{AppError, AppResult};
use comunimapp_core::PushService;
use comunimapp_db::entities::FcmToken;
use serde::Deserialize;
use std::sync::Arc;

use crate::extractors::AuthUser;
use crate::middleware::AppState;
use crate::response::Message;

#[derive(Debug, Deserialize)]
struct RegisterTokenRequest {
    token: String,
    #[serde(default)]
    device_type: Option<String>,
}

fn push_service(state: &AppState) -> AppResult<&Arc<PushService>> {
    state
        .push_service
        .as_ref()
        .ok_or_else(|| AppError::Config("Push notifications are not configured".to_string()))
}

async fn register_token(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RegisterTokenRequest>,
) -> AppResult<(StatusCode, Json<FcmToken>)> {
    let registered = push_service(&state)?
        .register(&user.id, &req.token, req.device_type)
        .await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

async fn unregister_token(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<Message>> {
    push_service(&state)?.unregister(&user.id, &token).await?;
    Ok(Json(Message::new("Token eliminado correctamente")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tokens", post(register_token))
        .route("/tokens/{token}", delete(unregister_token))
}
