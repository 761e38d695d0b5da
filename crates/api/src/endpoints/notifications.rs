//! Notification endpoints. All scoped to the authenticated user.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use comunimapp_common::AppResult;
use comunimapp_db::entities::{Notification, NotificationType};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::extractors::AuthUser;
use crate::middleware::AppState;
use crate::response::Message;

#[derive(Debug, Deserialize)]
struct ListNotificationsQuery {
    notification_type: Option<NotificationType>,
    is_read: Option<bool>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state
        .notification_service
        .list(
            &user.id,
            query.notification_type,
            query.is_read,
            query.limit,
            query.offset,
        )
        .await?;
    Ok(Json(notifications))
}

async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    let count = state.notification_service.unread_count(&user.id).await?;
    Ok(Json(json!({ "unread_count": count })))
}

async fn get_notification(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> AppResult<Json<Notification>> {
    let notification = state
        .notification_service
        .get(&user.id, &notification_id)
        .await?;
    Ok(Json(notification))
}

async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> AppResult<Json<Notification>> {
    let notification = state
        .notification_service
        .mark_read(&user.id, &notification_id)
        .await?;
    Ok(Json(notification))
}

async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    let count = state.notification_service.mark_all_read(&user.id).await?;
    Ok(Json(
        json!({ "message": "Notificaciones marcadas como leídas", "count": count }),
    ))
}

async fn delete_notification(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> AppResult<Json<Message>> {
    state
        .notification_service
        .delete(&user.id, &notification_id)
        .await?;
    Ok(Json(Message::new("Notificación eliminada correctamente")))
}

async fn delete_all_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    state.notification_service.delete_all(&user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_notifications).delete(delete_all_notifications),
        )
        .route("/unread/count", get(unread_count))
        .route(
            "/{notification_id}",
            get(get_notification).delete(delete_notification),
        )
        .route("/{notification_id}/read", patch(mark_read))
        .route("/mark-all-read", post(mark_all_read))
}
