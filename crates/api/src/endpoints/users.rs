//! User management endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use comunimapp_common::AppResult;
use comunimapp_core::{UpdateUserInput, UserView};
use comunimapp_db::entities::UserRole;
use serde::Deserialize;

use crate::extractors::AuthUser;
use crate::middleware::AppState;
use crate::response::Message;

#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    role: Option<UserRole>,
    is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ToggleActiveQuery {
    is_active: bool,
}

async fn my_profile(AuthUser(user): AuthUser) -> Json<UserView> {
    Json(UserView::owner(&user))
}

async fn update_my_profile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(patch): Json<UpdateUserInput>,
) -> AppResult<Json<UserView>> {
    let updated = state.user_service.update(&user, &user.id, patch).await?;
    Ok(Json(updated))
}

async fn list_users(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<Vec<UserView>>> {
    let users = state
        .user_service
        .list(&user, query.role, query.is_active)
        .await?;
    Ok(Json(users))
}

async fn get_user(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserView>> {
    let target = state.user_service.get(&user, &user_id).await?;
    Ok(Json(target))
}

async fn update_user(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(patch): Json<UpdateUserInput>,
) -> AppResult<Json<UserView>> {
    let updated = state.user_service.update(&user, &user_id, patch).await?;
    Ok(Json(updated))
}

async fn delete_user(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Message>> {
    state.user_service.delete(&user, &user_id).await?;
    Ok(Json(Message::new("Usuario eliminado correctamente")))
}

async fn toggle_active(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ToggleActiveQuery>,
) -> AppResult<Json<Message>> {
    state
        .user_service
        .set_active(&user, &user_id, query.is_active)
        .await?;
    let verb = if query.is_active {
        "activado"
    } else {
        "desactivado"
    };
    Ok(Json(Message::new(format!("Usuario {verb} correctamente"))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(my_profile).put(update_my_profile))
        .route("/", get(list_users))
        .route(
            "/{user_id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/{user_id}/toggle-active", patch(toggle_active))
}
