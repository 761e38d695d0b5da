//! Registration, login and session endpoints.
//!
//! The role of a new account is fixed by the path, so a payload can never
//! self-promote to admin.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use comunimapp_common::{AppError, AppResult};
use comunimapp_core::{LoginResponse, RegisterInput, UserView};
use comunimapp_db::entities::UserRole;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::extractors::AuthUser;
use crate::middleware::AppState;
use crate::response;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct VerifyEmailQuery {
    token: String,
}

/// Firebase custom token payload for the mobile client.
#[derive(Debug, Serialize)]
struct FirebaseTokenResponse {
    #[serde(rename = "firebaseCustomToken")]
    firebase_custom_token: String,
}

async fn register_reportante(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    let user = state
        .user_service
        .register(UserRole::Reportante, input)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn register_encargado(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    let user = state
        .user_service
        .register(UserRole::Encargado, input)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn register_admin(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    let user = state.user_service.register(UserRole::Admin, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let login = state.user_service.login(&req.email, &req.password).await?;
    Ok(Json(login))
}

/// Email verification link target. Renders HTML for the browser the link
/// was opened in, not JSON.
async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Response {
    match state.user_service.verify_email(&query.token).await {
        Ok(_) => response::verification_success_page().into_response(),
        Err(_) => response::verification_error_page().into_response(),
    }
}

async fn verify_token(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({
        "valid": true,
        "user": {
            "id": user.id,
            "username": user.username,
            "role": user.role,
            "email": user.email,
        }
    }))
}

async fn me(AuthUser(user): AuthUser) -> Json<UserView> {
    Json(UserView::owner(&user))
}

/// Mint a Firebase custom token so the client can open its own Firestore
/// session for real-time notification reads.
async fn firebase_token(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<FirebaseTokenResponse>> {
    let identity = state
        .identity_service
        .as_ref()
        .ok_or_else(|| AppError::Config("Firebase identity is not configured".to_string()))?;
    let token = identity.custom_token(&user.id, user.role)?;
    Ok(Json(FirebaseTokenResponse {
        firebase_custom_token: token,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/reportante", post(register_reportante))
        .route("/register/encargado", post(register_encargado))
        .route("/register/admin", post(register_admin))
        .route("/login", post(login))
        .route("/verify-email", get(verify_email))
        .route("/verify-token", get(verify_token))
        .route("/me", get(me))
        .route("/firebase-token", post(firebase_token))
}
