//! API middleware.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use comunimapp_common::AppError;
use comunimapp_core::{
    CaseUpdateService, IdentityService, MetricsService, NotificationService, PushService,
    ReportService, SessionService, UserService,
};
use comunimapp_db::entities::User;
use comunimapp_db::repositories::UserRepository;
use std::sync::Arc;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub report_service: ReportService,
    pub case_update_service: CaseUpdateService,
    pub notification_service: Arc<NotificationService>,
    pub push_service: Option<Arc<PushService>>,
    pub metrics_service: MetricsService,
    pub session_service: SessionService,
    pub identity_service: Option<Arc<IdentityService>>,
    pub users: UserRepository,
}

/// Authentication middleware.
///
/// A valid bearer token with a missing user document is a 404, not a 401;
/// the account may have been deleted while the token was still live.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(claims) = state.session_service.verify(token)
    {
        match state.users.find_by_id(&claims.sub).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert::<User>(user);
            }
            Ok(None) => {
                tracing::warn!(user_id = %claims.sub, "Valid token for a missing user document");
                return AppError::UserNotFound(claims.sub).into_response();
            }
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}
