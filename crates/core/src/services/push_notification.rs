//! Push delivery over FCM HTTP v1.
//!
//! Every send is best-effort: a failed push never fails the caller. Tokens
//! that FCM reports as unregistered are deactivated in the registry.

use chrono::Utc;
use comunimapp_common::{AppError, AppResult};
use comunimapp_db::entities::FcmToken;
use comunimapp_db::google_auth::GoogleAuth;
use comunimapp_db::repositories::FcmTokenRepository;
use serde_json::json;

const FCM_API: &str = "https://fcm.googleapis.com/v1";
const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// FCM push notification service and device token registry.
#[derive(Clone)]
pub struct PushService {
    tokens: FcmTokenRepository,
    auth: Option<GoogleAuth>,
    project_id: String,
    enabled: bool,
    http_client: reqwest::Client,
}

impl PushService {
    /// Create a push service. Sends are skipped unless `enabled` and an
    /// authenticator are provided; the token registry works either way.
    #[must_use]
    pub fn new(
        tokens: FcmTokenRepository,
        auth: Option<GoogleAuth>,
        project_id: String,
        enabled: bool,
    ) -> Self {
        Self {
            tokens,
            auth,
            project_id,
            enabled,
            http_client: reqwest::Client::new(),
        }
    }

    /// Whether push delivery is active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled && self.auth.is_some()
    }

    /// Register a device token for a user.
    ///
    /// A token already registered is reassigned to the caller and
    /// reactivated; a user may hold several tokens, one per device.
    pub async fn register(
        &self,
        user_id: &str,
        token: &str,
        device_type: Option<String>,
    ) -> AppResult<FcmToken> {
        if let Some(existing) = self.tokens.find_by_token(token).await? {
            self.tokens.reactivate(&existing.id, user_id).await?;
            return Ok(FcmToken {
                user_id: user_id.to_string(),
                is_active: true,
                updated_at: Some(Utc::now()),
                ..existing
            });
        }

        let registration = FcmToken {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            device_type,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.tokens.create(&registration).await?;
        Ok(registration)
    }

    /// Deactivate a device token owned by the caller.
    pub async fn unregister(&self, user_id: &str, token: &str) -> AppResult<()> {
        let registration = self
            .tokens
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Device token not registered".to_string()))?;
        if registration.user_id != user_id {
            return Err(AppError::Forbidden(
                "Device token belongs to another user".to_string(),
            ));
        }
        self.tokens.deactivate(&registration.id).await
    }

    /// Send a push notification to every active device of a user.
    ///
    /// Returns the number of successful sends. Individual failures are
    /// logged; unregistered tokens are deactivated.
    pub async fn send_to_user(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        report_id: Option<&str>,
    ) -> AppResult<usize> {
        if !self.is_enabled() {
            return Ok(0);
        }

        let registrations = self.tokens.find_active_by_user(user_id).await?;
        let mut sent = 0;
        for registration in registrations {
            match self.send_one(&registration.token, title, body, report_id).await {
                Ok(()) => sent += 1,
                Err(SendFailure::Unregistered) => {
                    tracing::info!(user_id, "Deactivating stale FCM token");
                    if let Err(e) = self.tokens.deactivate(&registration.id).await {
                        tracing::warn!(error = %e, "Failed to deactivate FCM token");
                    }
                }
                Err(SendFailure::Other(e)) => {
                    tracing::warn!(user_id, error = %e, "FCM send failed");
                }
            }
        }
        Ok(sent)
    }

    async fn send_one(
        &self,
        token: &str,
        title: &str,
        body: &str,
        report_id: Option<&str>,
    ) -> Result<(), SendFailure> {
        let auth = self.auth.as_ref().ok_or_else(|| {
            SendFailure::Other(AppError::Config("FCM authenticator missing".to_string()))
        })?;
        let access_token = auth.token(&[FCM_SCOPE]).await.map_err(SendFailure::Other)?;

        let mut data = json!({});
        if let Some(report_id) = report_id {
            data = json!({ "report_id": report_id });
        }
        let payload = json!({
            "message": {
                "token": token,
                "notification": { "title": title, "body": body },
                "data": data,
            }
        });

        let url = format!("{FCM_API}/projects/{}/messages:send", self.project_id);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendFailure::Other(AppError::ExternalService(format!("fcm: {e}"))))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND || detail.contains("UNREGISTERED") {
            return Err(SendFailure::Unregistered);
        }
        Err(SendFailure::Other(AppError::ExternalService(format!(
            "fcm {status}: {detail}"
        ))))
    }
}

enum SendFailure {
    /// FCM no longer knows the token.
    Unregistered,
    Other(AppError),
}
