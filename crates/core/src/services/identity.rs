//! Firebase Auth identity provider client.
//!
//! Thin client over the Identity Toolkit admin REST API, authorized with the
//! service-account token source. Account creation failures abort registration;
//! account deletion failures during user removal are swallowed with a warning.

use chrono::Utc;
use comunimapp_common::{AppError, AppResult};
use comunimapp_db::entities::UserRole;
use comunimapp_db::google_auth::{CLOUD_PLATFORM_SCOPE, GoogleAuth};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;

const IDENTITY_TOOLKIT_API: &str = "https://identitytoolkit.googleapis.com/v1";

/// Audience required by Firebase for custom tokens.
const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Custom tokens are valid for one hour, the Firebase maximum.
const CUSTOM_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Serialize)]
struct CustomTokenClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    uid: &'a str,
    claims: serde_json::Value,
}

#[derive(Deserialize)]
struct AccountResponse {
    #[serde(rename = "localId")]
    local_id: String,
}

/// Firebase Auth account management.
#[derive(Clone)]
pub struct IdentityService {
    auth: GoogleAuth,
    project_id: String,
    client: reqwest::Client,
}

impl IdentityService {
    /// Create an identity service for a project.
    #[must_use]
    pub fn new(auth: GoogleAuth, project_id: String) -> Self {
        Self {
            auth,
            project_id,
            client: reqwest::Client::new(),
        }
    }

    /// Create a Firebase Auth account with a caller-chosen uid.
    pub async fn create_account(
        &self,
        uid: &str,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AppResult<String> {
        let token = self.auth.token(&[CLOUD_PLATFORM_SCOPE]).await?;
        let url = format!(
            "{IDENTITY_TOOLKIT_API}/projects/{}/accounts",
            self.project_id
        );
        let body = json!({
            "localId": uid,
            "email": email,
            "password": password,
            "displayName": display_name,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("firebase auth: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::BadRequest(format!(
                "Could not create auth account: {detail}"
            )));
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("firebase auth: {e}")))?;
        Ok(account.local_id)
    }

    /// Delete a Firebase Auth account.
    pub async fn delete_account(&self, uid: &str) -> AppResult<()> {
        let token = self.auth.token(&[CLOUD_PLATFORM_SCOPE]).await?;
        let url = format!(
            "{IDENTITY_TOOLKIT_API}/projects/{}/accounts:delete",
            self.project_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "localId": uid }))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("firebase auth: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "firebase auth delete: {detail}"
            )));
        }
        Ok(())
    }

    /// Mint a Firebase custom token (RS256, signed with the service-account
    /// key) so clients can sign in to the Firebase SDK with their session.
    pub fn custom_token(&self, uid: &str, role: UserRole) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = CustomTokenClaims {
            iss: self.auth.client_email(),
            sub: self.auth.client_email(),
            aud: CUSTOM_TOKEN_AUDIENCE,
            iat: now,
            exp: now + CUSTOM_TOKEN_TTL_SECS,
            uid,
            claims: json!({ "role": role.as_str() }),
        };

        let key = EncodingKey::from_rsa_pem(self.auth.private_key_pem().as_bytes())
            .map_err(|e| AppError::Config(format!("service account private key: {e}")))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| AppError::Internal(format!("custom token encoding: {e}")))
    }
}
