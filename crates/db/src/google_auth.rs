//! Service-account token source for Google APIs.

use comunimapp_common::{AppError, AppResult};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use std::sync::Arc;
use tokio::sync::OnceCell;
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

type AuthType = Authenticator<HttpsConnector<HttpConnector>>;

/// OAuth scope covering Firestore, Firebase Auth and FCM.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Lazily-initialized service-account authenticator shared by every Google
/// API client (Firestore, identity toolkit, FCM).
#[derive(Clone)]
pub struct GoogleAuth {
    key: ServiceAccountKey,
    authenticator: Arc<OnceCell<AuthType>>,
}

impl GoogleAuth {
    /// Create a token source from a parsed service-account key.
    #[must_use]
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            authenticator: Arc::new(OnceCell::new()),
        }
    }

    /// Read and parse a service-account JSON key file.
    pub async fn from_file(path: &str) -> AppResult<Self> {
        let key = yup_oauth2::read_service_account_key(path)
            .await
            .map_err(|e| AppError::Config(format!("service account key: {e}")))?;
        Ok(Self::new(key))
    }

    /// The GCP project the key belongs to.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    /// The service-account client email (used as issuer for custom tokens).
    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// The PEM-encoded private key (used to sign Firebase custom tokens).
    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        &self.key.private_key
    }

    /// Fetch (or reuse) an access token for the given scopes.
    pub async fn token(&self, scopes: &[&str]) -> AppResult<String> {
        let auth = self
            .authenticator
            .get_or_try_init(|| async {
                ServiceAccountAuthenticator::builder(self.key.clone())
                    .build()
                    .await
            })
            .await
            .map_err(|e| AppError::ExternalService(format!("google auth: {e}")))?;

        let token = auth
            .token(scopes)
            .await
            .map_err(|e| AppError::ExternalService(format!("google auth: {e}")))?;

        token
            .token()
            .map(ToString::to_string)
            .ok_or_else(|| AppError::ExternalService("google auth returned no token".to_string()))
    }
}

impl std::fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAuth")
            .field("client_email", &self.key.client_email)
            .finish_non_exhaustive()
    }
}
