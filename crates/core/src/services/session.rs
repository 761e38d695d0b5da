//! Session token issuing and verification.

use chrono::{Duration, Utc};
use comunimapp_common::config::SessionConfig;
use comunimapp_common::{AppError, AppResult};
use comunimapp_db::entities::{User, UserRole};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a session JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID.
    pub sub: String,
    /// Role at issue time.
    pub role: UserRole,
    /// Expiry, seconds since epoch.
    pub exp: i64,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct SessionService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: i64,
}

impl SessionService {
    /// Create a session service from configuration.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            expiry_hours: config.expiry_hours,
        }
    }

    /// Issue a bearer token for a user.
    pub fn issue(&self, user: &User) -> AppResult<String> {
        let claims = SessionClaims {
            sub: user.id.clone(),
            role: user.role,
            exp: (Utc::now() + Duration::hours(self.expiry_hours)).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token encoding: {e}")))
    }

    /// Verify a bearer token. Bad signature or expiry map to `Unauthorized`.
    pub fn verify(&self, token: &str) -> AppResult<SessionClaims> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user() -> User {
        User {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            username: "u1".to_string(),
            role: UserRole::Reportante,
            is_active: true,
            is_verified: true,
            organization: None,
            phone: None,
            zone: None,
            password_hash: "x".to_string(),
            verification_token: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn service(expiry_hours: i64) -> SessionService {
        SessionService::new(&SessionConfig {
            secret: "test-secret-key".to_string(),
            expiry_hours,
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let svc = service(24);
        let token = svc.issue(&test_user()).unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, UserRole::Reportante);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service(-1);
        let token = svc.issue(&test_user()).unwrap();
        assert!(matches!(svc.verify(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service(24).issue(&test_user()).unwrap();
        let other = SessionService::new(&SessionConfig {
            secret: "another-secret".to_string(),
            expiry_hours: 24,
        });
        assert!(matches!(other.verify(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(
            service(24).verify("not-a-jwt"),
            Err(AppError::Unauthorized)
        ));
    }
}
