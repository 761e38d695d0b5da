//! Account registration, login, email verification and profile management.
//!
//! The role of a new account is forced by the endpoint, never by the payload.
//! Reportantes and encargados must verify their email before they can log in;
//! admins start verified.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use comunimapp_common::{AppError, AppResult, IdGenerator};
use comunimapp_db::entities::{User, UserRole};
use comunimapp_db::repositories::UserRepository;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::authorization::{self, UserView};
use super::email::EmailService;
use super::identity::IdentityService;
use super::session::SessionService;

/// Input for registering an account. The role comes from the endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 3, message = "username must be at least 3 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub role: Option<UserRole>,
    pub organization: Option<String>,
    pub phone: Option<String>,
    pub zone: Option<String>,
}

/// Successful login payload.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
}

/// User account service.
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    sessions: SessionService,
    identity: Option<Arc<IdentityService>>,
    email: Option<Arc<EmailService>>,
    public_url: String,
    ids: IdGenerator,
}

impl UserService {
    /// Create a user service. `identity` and `email` are optional side
    /// channels; absent ones are skipped.
    #[must_use]
    pub fn new(
        users: UserRepository,
        sessions: SessionService,
        identity: Option<Arc<IdentityService>>,
        email: Option<Arc<EmailService>>,
        public_url: String,
    ) -> Self {
        Self {
            users,
            sessions,
            identity,
            email,
            public_url,
            ids: IdGenerator::new(),
        }
    }

    /// Register an account with the given role.
    ///
    /// Encargados must name their organization; the handler-only fields are
    /// cleared for every other role. A failed auth-provider call aborts the
    /// registration before anything is written.
    pub async fn register(&self, role: UserRole, mut input: RegisterInput) -> AppResult<UserView> {
        input.validate()?;

        match role {
            UserRole::Encargado => {
                if input
                    .organization
                    .as_deref()
                    .is_none_or(|org| org.trim().is_empty())
                {
                    return Err(AppError::BadRequest(
                        "Encargado accounts require an organization".to_string(),
                    ));
                }
            }
            UserRole::Reportante | UserRole::Admin => {
                input.organization = None;
                input.phone = None;
                input.zone = None;
            }
        }

        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict(
                "Email is already registered".to_string(),
            ));
        }
        if self.users.find_by_username(&input.username).await?.is_some() {
            return Err(AppError::BadRequest(
                "Username is already taken".to_string(),
            ));
        }

        let uid = self.ids.generate();
        if let Some(identity) = &self.identity {
            identity
                .create_account(&uid, &input.email, &input.password, &input.username)
                .await?;
        }

        let needs_verification = role.needs_verification();
        let verification_token = needs_verification.then(|| self.ids.generate_token());
        let user = User {
            id: uid,
            email: input.email,
            username: input.username,
            role,
            is_active: true,
            is_verified: !needs_verification,
            organization: input.organization,
            phone: input.phone,
            zone: input.zone,
            password_hash: hash_password(&input.password)?,
            verification_token,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.users.create(&user).await?;

        if let Some(token) = &user.verification_token {
            self.send_verification_email(&user, token).await;
        }
        Ok(UserView::owner(&user))
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.to_string()))?;

        if !verify_password(password, &user.password_hash) {
            return Err(AppError::Unauthorized);
        }
        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }
        if user.role.needs_verification() && !user.is_verified {
            return Err(AppError::Forbidden(
                "Account email is not verified".to_string(),
            ));
        }

        let access_token = self.sessions.issue(&user)?;
        Ok(LoginResponse {
            user: UserView::owner(&user),
            access_token,
        })
    }

    /// Consume an email verification token.
    pub async fn verify_email(&self, token: &str) -> AppResult<UserView> {
        let user = self
            .users
            .find_by_verification_token(token)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("Invalid or already used verification token".to_string())
            })?;

        let updated = self
            .users
            .update(
                &user.id,
                json!({
                    "is_verified": true,
                    "verification_token": null,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;
        Ok(UserView::owner(&updated))
    }

    /// Load a user record projected for `actor`.
    pub async fn get(&self, actor: &User, target_id: &str) -> AppResult<UserView> {
        let target = self.users.get_by_id(target_id).await?;
        Ok(UserView::for_viewer(&target, actor))
    }

    /// List users, optionally filtered by role and active flag, projected
    /// for `actor`.
    pub async fn list(
        &self,
        actor: &User,
        role: Option<UserRole>,
        is_active: Option<bool>,
    ) -> AppResult<Vec<UserView>> {
        let users = self.users.find_all(role, is_active).await?;
        Ok(users
            .iter()
            .map(|user| UserView::for_viewer(user, actor))
            .collect())
    }

    /// Apply a partial profile update.
    ///
    /// Admin may edit anyone, everyone else only themselves. Only admins
    /// change roles, and an encargado record can never lose its organization.
    pub async fn update(
        &self,
        actor: &User,
        target_id: &str,
        patch: UpdateUserInput,
    ) -> AppResult<UserView> {
        if !authorization::can_mutate_user(actor, target_id) {
            return Err(AppError::Forbidden(
                "You may not edit this account".to_string(),
            ));
        }
        let target = self.users.get_by_id(target_id).await?;

        if patch.role.is_some() && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can change roles".to_string(),
            ));
        }
        if target.is_encargado()
            && patch
                .organization
                .as_deref()
                .is_some_and(|org| org.trim().is_empty())
        {
            return Err(AppError::BadRequest(
                "Encargado accounts require an organization".to_string(),
            ));
        }

        if let Some(username) = &patch.username
            && let Some(existing) = self.users.find_by_username(username).await?
            && existing.id != target_id
        {
            return Err(AppError::BadRequest(
                "Username is already taken".to_string(),
            ));
        }

        let mut fields = serde_json::Map::new();
        if let Some(username) = patch.username {
            fields.insert("username".to_string(), json!(username));
        }
        if let Some(role) = patch.role {
            fields.insert("role".to_string(), json!(role));
        }
        if let Some(organization) = patch.organization {
            fields.insert("organization".to_string(), json!(organization));
        }
        if let Some(phone) = patch.phone {
            fields.insert("phone".to_string(), json!(phone));
        }
        if let Some(zone) = patch.zone {
            fields.insert("zone".to_string(), json!(zone));
        }
        fields.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .users
            .update(target_id, serde_json::Value::Object(fields))
            .await?;
        Ok(UserView::for_viewer(&updated, actor))
    }

    /// Activate or deactivate an account.
    ///
    /// Non-admins may only touch their own account and may never deactivate
    /// it, so the flag is effectively admin-controlled.
    pub async fn set_active(&self, actor: &User, target_id: &str, active: bool) -> AppResult<()> {
        if !authorization::can_mutate_user(actor, target_id) {
            return Err(AppError::Forbidden(
                "You may not change the state of this account".to_string(),
            ));
        }
        if !actor.is_admin() && !active {
            return Err(AppError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        self.users.get_by_id(target_id).await?;
        self.users
            .update(
                target_id,
                json!({ "is_active": active, "updated_at": Utc::now() }),
            )
            .await?;
        Ok(())
    }

    /// Delete an account.
    ///
    /// Admin may delete anyone but themselves; everyone else only their own
    /// account. Auth-provider deletion is best-effort, the document removal
    /// is not.
    pub async fn delete(&self, actor: &User, target_id: &str) -> AppResult<()> {
        if !authorization::can_mutate_user(actor, target_id) {
            return Err(AppError::Forbidden(
                "You may not delete this account".to_string(),
            ));
        }
        self.users.get_by_id(target_id).await?;
        if actor.is_admin() && actor.id == target_id {
            return Err(AppError::BadRequest(
                "Administrators cannot delete their own account".to_string(),
            ));
        }

        if let Some(identity) = &self.identity
            && let Err(e) = identity.delete_account(target_id).await
        {
            tracing::warn!(user_id = target_id, error = %e, "Auth account deletion failed");
        }
        self.users.delete(target_id).await
    }

    async fn send_verification_email(&self, user: &User, token: &str) {
        let Some(email) = &self.email else {
            return;
        };
        let verify_url = format!("{}/auth/verify-email?token={token}", self.public_url);
        if let Err(e) = email
            .send_verification(&user.email, &user.username, &verify_url)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "Verification email failed");
        }
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}
