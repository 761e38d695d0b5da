//! User repository.

use comunimapp_common::{AppError, AppResult};
use serde_json::Value;

use super::{from_doc, to_doc};
use crate::collections;
use crate::entities::user::{User, UserRole};
use crate::store::{Filter, QueryOptions, SharedStore};

/// User repository for document store operations.
#[derive(Clone)]
pub struct UserRepository {
    store: SharedStore,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        match self.store.get(collections::USERS, id).await? {
            Some(doc) => Ok(Some(from_doc(doc)?)),
            None => Ok(None),
        }
    }

    /// Get a user by ID, failing when absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find a user by email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.find_one(&[Filter::eq("email", email)]).await
    }

    /// Find a user by username.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.find_one(&[Filter::eq("username", username)]).await
    }

    /// Find a user by pending email verification token.
    pub async fn find_by_verification_token(&self, token: &str) -> AppResult<Option<User>> {
        self.find_one(&[Filter::eq("verification_token", token)])
            .await
    }

    /// List users, optionally filtered by role and active flag.
    pub async fn find_all(
        &self,
        role: Option<UserRole>,
        is_active: Option<bool>,
    ) -> AppResult<Vec<User>> {
        let mut filters = Vec::new();
        if let Some(role) = role {
            filters.push(Filter::eq("role", role.as_str()));
        }
        if let Some(active) = is_active {
            filters.push(Filter::eq("is_active", active));
        }

        let docs = self
            .store
            .query(collections::USERS, &filters, QueryOptions::default())
            .await?;
        docs.into_iter().map(from_doc).collect()
    }

    /// All users holding a given role.
    pub async fn find_by_role(&self, role: UserRole) -> AppResult<Vec<User>> {
        self.find_all(Some(role), None).await
    }

    /// Create a new user document, keyed by its ID (the auth uid).
    pub async fn create(&self, user: &User) -> AppResult<()> {
        self.store
            .set(collections::USERS, &user.id, to_doc(user)?)
            .await
    }

    /// Merge a patch into a user document and return the updated entity.
    pub async fn update(&self, id: &str, patch: Value) -> AppResult<User> {
        self.store.update(collections::USERS, id, patch).await?;
        self.get_by_id(id).await
    }

    /// Delete a user document.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.store.delete(collections::USERS, id).await
    }

    async fn find_one(&self, filters: &[Filter]) -> AppResult<Option<User>> {
        let docs = self
            .store
            .query(
                collections::USERS,
                filters,
                QueryOptions::default().with_limit(1),
            )
            .await?;
        docs.into_iter().next().map(from_doc).transpose()
    }
}
