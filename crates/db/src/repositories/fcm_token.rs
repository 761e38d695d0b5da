//! FCM device token repository.

use chrono::Utc;
use comunimapp_common::AppResult;
use serde_json::json;

use super::{from_doc, to_doc};
use crate::collections;
use crate::entities::fcm_token::FcmToken;
use crate::store::{Filter, QueryOptions, SharedStore};

/// FCM token repository for document store operations.
#[derive(Clone)]
pub struct FcmTokenRepository {
    store: SharedStore,
}

impl FcmTokenRepository {
    /// Create a new FCM token repository.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Find a registration by its token string.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<FcmToken>> {
        let filters = [Filter::eq("token", token)];
        let docs = self
            .store
            .query(
                collections::FCM_TOKENS,
                &filters,
                QueryOptions::default().with_limit(1),
            )
            .await?;
        docs.into_iter().next().map(from_doc).transpose()
    }

    /// Active device tokens registered by a user.
    pub async fn find_active_by_user(&self, user_id: &str) -> AppResult<Vec<FcmToken>> {
        let filters = [
            Filter::eq("user_id", user_id),
            Filter::eq("is_active", true),
        ];
        let docs = self
            .store
            .query(collections::FCM_TOKENS, &filters, QueryOptions::default())
            .await?;
        docs.into_iter().map(from_doc).collect()
    }

    /// Create a new token registration.
    pub async fn create(&self, token: &FcmToken) -> AppResult<()> {
        self.store
            .set(collections::FCM_TOKENS, &token.id, to_doc(token)?)
            .await
    }

    /// Reassign an existing registration to a user and reactivate it.
    pub async fn reactivate(&self, id: &str, user_id: &str) -> AppResult<()> {
        let patch = json!({
            "user_id": user_id,
            "is_active": true,
            "updated_at": Utc::now(),
        });
        self.store.update(collections::FCM_TOKENS, id, patch).await
    }

    /// Deactivate a registration. Invoked when FCM reports the token invalid.
    pub async fn deactivate(&self, id: &str) -> AppResult<()> {
        let patch = json!({ "is_active": false, "updated_at": Utc::now() });
        self.store.update(collections::FCM_TOKENS, id, patch).await
    }
}
