//! Notification repository.

use chrono::Utc;
use comunimapp_common::{AppError, AppResult};
use serde_json::json;

use super::{from_doc, to_doc};
use crate::collections;
use crate::entities::notification::{Notification, NotificationType};
use crate::store::{Filter, QueryOptions, SharedStore, WriteOp};

/// Notification repository for document store operations.
#[derive(Clone)]
pub struct NotificationRepository {
    store: SharedStore,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Notification>> {
        match self.store.get(collections::NOTIFICATIONS, id).await? {
            Some(doc) => Ok(Some(from_doc(doc)?)),
            None => Ok(None),
        }
    }

    /// Get a notification by ID, failing when absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<Notification> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {id} not found")))
    }

    /// Notifications for a recipient, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        notification_type: Option<NotificationType>,
        is_read: Option<bool>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> AppResult<Vec<Notification>> {
        let mut filters = vec![Filter::eq("user_id", user_id)];
        if let Some(kind) = notification_type {
            filters.push(Filter::eq("notification_type", kind.as_str()));
        }
        if let Some(read) = is_read {
            filters.push(Filter::eq("is_read", read));
        }

        let mut options = QueryOptions::desc("created_at");
        if let Some(limit) = limit {
            options = options.with_limit(limit);
        }
        if let Some(offset) = offset {
            options = options.with_offset(offset);
        }

        let docs = self
            .store
            .query(collections::NOTIFICATIONS, &filters, options)
            .await?;
        docs.into_iter().map(from_doc).collect()
    }

    /// Count unread notifications for a recipient.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        let filters = [
            Filter::eq("user_id", user_id),
            Filter::eq("is_read", false),
        ];
        let docs = self
            .store
            .query(collections::NOTIFICATIONS, &filters, QueryOptions::default())
            .await?;
        Ok(docs.len() as u64)
    }

    /// Create a new notification document.
    pub async fn create(&self, notification: &Notification) -> AppResult<()> {
        self.store
            .set(
                collections::NOTIFICATIONS,
                &notification.id,
                to_doc(notification)?,
            )
            .await
    }

    /// Mark a single notification as read.
    pub async fn mark_read(&self, id: &str) -> AppResult<Notification> {
        let patch = json!({ "is_read": true, "updated_at": Utc::now() });
        self.store
            .update(collections::NOTIFICATIONS, id, patch)
            .await?;
        self.get_by_id(id).await
    }

    /// Mark every unread notification of a recipient as read, returning the count.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        let unread = self
            .find_by_user(user_id, None, Some(false), None, None)
            .await?;
        if unread.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let ops = unread
            .into_iter()
            .map(|n| WriteOp::Update {
                collection: collections::NOTIFICATIONS.to_string(),
                id: n.id,
                patch: json!({ "is_read": true, "updated_at": now }),
            })
            .collect::<Vec<_>>();
        self.store.commit(ops).await
    }

    /// Delete a notification document.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.store.delete(collections::NOTIFICATIONS, id).await
    }

    /// Delete every notification of a recipient, returning the count.
    pub async fn delete_all_for_user(&self, user_id: &str) -> AppResult<u64> {
        let filters = [Filter::eq("user_id", user_id)];
        self.delete_matching(&filters).await
    }

    /// Delete every notification that references a report. Used by the
    /// report deletion cascade.
    pub async fn delete_by_report(&self, report_id: &str) -> AppResult<u64> {
        let filters = [Filter::eq("report_id", report_id)];
        self.delete_matching(&filters).await
    }

    async fn delete_matching(&self, filters: &[Filter]) -> AppResult<u64> {
        let docs = self
            .store
            .query(collections::NOTIFICATIONS, filters, QueryOptions::default())
            .await?;
        if docs.is_empty() {
            return Ok(0);
        }

        let ops = docs
            .into_iter()
            .filter_map(|doc| {
                doc.get("id")
                    .and_then(|v| v.as_str())
                    .map(|id| WriteOp::Delete {
                        collection: collections::NOTIFICATIONS.to_string(),
                        id: id.to_string(),
                    })
            })
            .collect::<Vec<_>>();
        self.store.commit(ops).await
    }
}
