//! Notifications: recipient-scoped CRUD and the fan-out writer.
//!
//! Fan-out writes are independent best-effort operations. A failed Firestore
//! write for one recipient never blocks the others, and a failed push send
//! never rolls back the stored notification.

use chrono::Utc;
use comunimapp_common::{AppError, AppResult, IdGenerator};
use comunimapp_db::entities::{Notification, NotificationType, User};
use comunimapp_db::repositories::NotificationRepository;
use std::sync::Arc;

use super::email::EmailService;
use super::push_notification::PushService;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 100;

/// Notification service.
#[derive(Clone)]
pub struct NotificationService {
    notifications: NotificationRepository,
    push: Option<Arc<PushService>>,
    email: Option<Arc<EmailService>>,
    ids: IdGenerator,
}

impl NotificationService {
    /// Create a notification service. Push and email channels are optional.
    #[must_use]
    pub fn new(
        notifications: NotificationRepository,
        push: Option<Arc<PushService>>,
        email: Option<Arc<EmailService>>,
    ) -> Self {
        Self {
            notifications,
            push,
            email,
            ids: IdGenerator::new(),
        }
    }

    /// Write a notification for a recipient and attempt push and email
    /// delivery. Best-effort: every failure is logged and swallowed.
    pub async fn notify(
        &self,
        recipient: &User,
        report_id: Option<&str>,
        notification_type: NotificationType,
        title: &str,
        message: &str,
    ) {
        let notification = Notification {
            id: self.ids.generate(),
            user_id: recipient.id.clone(),
            report_id: report_id.map(String::from),
            title: title.to_string(),
            message: message.to_string(),
            notification_type,
            is_read: false,
            created_at: Utc::now(),
            updated_at: None,
        };

        if let Err(e) = self.notifications.create(&notification).await {
            tracing::warn!(
                user_id = %recipient.id,
                error = %e,
                "Failed to write notification"
            );
            return;
        }

        if let Some(push) = &self.push
            && let Err(e) = push
                .send_to_user(&recipient.id, title, message, report_id)
                .await
        {
            tracing::warn!(user_id = %recipient.id, error = %e, "Push fan-out failed");
        }

        if let Some(email) = &self.email
            && email.is_enabled()
            && let Err(e) = email.send_notification(&recipient.email, title, message).await
        {
            tracing::warn!(user_id = %recipient.id, error = %e, "Email fan-out failed");
        }
    }

    /// List notifications for the caller, newest first.
    ///
    /// `limit` is clamped to 1..=100, defaulting to 50.
    pub async fn list(
        &self,
        user_id: &str,
        notification_type: Option<NotificationType>,
        is_read: Option<bool>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> AppResult<Vec<Notification>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        self.notifications
            .find_by_user(user_id, notification_type, is_read, Some(limit), offset)
            .await
    }

    /// Fetch a single notification, owner only.
    pub async fn get(&self, user_id: &str, id: &str) -> AppResult<Notification> {
        let notification = self.notifications.get_by_id(id).await?;
        if notification.user_id != user_id {
            return Err(AppError::Forbidden(
                "Notification belongs to another user".to_string(),
            ));
        }
        Ok(notification)
    }

    /// Mark a notification as read. Idempotent.
    pub async fn mark_read(&self, user_id: &str, id: &str) -> AppResult<Notification> {
        let notification = self.get(user_id, id).await?;
        if notification.is_read {
            return Ok(notification);
        }
        self.notifications.mark_read(id).await
    }

    /// Mark every unread notification as read, returning the count updated.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        self.notifications.mark_all_read(user_id).await
    }

    /// Count unread notifications for the caller.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.notifications.count_unread(user_id).await
    }

    /// Delete a notification, owner only.
    pub async fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        self.get(user_id, id).await?;
        self.notifications.delete(id).await
    }

    /// Delete every notification of the caller, returning the count.
    pub async fn delete_all(&self, user_id: &str) -> AppResult<u64> {
        self.notifications.delete_all_for_user(user_id).await
    }

    /// Delete every notification referencing a report (deletion cascade).
    pub async fn delete_for_report(&self, report_id: &str) -> AppResult<u64> {
        self.notifications.delete_by_report(report_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comunimapp_db::MemoryStore;
    use comunimapp_db::entities::UserRole;

    fn service() -> NotificationService {
        let store = Arc::new(MemoryStore::new());
        NotificationService::new(NotificationRepository::new(store), None, None)
    }

    fn recipient(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: id.to_string(),
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

    #[tokio::test]
    async fn test_notify_and_list_scoped_to_recipient() {
        let svc = service();
        let alice = recipient("alice");
        let bob = recipient("bob");

        svc.notify(&alice, Some("r1"), NotificationType::NuevoReporte, "a", "m")
            .await;
        svc.notify(&alice, None, NotificationType::CambioEstado, "b", "m")
            .await;
        svc.notify(&bob, None, NotificationType::NuevoReporte, "c", "m")
            .await;

        assert_eq!(svc.list("alice", None, None, None, None).await.unwrap().len(), 2);
        assert_eq!(svc.list("bob", None, None, None, None).await.unwrap().len(), 1);
        assert_eq!(
            svc.list("alice", Some(NotificationType::CambioEstado), None, None, None)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_owner_only() {
        let svc = service();
        let alice = recipient("alice");
        svc.notify(&alice, None, NotificationType::NuevoReporte, "t", "m")
            .await;

        let id = svc.list("alice", None, None, None, None).await.unwrap()[0]
            .id
            .clone();
        assert!(svc.mark_read("alice", &id).await.unwrap().is_read);
        assert!(svc.mark_read("alice", &id).await.unwrap().is_read);
        assert!(matches!(
            svc.mark_read("bob", &id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(svc.unread_count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_all_read_returns_count() {
        let svc = service();
        let alice = recipient("alice");
        for i in 0..3 {
            svc.notify(&alice, None, NotificationType::NuevoAvance, "t", &format!("m{i}"))
                .await;
        }
        assert_eq!(svc.mark_all_read("alice").await.unwrap(), 3);
        assert_eq!(svc.mark_all_read("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_all_read_chunks_large_backlogs() {
        let store = Arc::new(MemoryStore::new());
        let repo = NotificationRepository::new(store.clone());
        let svc = NotificationService::new(repo.clone(), None, None);

        let ids = IdGenerator::new();
        for i in 0..501 {
            repo.create(&Notification {
                id: ids.generate(),
                user_id: "alice".to_string(),
                report_id: None,
                title: "t".to_string(),
                message: format!("m{i}"),
                notification_type: NotificationType::NuevoAvance,
                is_read: false,
                created_at: Utc::now(),
                updated_at: None,
            })
            .await
            .unwrap();
        }

        assert_eq!(svc.mark_all_read("alice").await.unwrap(), 501);
        // 501 writes do not fit one batch; the store splits at the limit.
        assert_eq!(store.commit_batch_sizes().await, vec![500, 1]);
        assert_eq!(svc.unread_count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_all_and_cascade() {
        let svc = service();
        let alice = recipient("alice");
        svc.notify(&alice, Some("r1"), NotificationType::NuevoReporte, "t", "m")
            .await;
        svc.notify(&alice, Some("r2"), NotificationType::NuevoReporte, "t", "m")
            .await;

        assert_eq!(svc.delete_for_report("r1").await.unwrap(), 1);
        assert_eq!(svc.delete_all("alice").await.unwrap(), 1);
        assert!(svc.list("alice", None, None, None, None).await.unwrap().is_empty());
    }
}
