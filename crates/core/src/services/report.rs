//! Report lifecycle: creation, listing, assignment, status transitions and
//! deletion, with the notification fan-out each step requires.

use chrono::Utc;
use comunimapp_common::{AppError, AppResult, IdGenerator};
use comunimapp_db::entities::{
    NotificationType, Report, ReportLocation, ReportPriority, ReportStatus, User, UserRole,
};
use comunimapp_db::repositories::{CaseUpdateRepository, ReportRepository, UserRepository};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::authorization::{self, ReportView};
use super::media::{MediaService, UploadedImage};
use super::notification::NotificationService;
use super::workflow::{self, TransitionOutcome};

/// Input for creating a report.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportInput {
    #[validate(length(min = 10, message = "description must be at least 10 characters"))]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default = "default_priority")]
    pub priority: ReportPriority,
}

const fn default_priority() -> ReportPriority {
    ReportPriority::Media
}

/// Report service.
#[derive(Clone)]
pub struct ReportService {
    reports: ReportRepository,
    users: UserRepository,
    case_updates: CaseUpdateRepository,
    notifications: Arc<NotificationService>,
    media: Option<Arc<MediaService>>,
    ids: IdGenerator,
}

impl ReportService {
    /// Create a report service.
    #[must_use]
    pub fn new(
        reports: ReportRepository,
        users: UserRepository,
        case_updates: CaseUpdateRepository,
        notifications: Arc<NotificationService>,
        media: Option<Arc<MediaService>>,
    ) -> Self {
        Self {
            reports,
            users,
            case_updates,
            notifications,
            media,
            ids: IdGenerator::new(),
        }
    }

    /// Create a report. Reportante only; image upload failures are fatal.
    pub async fn create(
        &self,
        actor: &User,
        input: CreateReportInput,
        images: Vec<UploadedImage>,
    ) -> AppResult<ReportView> {
        if !actor.is_reportante() {
            return Err(AppError::Forbidden(
                "Only reporters can create reports".to_string(),
            ));
        }
        input.validate()?;

        let image_urls = self.upload_images(images, "reports", &actor.username).await?;

        let report = Report {
            id: self.ids.generate(),
            description: input.description,
            location: ReportLocation {
                latitude: input.latitude,
                longitude: input.longitude,
                address: input.address,
                city: input.city,
            },
            images: if image_urls.is_empty() {
                None
            } else {
                Some(image_urls)
            },
            reporter_uid: actor.id.clone(),
            is_anonymous_public: input.is_anonymous,
            assigned_to: None,
            priority: input.priority,
            status: ReportStatus::Pendiente,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.reports.create(&report).await?;

        self.notifications
            .notify(
                actor,
                Some(&report.id),
                NotificationType::AsignacionCaso,
                "Reporte creado exitosamente",
                "Tu reporte ha sido creado y está pendiente de revisión",
            )
            .await;
        self.notify_admins(
            &report.id,
            NotificationType::AsignacionCaso,
            "Nuevo reporte pendiente",
            "Hay un nuevo reporte pendiente de asignación",
        )
        .await;

        Ok(ReportView::for_viewer(&report, actor))
    }

    /// List reports visible to the actor, newest first.
    ///
    /// Admin sees everything, handlers their assignments, reporters their own.
    pub async fn list(
        &self,
        actor: &User,
        status: Option<ReportStatus>,
        priority: Option<ReportPriority>,
    ) -> AppResult<Vec<ReportView>> {
        let reports = match actor.role {
            UserRole::Admin => self.reports.find_all(status, priority).await?,
            UserRole::Encargado => {
                self.reports
                    .find_by_assignee(&actor.id, status, priority)
                    .await?
            }
            UserRole::Reportante => {
                self.reports
                    .find_by_reporter(&actor.id, status, priority)
                    .await?
            }
        };
        Ok(reports
            .iter()
            .map(|r| ReportView::for_viewer(r, actor))
            .collect())
    }

    /// Reports assigned to the calling handler, newest first.
    pub async fn list_assigned(
        &self,
        actor: &User,
        status: Option<ReportStatus>,
        priority: Option<ReportPriority>,
    ) -> AppResult<Vec<ReportView>> {
        if !actor.is_encargado() {
            return Err(AppError::Forbidden(
                "Only handlers can list their assignments".to_string(),
            ));
        }
        let reports = self
            .reports
            .find_by_assignee(&actor.id, status, priority)
            .await?;
        Ok(reports
            .iter()
            .map(|r| ReportView::for_viewer(r, actor))
            .collect())
    }

    /// Fetch a single report the actor may view.
    pub async fn get(&self, actor: &User, report_id: &str) -> AppResult<ReportView> {
        let report = self.reports.get_by_id(report_id).await?;
        if !authorization::can_view_report(actor, &report) {
            return Err(AppError::Forbidden(
                "You cannot view this report".to_string(),
            ));
        }
        Ok(ReportView::for_viewer(&report, actor))
    }

    /// Assign a pending report to a handler. Admin only.
    pub async fn assign(
        &self,
        actor: &User,
        report_id: &str,
        encargado_id: &str,
    ) -> AppResult<ReportView> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can assign reports".to_string(),
            ));
        }

        let report = self.reports.get_by_id(report_id).await?;
        if report.status != ReportStatus::Pendiente {
            return Err(AppError::BadRequest(format!(
                "Report is already in status: {}",
                report.status
            )));
        }

        let encargado = self.users.get_by_id(encargado_id).await?;
        if !encargado.is_encargado() {
            return Err(AppError::BadRequest(
                "Target user is not a handler".to_string(),
            ));
        }

        let updated = self
            .reports
            .update(
                report_id,
                json!({
                    "assigned_to": encargado_id,
                    "status": ReportStatus::Asignado,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;

        self.notify_reporter(
            &updated,
            NotificationType::AsignacionCaso,
            "Reporte asignado",
            "Tu reporte ha sido asignado a un encargado",
        )
        .await;
        self.notifications
            .notify(
                &encargado,
                Some(report_id),
                NotificationType::AsignacionCaso,
                "Nuevo reporte asignado",
                "Se te ha asignado un nuevo reporte",
            )
            .await;

        Ok(ReportView::for_viewer(&updated, actor))
    }

    /// Request a status transition on a report.
    ///
    /// Admin may transition any report, a handler only assigned ones.
    /// Re-requesting the current status is rejected here; posting an update
    /// without a transition goes through the case-update service instead.
    pub async fn update_status(
        &self,
        actor: &User,
        report_id: &str,
        new_status: ReportStatus,
    ) -> AppResult<ReportView> {
        let report = self.reports.get_by_id(report_id).await?;
        if !authorization::can_transition(actor, &report) {
            return Err(AppError::Forbidden(
                "You cannot change the status of this report".to_string(),
            ));
        }

        match workflow::check(report.status, new_status)? {
            TransitionOutcome::Apply => {}
            TransitionOutcome::NoOp => {
                return Err(AppError::InvalidTransition {
                    from: report.status.as_str().to_string(),
                    to: new_status.as_str().to_string(),
                });
            }
        }

        let updated = self
            .reports
            .update(
                report_id,
                json!({
                    "status": new_status,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;

        if new_status == ReportStatus::Cerrado {
            self.notify_reporter(
                &updated,
                NotificationType::CierreCaso,
                "Reporte cerrado",
                "Tu reporte ha sido cerrado",
            )
            .await;
        } else {
            self.notify_reporter(
                &updated,
                NotificationType::CambioEstado,
                "Estado actualizado",
                &format!("Tu reporte cambió a estado: {new_status}"),
            )
            .await;
        }

        Ok(ReportView::for_viewer(&updated, actor))
    }

    /// Delete a report.
    ///
    /// Admin may delete any report; a reporter only an own, still-pending
    /// one. Notifications and case updates referencing the report are
    /// cascaded.
    pub async fn delete(&self, actor: &User, report_id: &str) -> AppResult<()> {
        let report = self.reports.get_by_id(report_id).await?;

        match actor.role {
            UserRole::Admin => {}
            UserRole::Reportante => {
                if report.reporter_uid != actor.id {
                    return Err(AppError::Forbidden(
                        "You can only delete your own reports".to_string(),
                    ));
                }
                if report.status != ReportStatus::Pendiente {
                    return Err(AppError::BadRequest(
                        "Only pending reports can be deleted".to_string(),
                    ));
                }
            }
            UserRole::Encargado => {
                return Err(AppError::Forbidden(
                    "Handlers cannot delete reports".to_string(),
                ));
            }
        }

        self.reports.delete(report_id).await?;
        self.notifications.delete_for_report(report_id).await?;
        self.case_updates.delete_by_report(report_id).await?;
        Ok(())
    }

    async fn upload_images(
        &self,
        images: Vec<UploadedImage>,
        kind: &str,
        username: &str,
    ) -> AppResult<Vec<String>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let media = self
            .media
            .as_ref()
            .ok_or_else(|| AppError::Config("Image hosting not configured".to_string()))?;
        media.upload_all(images, kind, username).await
    }

    async fn notify_reporter(
        &self,
        report: &Report,
        notification_type: NotificationType,
        title: &str,
        message: &str,
    ) {
        match self.users.find_by_id(&report.reporter_uid).await {
            Ok(Some(reporter)) => {
                self.notifications
                    .notify(&reporter, Some(&report.id), notification_type, title, message)
                    .await;
            }
            Ok(None) => {
                tracing::warn!(report_id = %report.id, "Reporter account no longer exists");
            }
            Err(e) => {
                tracing::warn!(report_id = %report.id, error = %e, "Reporter lookup failed");
            }
        }
    }

    async fn notify_admins(
        &self,
        report_id: &str,
        notification_type: NotificationType,
        title: &str,
        message: &str,
    ) {
        match self.users.find_by_role(UserRole::Admin).await {
            Ok(admins) => {
                for admin in admins {
                    self.notifications
                        .notify(&admin, Some(report_id), notification_type, title, message)
                        .await;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Admin lookup for fan-out failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use comunimapp_db::repositories::NotificationRepository;
    use comunimapp_db::{MemoryStore, SharedStore};

    struct Fixture {
        reports: ReportService,
        notifications: Arc<NotificationService>,
        users: UserRepository,
    }

    fn fixture() -> Fixture {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let notifications = Arc::new(NotificationService::new(
            NotificationRepository::new(store.clone()),
            None,
            None,
        ));
        let users = UserRepository::new(store.clone());
        let reports = ReportService::new(
            ReportRepository::new(store.clone()),
            users.clone(),
            CaseUpdateRepository::new(store),
            notifications.clone(),
            None,
        );
        Fixture {
            reports,
            notifications,
            users,
        }
    }

    fn user(id: &str, role: UserRole) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: id.to_string(),
            role,
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

    fn create_input() -> CreateReportInput {
        CreateReportInput {
            description: "Menores trabajando en un taller clandestino".to_string(),
            latitude: 4.6,
            longitude: -74.1,
            address: None,
            city: Some("Bogota".to_string()),
            is_anonymous: false,
            priority: ReportPriority::Alta,
        }
    }

    async fn seed(f: &Fixture) -> (User, User, User) {
        let reporter = user("c1", UserRole::Reportante);
        let handler = user("e1", UserRole::Encargado);
        let admin = user("a1", UserRole::Admin);
        for u in [&reporter, &handler, &admin] {
            f.users.create(u).await.unwrap();
        }
        (reporter, handler, admin)
    }

    #[tokio::test]
    async fn test_full_lifecycle_with_fanout() {
        let f = fixture();
        let (reporter, handler, admin) = seed(&f).await;

        // Create: reporter gets an ack, the admin an assignment-needed notice.
        let view = f.reports.create(&reporter, create_input(), vec![]).await.unwrap();
        assert_eq!(view.status, ReportStatus::Pendiente);
        assert_eq!(f.notifications.unread_count("c1").await.unwrap(), 1);
        assert_eq!(f.notifications.unread_count("a1").await.unwrap(), 1);

        // Assign: reporter and handler notified.
        let assigned = f.reports.assign(&admin, &view.id, "e1").await.unwrap();
        assert_eq!(assigned.status, ReportStatus::Asignado);
        assert_eq!(assigned.assigned_to.as_deref(), Some("e1"));
        assert_eq!(f.notifications.unread_count("c1").await.unwrap(), 2);
        assert_eq!(f.notifications.unread_count("e1").await.unwrap(), 1);

        // Handler works the case to closure.
        let in_progress = f
            .reports
            .update_status(&handler, &view.id, ReportStatus::EnProceso)
            .await
            .unwrap();
        assert_eq!(in_progress.status, ReportStatus::EnProceso);
        f.reports
            .update_status(&handler, &view.id, ReportStatus::Resuelto)
            .await
            .unwrap();
        f.reports
            .update_status(&handler, &view.id, ReportStatus::Cerrado)
            .await
            .unwrap();

        let closures = f
            .notifications
            .list("c1", Some(NotificationType::CierreCaso), None, None, None)
            .await
            .unwrap();
        assert_eq!(closures.len(), 1);
        assert_eq!(closures[0].title, "Reporte cerrado");

        // Closed is terminal.
        assert!(matches!(
            f.reports
                .update_status(&admin, &view.id, ReportStatus::Pendiente)
                .await,
            Err(AppError::AlreadyClosed)
        ));
    }

    #[tokio::test]
    async fn test_only_reporters_create() {
        let f = fixture();
        let (_, handler, admin) = seed(&f).await;
        for actor in [&handler, &admin] {
            assert!(matches!(
                f.reports.create(actor, create_input(), vec![]).await,
                Err(AppError::Forbidden(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_short_description_rejected() {
        let f = fixture();
        let (reporter, _, _) = seed(&f).await;
        let input = CreateReportInput {
            description: "corto".to_string(),
            ..create_input()
        };
        assert!(matches!(
            f.reports.create(&reporter, input, vec![]).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_assign_requires_pending_and_handler_target() {
        let f = fixture();
        let (reporter, _, admin) = seed(&f).await;
        let view = f.reports.create(&reporter, create_input(), vec![]).await.unwrap();

        // Target must be a handler.
        assert!(matches!(
            f.reports.assign(&admin, &view.id, "c1").await,
            Err(AppError::BadRequest(_))
        ));

        f.reports.assign(&admin, &view.id, "e1").await.unwrap();
        // Already assigned.
        assert!(matches!(
            f.reports.assign(&admin, &view.id, "e1").await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_handler_cannot_transition_unassigned_report() {
        let f = fixture();
        let (reporter, handler, admin) = seed(&f).await;
        let view = f.reports.create(&reporter, create_input(), vec![]).await.unwrap();

        assert!(matches!(
            f.reports
                .update_status(&handler, &view.id, ReportStatus::Asignado)
                .await,
            Err(AppError::Forbidden(_))
        ));
        // Admin may.
        f.reports
            .assign(&admin, &view.id, "e1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reportante_delete_rules() {
        let f = fixture();
        let (reporter, _, admin) = seed(&f).await;
        let other = user("c2", UserRole::Reportante);
        f.users.create(&other).await.unwrap();

        let view = f.reports.create(&reporter, create_input(), vec![]).await.unwrap();

        // Not the owner.
        assert!(matches!(
            f.reports.delete(&other, &view.id).await,
            Err(AppError::Forbidden(_))
        ));

        // Not pending anymore.
        f.reports.assign(&admin, &view.id, "e1").await.unwrap();
        assert!(matches!(
            f.reports.delete(&reporter, &view.id).await,
            Err(AppError::BadRequest(_))
        ));

        // Admin deletes anything; notifications cascade.
        f.reports.delete(&admin, &view.id).await.unwrap();
        assert!(matches!(
            f.reports.get(&admin, &view.id).await,
            Err(AppError::ReportNotFound(_))
        ));
        let remaining = f
            .notifications
            .list("c1", None, None, None, None)
            .await
            .unwrap();
        assert!(remaining.iter().all(|n| n.report_id.as_deref() != Some(view.id.as_str())));
    }

    #[tokio::test]
    async fn test_list_is_role_scoped() {
        let f = fixture();
        let (reporter, handler, admin) = seed(&f).await;
        let other = user("c2", UserRole::Reportante);
        f.users.create(&other).await.unwrap();

        let mine = f.reports.create(&reporter, create_input(), vec![]).await.unwrap();
        f.reports.create(&other, create_input(), vec![]).await.unwrap();
        f.reports.assign(&admin, &mine.id, "e1").await.unwrap();

        assert_eq!(f.reports.list(&admin, None, None).await.unwrap().len(), 2);
        assert_eq!(f.reports.list(&reporter, None, None).await.unwrap().len(), 1);
        assert_eq!(f.reports.list(&handler, None, None).await.unwrap().len(), 1);
        assert_eq!(
            f.reports
                .list(&admin, Some(ReportStatus::Pendiente), None)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
