//! Case updates posted by handlers and administrators on a report.

use chrono::{DateTime, Utc};
use comunimapp_common::{AppError, AppResult, IdGenerator};
use comunimapp_db::entities::{
    CaseUpdate, NotificationType, Report, ReportStatus, UpdateType, User, UserRole,
};
use comunimapp_db::repositories::{CaseUpdateRepository, ReportRepository, UserRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::authorization;
use super::media::{MediaService, UploadedImage};
use super::notification::NotificationService;
use super::workflow::{self, TransitionOutcome};

/// Input for posting a case update.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCaseUpdateInput {
    pub report_id: String,
    #[validate(length(min = 5, message = "message must be at least 5 characters"))]
    pub message: String,
    #[serde(default = "default_update_type")]
    pub update_type: UpdateType,
    #[serde(default)]
    pub new_status: Option<ReportStatus>,
}

const fn default_update_type() -> UpdateType {
    UpdateType::Avance
}

/// Public projection of a case update. The author id stays hidden so handler
/// identities are not exposed to reporters.
#[derive(Debug, Clone, Serialize)]
pub struct CaseUpdateView {
    pub id: String,
    pub report_id: String,
    pub message: String,
    pub update_type: UpdateType,
    pub new_status: Option<ReportStatus>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&CaseUpdate> for CaseUpdateView {
    fn from(update: &CaseUpdate) -> Self {
        Self {
            id: update.id.clone(),
            report_id: update.report_id.clone(),
            message: update.message.clone(),
            update_type: update.update_type,
            new_status: update.new_status,
            images: update.images.clone().unwrap_or_default(),
            created_at: update.created_at,
        }
    }
}

/// Case update service.
#[derive(Clone)]
pub struct CaseUpdateService {
    case_updates: CaseUpdateRepository,
    reports: ReportRepository,
    users: UserRepository,
    notifications: Arc<NotificationService>,
    media: Option<Arc<MediaService>>,
    ids: IdGenerator,
}

impl CaseUpdateService {
    /// Create a case update service.
    #[must_use]
    pub fn new(
        case_updates: CaseUpdateRepository,
        reports: ReportRepository,
        users: UserRepository,
        notifications: Arc<NotificationService>,
        media: Option<Arc<MediaService>>,
    ) -> Self {
        Self {
            case_updates,
            reports,
            users,
            notifications,
            media,
            ids: IdGenerator::new(),
        }
    }

    /// Post an update on a case.
    ///
    /// Handlers may only post on their own assignments; reporters never.
    /// A `new_status` equal to the current one records the update without a
    /// transition; any other value goes through the full workflow check.
    pub async fn create(
        &self,
        actor: &User,
        input: CreateCaseUpdateInput,
        images: Vec<UploadedImage>,
    ) -> AppResult<CaseUpdateView> {
        if actor.is_reportante() {
            return Err(AppError::Forbidden(
                "Only handlers and administrators can post case updates".to_string(),
            ));
        }

        input.validate()?;
        let report = self.reports.get_by_id(&input.report_id).await?;
        if actor.is_encargado() && report.assigned_to.as_deref() != Some(actor.id.as_str()) {
            return Err(AppError::Forbidden(
                "You can only post updates on reports assigned to you".to_string(),
            ));
        }

        let transition = match input.new_status {
            Some(requested) => Some((requested, workflow::check(report.status, requested)?)),
            None => None,
        };
        if let Some((requested, TransitionOutcome::Apply)) = transition {
            self.reports
                .update(
                    &report.id,
                    json!({
                        "status": requested,
                        "updated_at": Utc::now(),
                    }),
                )
                .await?;
        }

        let image_urls = if images.is_empty() {
            Vec::new()
        } else {
            let media = self
                .media
                .as_ref()
                .ok_or_else(|| AppError::Config("Image hosting not configured".to_string()))?;
            media
                .upload_all(images, "case_updates", &actor.username)
                .await?
        };

        let update = CaseUpdate {
            id: self.ids.generate(),
            report_id: report.id.clone(),
            encargado_id: actor.id.clone(),
            message: input.message,
            update_type: input.update_type,
            new_status: input.new_status,
            images: if image_urls.is_empty() {
                None
            } else {
                Some(image_urls)
            },
            created_at: Utc::now(),
        };
        self.case_updates.create(&update).await?;

        self.fan_out(actor, &report, &update).await;
        Ok(CaseUpdateView::from(&update))
    }

    /// List the updates of a report, newest first. Requires view permission
    /// on the parent report.
    pub async fn list(&self, actor: &User, report_id: &str) -> AppResult<Vec<CaseUpdateView>> {
        self.authorize_parent(actor, report_id).await?;
        let updates = self.case_updates.find_by_report(report_id).await?;
        Ok(updates.iter().map(CaseUpdateView::from).collect())
    }

    /// Fetch a single update, permission-checked through its parent report.
    pub async fn get(&self, actor: &User, update_id: &str) -> AppResult<CaseUpdateView> {
        let update = self.case_updates.get_by_id(update_id).await?;
        self.authorize_parent(actor, &update.report_id).await?;
        Ok(CaseUpdateView::from(&update))
    }

    /// Count the updates of a report.
    pub async fn count(&self, actor: &User, report_id: &str) -> AppResult<u64> {
        self.authorize_parent(actor, report_id).await?;
        self.case_updates.count_by_report(report_id).await
    }

    /// Delete an update. Admin any; a handler only an own one. Hosted images
    /// are destroyed best-effort.
    pub async fn delete(&self, actor: &User, update_id: &str) -> AppResult<()> {
        let update = self.case_updates.get_by_id(update_id).await?;

        let allowed = match actor.role {
            UserRole::Admin => true,
            UserRole::Encargado => update.encargado_id == actor.id,
            UserRole::Reportante => false,
        };
        if !allowed {
            return Err(AppError::Forbidden(
                "You cannot delete this case update".to_string(),
            ));
        }

        if let (Some(media), Some(images)) = (&self.media, &update.images) {
            for url in images {
                media.destroy(url).await;
            }
        }
        self.case_updates.delete(update_id).await
    }

    async fn authorize_parent(&self, actor: &User, report_id: &str) -> AppResult<Report> {
        let report = self.reports.get_by_id(report_id).await?;
        if !authorization::can_view_report(actor, &report) {
            return Err(AppError::Forbidden(
                "You cannot view the updates of this report".to_string(),
            ));
        }
        Ok(report)
    }

    /// Notify the reporter and every admin about a new update. Subtype:
    /// closure when the update closes the case, status change when the
    /// update is a status change, progress otherwise.
    async fn fan_out(&self, author: &User, report: &Report, update: &CaseUpdate) {
        let notification_type = if update.new_status == Some(ReportStatus::Cerrado) {
            NotificationType::CierreCaso
        } else if update.update_type == UpdateType::CambioEstado {
            NotificationType::CambioEstado
        } else {
            NotificationType::NuevoAvance
        };

        let excerpt: String = update.message.chars().take(100).collect();

        match self.users.find_by_id(&report.reporter_uid).await {
            Ok(Some(reporter)) => {
                self.notifications
                    .notify(
                        &reporter,
                        Some(&report.id),
                        notification_type,
                        "Actualización del caso",
                        &format!("Nueva actualización: {excerpt}..."),
                    )
                    .await;
            }
            Ok(None) => {
                tracing::warn!(report_id = %report.id, "Reporter account no longer exists");
            }
            Err(e) => {
                tracing::warn!(report_id = %report.id, error = %e, "Reporter lookup failed");
            }
        }

        match self.users.find_by_role(UserRole::Admin).await {
            Ok(admins) => {
                for admin in admins {
                    self.notifications
                        .notify(
                            &admin,
                            Some(&report.id),
                            notification_type,
                            "Actualización en reporte asignado",
                            &format!(
                                "El encargado {} actualizó el reporte: {excerpt}...",
                                author.username
                            ),
                        )
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
    use comunimapp_db::entities::{ReportLocation, ReportPriority};

    struct Fixture {
        updates: CaseUpdateService,
        reports: ReportRepository,
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
        let reports = ReportRepository::new(store.clone());
        let users = UserRepository::new(store.clone());
        let updates = CaseUpdateService::new(
            CaseUpdateRepository::new(store),
            reports.clone(),
            users.clone(),
            notifications.clone(),
            None,
        );
        Fixture {
            updates,
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

    async fn seed_report(f: &Fixture, status: ReportStatus, assigned: Option<&str>) -> Report {
        let report = Report {
            id: "r1".to_string(),
            description: "Menores en situación de trabajo forzado".to_string(),
            location: ReportLocation {
                latitude: 4.6,
                longitude: -74.1,
                address: None,
                city: Some("Bogota".to_string()),
            },
            images: None,
            reporter_uid: "c1".to_string(),
            is_anonymous_public: false,
            assigned_to: assigned.map(String::from),
            priority: ReportPriority::Alta,
            status,
            created_at: Utc::now(),
            updated_at: None,
        };
        f.reports.create(&report).await.unwrap();
        report
    }

    fn input(new_status: Option<ReportStatus>, update_type: UpdateType) -> CreateCaseUpdateInput {
        CreateCaseUpdateInput {
            report_id: "r1".to_string(),
            message: "Visita de campo realizada, se constató la situación".to_string(),
            update_type,
            new_status,
        }
    }

    #[tokio::test]
    async fn test_reportante_cannot_post() {
        let f = fixture();
        seed_report(&f, ReportStatus::Asignado, Some("e1")).await;
        let reporter = user("c1", UserRole::Reportante);
        assert!(matches!(
            f.updates
                .create(&reporter, input(None, UpdateType::Avance), vec![])
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_handler_must_be_assigned() {
        let f = fixture();
        seed_report(&f, ReportStatus::Asignado, Some("e1")).await;
        let other = user("e2", UserRole::Encargado);
        assert!(matches!(
            f.updates
                .create(&other, input(None, UpdateType::Avance), vec![])
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_update_with_transition_moves_report() {
        let f = fixture();
        f.users.create(&user("c1", UserRole::Reportante)).await.unwrap();
        seed_report(&f, ReportStatus::Asignado, Some("e1")).await;
        let handler = user("e1", UserRole::Encargado);

        let view = f
            .updates
            .create(
                &handler,
                input(Some(ReportStatus::EnProceso), UpdateType::CambioEstado),
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(view.new_status, Some(ReportStatus::EnProceso));

        let report = f.reports.get_by_id("r1").await.unwrap();
        assert_eq!(report.status, ReportStatus::EnProceso);
        assert!(report.updated_at.is_some());

        let notes = f
            .notifications
            .list("c1", Some(NotificationType::CambioEstado), None, None, None)
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
    }

    #[tokio::test]
    async fn test_same_status_records_without_transition() {
        let f = fixture();
        f.users.create(&user("c1", UserRole::Reportante)).await.unwrap();
        seed_report(&f, ReportStatus::EnProceso, Some("e1")).await;
        let handler = user("e1", UserRole::Encargado);

        f.updates
            .create(
                &handler,
                input(Some(ReportStatus::EnProceso), UpdateType::Avance),
                vec![],
            )
            .await
            .unwrap();

        let report = f.reports.get_by_id("r1").await.unwrap();
        assert_eq!(report.status, ReportStatus::EnProceso);
        // No transition was applied.
        assert!(report.updated_at.is_none());
        assert_eq!(f.updates.count(&handler, "r1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected_before_writing() {
        let f = fixture();
        seed_report(&f, ReportStatus::Asignado, Some("e1")).await;
        let handler = user("e1", UserRole::Encargado);

        assert!(matches!(
            f.updates
                .create(
                    &handler,
                    input(Some(ReportStatus::Cerrado), UpdateType::CambioEstado),
                    vec![],
                )
                .await,
            Err(AppError::InvalidTransition { .. })
        ));
        assert_eq!(f.updates.count(&handler, "r1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closure_update_uses_closure_subtype() {
        let f = fixture();
        f.users.create(&user("c1", UserRole::Reportante)).await.unwrap();
        f.users.create(&user("a1", UserRole::Admin)).await.unwrap();
        seed_report(&f, ReportStatus::Resuelto, Some("e1")).await;
        let handler = user("e1", UserRole::Encargado);

        f.updates
            .create(
                &handler,
                input(Some(ReportStatus::Cerrado), UpdateType::Cierre),
                vec![],
            )
            .await
            .unwrap();

        for recipient in ["c1", "a1"] {
            let notes = f
                .notifications
                .list(recipient, Some(NotificationType::CierreCaso), None, None, None)
                .await
                .unwrap();
            assert_eq!(notes.len(), 1, "closure notice missing for {recipient}");
        }
    }

    #[tokio::test]
    async fn test_view_hides_author_and_delete_rules() {
        let f = fixture();
        f.users.create(&user("c1", UserRole::Reportante)).await.unwrap();
        seed_report(&f, ReportStatus::Asignado, Some("e1")).await;
        let handler = user("e1", UserRole::Encargado);
        let other = user("e2", UserRole::Encargado);
        let admin = user("a1", UserRole::Admin);

        let view = f
            .updates
            .create(&handler, input(None, UpdateType::Observacion), vec![])
            .await
            .unwrap();
        let serialized = serde_json::to_value(&view).unwrap();
        assert!(serialized.get("encargado_id").is_none());

        assert!(matches!(
            f.updates.delete(&other, &view.id).await,
            Err(AppError::Forbidden(_))
        ));
        f.updates.delete(&admin, &view.id).await.unwrap();
        assert!(matches!(
            f.updates.get(&admin, &view.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
