//! Authorization predicates and per-viewer projections.
//!
//! Pure functions of (role, actor id, resource ownership). Every API response
//! that exposes a user or report goes through one of the views here so that
//! `password_hash`, `verification_token` and anonymous reporter identities
//! never leak.

use chrono::{DateTime, Utc};
use comunimapp_db::entities::{Report, ReportLocation, ReportPriority, ReportStatus, User, UserRole};
use serde::Serialize;

/// Whether `actor` may view `report`.
///
/// Admin always; handler iff assigned; reporter iff owner.
#[must_use]
pub fn can_view_report(actor: &User, report: &Report) -> bool {
    match actor.role {
        UserRole::Admin => true,
        UserRole::Encargado => report.assigned_to.as_deref() == Some(actor.id.as_str()),
        UserRole::Reportante => report.reporter_uid == actor.id,
    }
}

/// Whether `actor` may mutate the account of `target_id`.
///
/// Admin always; otherwise only self.
#[must_use]
pub fn can_mutate_user(actor: &User, target_id: &str) -> bool {
    actor.is_admin() || actor.id == target_id
}

/// Whether `actor` may request a status transition on `report`.
///
/// Admin any report; handler only when assigned; reporter never.
#[must_use]
pub fn can_transition(actor: &User, report: &Report) -> bool {
    match actor.role {
        UserRole::Admin => true,
        UserRole::Encargado => report.assigned_to.as_deref() == Some(actor.id.as_str()),
        UserRole::Reportante => false,
    }
}

/// Whether the reporter identity of `report` is visible to `actor`.
///
/// Admin always; owner always; anyone else only when the report is not
/// marked anonymous.
#[must_use]
pub fn reporter_visible_to(actor: &User, report: &Report) -> bool {
    actor.is_admin() || report.reporter_uid == actor.id || !report.is_anonymous_public
}

/// API projection of a report, with `reporter_uid` hidden per viewer.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub id: String,
    pub description: String,
    pub location: ReportLocation,
    pub images: Vec<String>,
    /// `None` when the report is anonymous and the viewer is neither the
    /// owner nor an admin.
    pub reporter_uid: Option<String>,
    pub is_anonymous_public: bool,
    pub assigned_to: Option<String>,
    pub priority: ReportPriority,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReportView {
    /// Project a report for a given viewer.
    #[must_use]
    pub fn for_viewer(report: &Report, viewer: &User) -> Self {
        let reporter_uid = if reporter_visible_to(viewer, report) {
            Some(report.reporter_uid.clone())
        } else {
            None
        };
        Self {
            id: report.id.clone(),
            description: report.description.clone(),
            location: report.location.clone(),
            images: report.images.clone().unwrap_or_default(),
            reporter_uid,
            is_anonymous_public: report.is_anonymous_public,
            assigned_to: report.assigned_to.clone(),
            priority: report.priority,
            status: report.status,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

/// API projection of a user.
///
/// Email and verification state are visible to admins and the account owner
/// only; handler contact fields appear only on encargado records.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserView {
    /// Project a user record for a given viewer.
    #[must_use]
    pub fn for_viewer(user: &User, viewer: &User) -> Self {
        let privileged = viewer.is_admin() || viewer.id == user.id;
        Self::project(user, privileged)
    }

    /// Project a user record for the account owner.
    #[must_use]
    pub fn owner(user: &User) -> Self {
        Self::project(user, true)
    }

    fn project(user: &User, privileged: bool) -> Self {
        let handler = user.is_encargado();
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            is_active: user.is_active,
            email: privileged.then(|| user.email.clone()),
            is_verified: privileged.then_some(user.is_verified),
            organization: if handler { user.organization.clone() } else { None },
            phone: if handler { user.phone.clone() } else { None },
            zone: if handler { user.zone.clone() } else { None },
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: &str, role: UserRole) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: id.to_string(),
            role,
            is_active: true,
            is_verified: true,
            organization: (role == UserRole::Encargado).then(|| "ONG Esperanza".to_string()),
            phone: None,
            zone: None,
            password_hash: "x".to_string(),
            verification_token: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn report(owner: &str, assigned: Option<&str>, anonymous: bool) -> Report {
        Report {
            id: "r1".to_string(),
            description: "Menores trabajando en obra".to_string(),
            location: ReportLocation {
                latitude: 4.6,
                longitude: -74.1,
                address: None,
                city: Some("Bogota".to_string()),
            },
            images: None,
            reporter_uid: owner.to_string(),
            is_anonymous_public: anonymous,
            assigned_to: assigned.map(String::from),
            priority: ReportPriority::Alta,
            status: ReportStatus::Pendiente,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_can_view_report_matrix() {
        let admin = user("a1", UserRole::Admin);
        let handler = user("e1", UserRole::Encargado);
        let other_handler = user("e2", UserRole::Encargado);
        let owner = user("c1", UserRole::Reportante);
        let stranger = user("c2", UserRole::Reportante);
        let r = report("c1", Some("e1"), false);

        assert!(can_view_report(&admin, &r));
        assert!(can_view_report(&handler, &r));
        assert!(!can_view_report(&other_handler, &r));
        assert!(can_view_report(&owner, &r));
        assert!(!can_view_report(&stranger, &r));
    }

    #[test]
    fn test_reporter_uid_projection() {
        let admin = user("a1", UserRole::Admin);
        let handler = user("e1", UserRole::Encargado);
        let owner = user("c1", UserRole::Reportante);

        let anon = report("c1", Some("e1"), true);
        assert!(ReportView::for_viewer(&anon, &admin).reporter_uid.is_some());
        assert!(ReportView::for_viewer(&anon, &owner).reporter_uid.is_some());
        assert!(ReportView::for_viewer(&anon, &handler).reporter_uid.is_none());

        let open = report("c1", Some("e1"), false);
        assert_eq!(
            ReportView::for_viewer(&open, &handler).reporter_uid.as_deref(),
            Some("c1")
        );
    }

    #[test]
    fn test_can_transition_roles() {
        let admin = user("a1", UserRole::Admin);
        let handler = user("e1", UserRole::Encargado);
        let other = user("e2", UserRole::Encargado);
        let owner = user("c1", UserRole::Reportante);
        let r = report("c1", Some("e1"), false);

        assert!(can_transition(&admin, &r));
        assert!(can_transition(&handler, &r));
        assert!(!can_transition(&other, &r));
        assert!(!can_transition(&owner, &r));
    }

    #[test]
    fn test_user_view_hides_email_from_strangers() {
        let owner = user("c1", UserRole::Reportante);
        let stranger = user("c2", UserRole::Reportante);
        let admin = user("a1", UserRole::Admin);

        assert!(UserView::for_viewer(&owner, &stranger).email.is_none());
        assert!(UserView::for_viewer(&owner, &owner).email.is_some());
        assert!(UserView::for_viewer(&owner, &admin).email.is_some());
    }

    #[test]
    fn test_handler_fields_only_on_encargado() {
        let handler = user("e1", UserRole::Encargado);
        let citizen = user("c1", UserRole::Reportante);
        let admin = user("a1", UserRole::Admin);

        assert!(UserView::for_viewer(&handler, &admin).organization.is_some());
        assert!(UserView::for_viewer(&citizen, &admin).organization.is_none());
    }
}
