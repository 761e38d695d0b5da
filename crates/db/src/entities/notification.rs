//! Notification entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification types sent to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A new report was filed.
    NuevoReporte,
    /// A report was assigned (or acknowledged at creation).
    AsignacionCaso,
    /// A handler posted a progress update.
    NuevoAvance,
    /// A report changed status.
    CambioEstado,
    /// A case was closed.
    CierreCaso,
}

impl NotificationType {
    /// Wire name for the notification type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NuevoReporte => "nuevo_reporte",
            Self::AsignacionCaso => "asignacion_caso",
            Self::NuevoAvance => "nuevo_avance",
            Self::CambioEstado => "cambio_estado",
            Self::CierreCaso => "cierre_caso",
        }
    }
}

/// Notification document.
///
/// Created by the workflow/report/case-update fan-out and mutated only by the
/// recipient (mark-read) or bulk delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    /// Recipient.
    pub user_id: String,
    #[serde(default)]
    pub report_id: Option<String>,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
