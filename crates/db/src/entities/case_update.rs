//! Case update entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::ReportStatus;

/// Kinds of updates a handler or administrator can post on a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Progress note.
    Avance,
    /// Observation.
    Observacion,
    /// Status change.
    CambioEstado,
    /// Case closure.
    Cierre,
}

impl UpdateType {
    /// Wire name for the update type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avance => "avance",
            Self::Observacion => "observacion",
            Self::CambioEstado => "cambio_estado",
            Self::Cierre => "cierre",
        }
    }
}

/// Case update document. Child of exactly one report.
///
/// `encargado_id` identifies the author and is hidden from the public view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseUpdate {
    pub id: String,
    pub report_id: String,
    pub encargado_id: String,
    pub message: String,
    pub update_type: UpdateType,
    #[serde(default)]
    pub new_status: Option<ReportStatus>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}
