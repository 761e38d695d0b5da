//! Report entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Report workflow states.
///
/// Transitions between states follow a fixed directed graph enforced by the
/// workflow service; `Cerrado` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Awaiting assignment.
    Pendiente,
    /// Assigned to a handler.
    Asignado,
    /// Investigation in progress.
    EnProceso,
    /// Resolved, pending closure.
    Resuelto,
    /// Closed. Terminal.
    Cerrado,
}

impl ReportStatus {
    /// Wire name for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::Asignado => "asignado",
            Self::EnProceso => "en_proceso",
            Self::Resuelto => "resuelto",
            Self::Cerrado => "cerrado",
        }
    }

    /// All statuses, in workflow order.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Pendiente,
            Self::Asignado,
            Self::EnProceso,
            Self::Resuelto,
            Self::Cerrado,
        ]
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPriority {
    Baja,
    Media,
    Alta,
}

impl ReportPriority {
    /// Wire name for the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baja => "baja",
            Self::Media => "media",
            Self::Alta => "alta",
        }
    }
}

impl std::fmt::Display for ReportPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic location of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Report document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub description: String,
    pub location: ReportLocation,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    /// Always set; visibility to non-owners is controlled by
    /// `is_anonymous_public` at projection time.
    pub reporter_uid: String,
    #[serde(default)]
    pub is_anonymous_public: bool,
    /// Handler the report is assigned to, if any.
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub priority: ReportPriority,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Whether the report carries photographic evidence.
    #[must_use]
    pub fn has_images(&self) -> bool {
        self.images.as_ref().is_some_and(|imgs| !imgs.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let names: Vec<String> = ReportStatus::all()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["pendiente", "asignado", "en_proceso", "resuelto", "cerrado"]
        );
        assert_eq!(
            serde_json::to_value(ReportStatus::EnProceso).ok(),
            Some(serde_json::json!("en_proceso"))
        );
    }
}
