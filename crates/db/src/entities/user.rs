//! User entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User roles in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Citizen who files reports.
    Reportante,
    /// Case handler assigned to investigate reports.
    Encargado,
    /// Assigns reports, views everything, manages users.
    Admin,
}

impl UserRole {
    /// Wire name for the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reportante => "reportante",
            Self::Encargado => "encargado",
            Self::Admin => "admin",
        }
    }

    /// Roles that require email verification before login.
    #[must_use]
    pub const fn needs_verification(self) -> bool {
        matches!(self, Self::Reportante | Self::Encargado)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User document.
///
/// `password_hash` and `verification_token` never leave the store layer
/// unprojected; every API response goes through a role-aware view first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    /// Handler-only field.
    #[serde(default)]
    pub organization: Option<String>,
    /// Handler-only field.
    #[serde(default)]
    pub phone: Option<String>,
    /// Handler-only field.
    #[serde(default)]
    pub zone: Option<String>,
    pub password_hash: String,
    #[serde(default)]
    pub verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}

impl User {
    /// Whether this user is an administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// Whether this user is a case handler.
    #[must_use]
    pub const fn is_encargado(&self) -> bool {
        matches!(self.role, UserRole::Encargado)
    }

    /// Whether this user is a reporter.
    #[must_use]
    pub const fn is_reportante(&self) -> bool {
        matches!(self.role, UserRole::Reportante)
    }
}
