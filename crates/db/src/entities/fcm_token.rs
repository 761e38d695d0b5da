//! FCM device token entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered FCM device token. A user may hold several, one per device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcmToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}
