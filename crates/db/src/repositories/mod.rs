//! Typed repositories over the document store, one per collection.

mod case_update;
mod fcm_token;
mod notification;
mod report;
mod user;

pub use case_update::CaseUpdateRepository;
pub use fcm_token::FcmTokenRepository;
pub use notification::NotificationRepository;
pub use report::ReportRepository;
pub use user::UserRepository;

use comunimapp_common::{AppError, AppResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Serialize an entity for storage.
pub(crate) fn to_doc<T: Serialize>(entity: &T) -> AppResult<Value> {
    serde_json::to_value(entity).map_err(|e| AppError::Store(e.to_string()))
}

/// Deserialize a stored document into an entity.
pub(crate) fn from_doc<T: DeserializeOwned>(doc: Value) -> AppResult<T> {
    serde_json::from_value(doc).map_err(|e| AppError::Store(e.to_string()))
}
