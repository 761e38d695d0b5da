//! Domain entities persisted as Firestore documents.

pub mod case_update;
pub mod fcm_token;
pub mod notification;
pub mod report;
pub mod user;

pub use case_update::{CaseUpdate, UpdateType};
pub use fcm_token::FcmToken;
pub use notification::{Notification, NotificationType};
pub use report::{Report, ReportLocation, ReportPriority, ReportStatus};
pub use user::{User, UserRole};
