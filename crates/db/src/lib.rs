//! Document store layer for comunimapp.
//!
//! All persistent state lives in independent Firestore collections keyed by
//! generated IDs. The [`DocumentStore`] trait abstracts the store so services
//! and tests can run against an in-memory implementation.

pub mod entities;
pub mod firestore;
pub mod google_auth;
pub mod memory;
pub mod repositories;
pub mod store;

pub use firestore::FirestoreStore;
pub use google_auth::GoogleAuth;
pub use memory::MemoryStore;
pub use store::{
    DocumentStore, Filter, MAX_BATCH_SIZE, QueryOptions, SharedStore, SortDirection, WriteOp,
};

/// Collection names used across the application.
pub mod collections {
    /// Users collection.
    pub const USERS: &str = "users";
    /// Reports collection.
    pub const REPORTS: &str = "reports";
    /// Case updates collection.
    pub const CASE_UPDATES: &str = "case_updates";
    /// Notifications collection.
    pub const NOTIFICATIONS: &str = "notifications";
    /// FCM device tokens collection.
    pub const FCM_TOKENS: &str = "fcm_tokens";
}
