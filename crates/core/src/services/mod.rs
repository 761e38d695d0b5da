//! Service implementations.

pub mod ai;
pub mod authorization;
pub mod case_update;
pub mod email;
pub mod identity;
pub mod media;
pub mod metrics;
pub mod notification;
pub mod push_notification;
pub mod report;
pub mod session;
pub mod user;
pub mod workflow;
