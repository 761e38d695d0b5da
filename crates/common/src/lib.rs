//! Common utilities and shared types for comunimapp.
//!
//! This crate provides foundational components used across all comunimapp crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: UUID-based document identifiers via [`IdGenerator`]

pub mod config;
pub mod error;
pub mod id;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
