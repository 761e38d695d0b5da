//! ID generation utilities.

use uuid::Uuid;

/// ID generator for documents.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new random UUID v4 document ID.
    #[must_use]
    pub fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate a cryptographically secure random token.
    ///
    /// Used for email verification links.
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
