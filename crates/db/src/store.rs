//! Document store abstraction.

use async_trait::async_trait;
use comunimapp_common::AppResult;
use serde_json::Value;
use std::sync::Arc;

/// Maximum number of writes per batch commit.
///
/// Mirrors the Firestore limit of 500 operations per batch. Bulk operations
/// are chunked at this size with no cross-batch atomicity; they are only run
/// for idempotent mutations (mark-as-read, bulk delete) so a crash mid-way
/// leaves a re-runnable partial state.
pub const MAX_BATCH_SIZE: usize = 500;

/// Shared handle to a document store.
pub type SharedStore = Arc<dyn DocumentStore>;

/// Equality filter on a top-level document field.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Field path.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

impl Filter {
    /// Filter documents where `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Sort direction for query ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

/// Query pagination and ordering options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Optional ordering on a field.
    pub order_by: Option<(String, SortDirection)>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl QueryOptions {
    /// Order descending by a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            order_by: Some((field.into(), SortDirection::Descending)),
            ..Self::default()
        }
    }

    /// Set the result limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the result offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A single write in a batch commit.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Merge a patch into an existing document.
    Update {
        /// Collection name.
        collection: String,
        /// Document ID.
        id: String,
        /// Fields to merge.
        patch: Value,
    },
    /// Delete a document.
    Delete {
        /// Collection name.
        collection: String,
        /// Document ID.
        id: String,
    },
}

/// Abstraction over the managed document database.
///
/// Documents are JSON objects. Individual `update` calls are per-document
/// atomic merges; `commit` executes a batch in chunks of [`MAX_BATCH_SIZE`]
/// without cross-chunk atomicity. There is no retry layer anywhere: every
/// call is at-most-one-attempt and failures surface as [`AppError::Store`].
///
/// [`AppError::Store`]: comunimapp_common::AppError::Store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by ID. Returns `None` when absent.
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> AppResult<()>;

    /// Merge `patch` into an existing document.
    ///
    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<()>;

    /// Delete a document. Deleting an absent document is a no-op.
    async fn delete(&self, collection: &str, id: &str) -> AppResult<()>;

    /// Query a collection with equality filters.
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        options: QueryOptions,
    ) -> AppResult<Vec<Value>>;

    /// Apply a batch of writes, chunked at [`MAX_BATCH_SIZE`].
    ///
    /// Returns the number of writes applied.
    async fn commit(&self, ops: Vec<WriteOp>) -> AppResult<u64>;
}
