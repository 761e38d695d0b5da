//! Case update repository.

use comunimapp_common::{AppError, AppResult};

use super::{from_doc, to_doc};
use crate::collections;
use crate::entities::case_update::CaseUpdate;
use crate::store::{Filter, QueryOptions, SharedStore, WriteOp};

/// Case update repository for document store operations.
#[derive(Clone)]
pub struct CaseUpdateRepository {
    store: SharedStore,
}

impl CaseUpdateRepository {
    /// Create a new case update repository.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Find a case update by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<CaseUpdate>> {
        match self.store.get(collections::CASE_UPDATES, id).await? {
            Some(doc) => Ok(Some(from_doc(doc)?)),
            None => Ok(None),
        }
    }

    /// Get a case update by ID, failing when absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<CaseUpdate> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case update {id} not found")))
    }

    /// Updates posted on a report, newest first.
    pub async fn find_by_report(&self, report_id: &str) -> AppResult<Vec<CaseUpdate>> {
        let filters = [Filter::eq("report_id", report_id)];
        let docs = self
            .store
            .query(
                collections::CASE_UPDATES,
                &filters,
                QueryOptions::desc("created_at"),
            )
            .await?;
        docs.into_iter().map(from_doc).collect()
    }

    /// Number of updates posted on a report.
    pub async fn count_by_report(&self, report_id: &str) -> AppResult<u64> {
        let filters = [Filter::eq("report_id", report_id)];
        let docs = self
            .store
            .query(collections::CASE_UPDATES, &filters, QueryOptions::default())
            .await?;
        Ok(docs.len() as u64)
    }

    /// Create a new case update document.
    pub async fn create(&self, update: &CaseUpdate) -> AppResult<()> {
        self.store
            .set(collections::CASE_UPDATES, &update.id, to_doc(update)?)
            .await
    }

    /// Delete a case update document.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.store.delete(collections::CASE_UPDATES, id).await
    }

    /// Delete every update posted on a report, returning the count. Used by
    /// the report deletion cascade.
    pub async fn delete_by_report(&self, report_id: &str) -> AppResult<u64> {
        let updates = self.find_by_report(report_id).await?;
        if updates.is_empty() {
            return Ok(0);
        }

        let ops = updates
            .into_iter()
            .map(|u| WriteOp::Delete {
                collection: collections::CASE_UPDATES.to_string(),
                id: u.id,
            })
            .collect::<Vec<_>>();
        self.store.commit(ops).await
    }
}
