//! Report repository.

use comunimapp_common::{AppError, AppResult};
use serde_json::Value;

use super::{from_doc, to_doc};
use crate::collections;
use crate::entities::report::{Report, ReportPriority, ReportStatus};
use crate::store::{Filter, QueryOptions, SharedStore};

/// Report repository for document store operations.
#[derive(Clone)]
pub struct ReportRepository {
    store: SharedStore,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Report>> {
        match self.store.get(collections::REPORTS, id).await? {
            Some(doc) => Ok(Some(from_doc(doc)?)),
            None => Ok(None),
        }
    }

    /// Get a report by ID, failing when absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<Report> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))
    }

    /// List all reports, optionally filtered by status and priority.
    pub async fn find_all(
        &self,
        status: Option<ReportStatus>,
        priority: Option<ReportPriority>,
    ) -> AppResult<Vec<Report>> {
        self.find_filtered(Vec::new(), status, priority).await
    }

    /// Reports filed by a given reporter.
    pub async fn find_by_reporter(
        &self,
        reporter_uid: &str,
        status: Option<ReportStatus>,
        priority: Option<ReportPriority>,
    ) -> AppResult<Vec<Report>> {
        self.find_filtered(
            vec![Filter::eq("reporter_uid", reporter_uid)],
            status,
            priority,
        )
        .await
    }

    /// Reports assigned to a given handler.
    pub async fn find_by_assignee(
        &self,
        assigned_to: &str,
        status: Option<ReportStatus>,
        priority: Option<ReportPriority>,
    ) -> AppResult<Vec<Report>> {
        self.find_filtered(vec![Filter::eq("assigned_to", assigned_to)], status, priority)
            .await
    }

    /// Create a new report document.
    pub async fn create(&self, report: &Report) -> AppResult<()> {
        self.store
            .set(collections::REPORTS, &report.id, to_doc(report)?)
            .await
    }

    /// Merge a patch into a report document and return the updated entity.
    pub async fn update(&self, id: &str, patch: Value) -> AppResult<Report> {
        self.store.update(collections::REPORTS, id, patch).await?;
        self.get_by_id(id).await
    }

    /// Delete a report document.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.store.delete(collections::REPORTS, id).await
    }

    async fn find_filtered(
        &self,
        mut filters: Vec<Filter>,
        status: Option<ReportStatus>,
        priority: Option<ReportPriority>,
    ) -> AppResult<Vec<Report>> {
        if let Some(status) = status {
            filters.push(Filter::eq("status", status.as_str()));
        }
        if let Some(priority) = priority {
            filters.push(Filter::eq("priority", priority.as_str()));
        }

        let docs = self
            .store
            .query(
                collections::REPORTS,
                &filters,
                QueryOptions::desc("created_at"),
            )
            .await?;
        docs.into_iter().map(from_doc).collect()
    }
}
