//! Read access to stored risks.

use std::sync::Arc;

use risk_storage::RiskRepository;
use risk_types::{Risk, RiskFilter, RiskHistoryEntry, RiskId, RiskListing, RiskStatus, RiskSummary};

use crate::error::{EngineError, EngineResult};

/// Listings, single-record lookups and audit trails.
pub struct QuerySurface {
    repository: Arc<dyn RiskRepository>,
}

impl QuerySurface {
    pub fn new(repository: Arc<dyn RiskRepository>) -> Self {
        Self { repository }
    }

    /// Risks matching `filter`, most severe and most recent first, plus a
    /// summary of the open risks for the same milestone filter.
    ///
    /// The summary ignores the status and severity filters so callers always
    /// see the full open picture. A `limit` of 0 means unbounded.
    pub async fn list(&self, filter: &RiskFilter, limit: usize) -> EngineResult<RiskListing> {
        let risks = self.repository.list_risks(filter, limit).await?;

        let open_filter = RiskFilter {
            milestone_id: filter.milestone_id.clone(),
            status: Some(RiskStatus::Open),
            severity: None,
        };
        let open = self.repository.list_risks(&open_filter, 0).await?;

        Ok(RiskListing {
            risks,
            summary: RiskSummary::from_risks(&open),
        })
    }

    pub async fn get(&self, id: RiskId) -> EngineResult<Risk> {
        self.repository
            .get_risk(&id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    /// Audit trail, oldest first. Unknown ids are `NotFound`.
    pub async fn history(&self, id: RiskId) -> EngineResult<Vec<RiskHistoryEntry>> {
        self.get(id).await?;
        Ok(self.repository.history(&id).await?)
    }
}
