use serde::Serialize;

use super::domain::{
    Application, DistributionData, Metric, MetricIdentifier, Pool, PoolKey, Vote,
};
use super::eligibility::{EligibilityCriteria, EligibilityPolicy};

/// Storage abstraction so the service and calculation modules can be exercised in isolation.
///
/// Plain get/save apart from one rule: a finalized pool is never written again.
pub trait FundingRepository: Send + Sync {
    /// Fails with `Conflict` if any identifier is already registered; nothing is written then.
    fn insert_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>, RepositoryError>;
    fn fetch_metric(&self, identifier: &MetricIdentifier)
        -> Result<Option<Metric>, RepositoryError>;
    fn save_metric(&self, metric: Metric) -> Result<(), RepositoryError>;
    fn list_metrics(&self) -> Result<Vec<Metric>, RepositoryError>;

    fn insert_pool(&self, pool: Pool) -> Result<Pool, RepositoryError>;
    fn fetch_pool(&self, key: &PoolKey) -> Result<Option<Pool>, RepositoryError>;

    // Pool writes are field-level and refuse a finalized pool, checked atomically with the
    // write. A missing pool is `NotFound`.
    fn store_distribution(&self, key: &PoolKey, data: DistributionData)
        -> Result<(), RepositoryError>;
    /// Returns the override that was replaced, if any. `None` clears it.
    fn store_custom_distribution(
        &self,
        key: &PoolKey,
        data: Option<DistributionData>,
    ) -> Result<Option<DistributionData>, RepositoryError>;
    /// Locks the pool and returns it as stored. Fails with `NotFound` when there is no
    /// distribution, computed or custom, to freeze.
    fn mark_finalized(&self, key: &PoolKey) -> Result<Pool, RepositoryError>;

    fn upsert_applications(
        &self,
        key: &PoolKey,
        applications: Vec<Application>,
    ) -> Result<(), RepositoryError>;
    fn applications(&self, key: &PoolKey) -> Result<Vec<Application>, RepositoryError>;

    fn upsert_eligibility(
        &self,
        key: &PoolKey,
        criteria: EligibilityCriteria,
    ) -> Result<(), RepositoryError>;
    fn fetch_eligibility(
        &self,
        key: &PoolKey,
    ) -> Result<Option<EligibilityCriteria>, RepositoryError>;

    /// Replaces any ballot the same voter (compared case-insensitively) already cast in the pool.
    fn upsert_vote(&self, vote: Vote) -> Result<Vote, RepositoryError>;
    fn votes(&self, key: &PoolKey) -> Result<Vec<Vote>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("pool is finalized")]
    Finalized,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of a pool for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolView {
    #[serde(flatten)]
    pub pool: Pool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility_type: Option<EligibilityPolicy>,
    pub application_count: usize,
    pub vote_count: usize,
}
