use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Application, ApplicationId, DistributionData, Metric, MetricIdentifier, Pool, PoolKey, Vote,
};
use super::eligibility::EligibilityCriteria;
use super::repository::{FundingRepository, RepositoryError};

#[derive(Default)]
struct Tables {
    metrics: BTreeMap<MetricIdentifier, Metric>,
    pools: HashMap<PoolKey, Pool>,
    applications: HashMap<PoolKey, BTreeMap<ApplicationId, Application>>,
    eligibility: HashMap<PoolKey, EligibilityCriteria>,
    // Keyed by the normalized voter address.
    votes: HashMap<PoolKey, BTreeMap<String, Vote>>,
}

/// Process-local repository backing the service binary and the test suites.
#[derive(Default, Clone)]
pub struct InMemoryFundingRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryFundingRepository {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    /// Runs `write` on an open pool while the table lock is held.
    fn with_open_pool<T>(
        &self,
        key: &PoolKey,
        write: impl FnOnce(&mut Pool) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.tables()?;
        let pool = guard.pools.get_mut(key).ok_or(RepositoryError::NotFound)?;
        if pool.finalized {
            return Err(RepositoryError::Finalized);
        }
        write(pool)
    }
}

impl FundingRepository for InMemoryFundingRepository {
    fn insert_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>, RepositoryError> {
        let mut guard = self.tables()?;
        let mut incoming = BTreeSet::new();
        for metric in &metrics {
            if guard.metrics.contains_key(&metric.identifier)
                || !incoming.insert(metric.identifier.clone())
            {
                return Err(RepositoryError::Conflict);
            }
        }
        for metric in &metrics {
            guard
                .metrics
                .insert(metric.identifier.clone(), metric.clone());
        }
        Ok(metrics)
    }

    fn fetch_metric(
        &self,
        identifier: &MetricIdentifier,
    ) -> Result<Option<Metric>, RepositoryError> {
        Ok(self.tables()?.metrics.get(identifier).cloned())
    }

    fn save_metric(&self, metric: Metric) -> Result<(), RepositoryError> {
        self.tables()?
            .metrics
            .insert(metric.identifier.clone(), metric);
        Ok(())
    }

    fn list_metrics(&self) -> Result<Vec<Metric>, RepositoryError> {
        Ok(self.tables()?.metrics.values().cloned().collect())
    }

    fn insert_pool(&self, pool: Pool) -> Result<Pool, RepositoryError> {
        let mut guard = self.tables()?;
        if guard.pools.contains_key(&pool.key) {
            return Err(RepositoryError::Conflict);
        }
        guard.pools.insert(pool.key.clone(), pool.clone());
        Ok(pool)
    }

    fn fetch_pool(&self, key: &PoolKey) -> Result<Option<Pool>, RepositoryError> {
        Ok(self.tables()?.pools.get(key).cloned())
    }

    fn store_distribution(
        &self,
        key: &PoolKey,
        data: DistributionData,
    ) -> Result<(), RepositoryError> {
        self.with_open_pool(key, |pool| {
            pool.distribution = Some(data);
            Ok(())
        })
    }

    fn store_custom_distribution(
        &self,
        key: &PoolKey,
        data: Option<DistributionData>,
    ) -> Result<Option<DistributionData>, RepositoryError> {
        self.with_open_pool(key, |pool| {
            Ok(std::mem::replace(&mut pool.custom_distribution, data))
        })
    }

    fn mark_finalized(&self, key: &PoolKey) -> Result<Pool, RepositoryError> {
        self.with_open_pool(key, |pool| {
            if pool.effective_distribution().is_none() {
                return Err(RepositoryError::NotFound);
            }
            pool.finalized = true;
            Ok(pool.clone())
        })
    }

    fn upsert_applications(
        &self,
        key: &PoolKey,
        applications: Vec<Application>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.tables()?;
        let entries = guard.applications.entry(key.clone()).or_default();
        for application in applications {
            entries.insert(application.application_id.clone(), application);
        }
        Ok(())
    }

    fn applications(&self, key: &PoolKey) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .tables()?
            .applications
            .get(key)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    fn upsert_eligibility(
        &self,
        key: &PoolKey,
        criteria: EligibilityCriteria,
    ) -> Result<(), RepositoryError> {
        self.tables()?.eligibility.insert(key.clone(), criteria);
        Ok(())
    }

    fn fetch_eligibility(
        &self,
        key: &PoolKey,
    ) -> Result<Option<EligibilityCriteria>, RepositoryError> {
        Ok(self.tables()?.eligibility.get(key).cloned())
    }

    fn upsert_vote(&self, vote: Vote) -> Result<Vote, RepositoryError> {
        let mut guard = self.tables()?;
        guard
            .votes
            .entry(vote.key.clone())
            .or_default()
            .insert(vote.voter.normalized(), vote.clone());
        Ok(vote)
    }

    fn votes(&self, key: &PoolKey) -> Result<Vec<Vote>, RepositoryError> {
        Ok(self
            .tables()?
            .votes
            .get(key)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }
}
