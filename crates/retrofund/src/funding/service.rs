use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use super::ballot::validate_ballot;
use super::calculation::{CalculationDataPreparer, DistributionEngine, PreparedCalculationData};
use super::domain::{
    Application, ApplicationId, Ballot, DistributionData, DistributionEntry, Metric,
    MetricIdentifier, MetricUpdate, Pool, PoolKey, Vote, VoterAddress,
};
use super::eligibility::{EligibilityCriteria, EligibilityResolver};
use super::error::FundingError;
use super::external::{Indexer, MetricsProvider, RoundWithApplications, SignatureVerifier};
use super::repository::{FundingRepository, PoolView, RepositoryError};

/// Allowed drift, 1e-6, when checking that a manager-supplied distribution adds up to 100.
fn custom_distribution_tolerance() -> Decimal {
    Decimal::new(1, 6)
}

/// External systems the service reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub indexer: Arc<dyn Indexer>,
    pub metrics: Arc<dyn MetricsProvider>,
    pub signatures: Arc<dyn SignatureVerifier>,
}

/// Payload for registering a pool against an indexed round.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolRequest {
    pub chain_id: u64,
    pub pool_id: String,
    pub metric_identifiers: Vec<MetricIdentifier>,
    pub eligibility: EligibilityCriteria,
}

impl CreatePoolRequest {
    pub fn key(&self) -> PoolKey {
        PoolKey::new(self.chain_id, self.pool_id.clone())
    }
}

/// Orchestrates pool lifecycle, voting and distribution over a repository and the external
/// collaborators.
pub struct FundingService<R> {
    repository: Arc<R>,
    indexer: Arc<dyn Indexer>,
    signatures: Arc<dyn SignatureVerifier>,
    preparer: CalculationDataPreparer<R>,
}

impl<R> FundingService<R>
where
    R: FundingRepository + 'static,
{
    pub fn new(repository: Arc<R>, collaborators: Collaborators) -> Self {
        let preparer = CalculationDataPreparer::new(
            Arc::clone(&repository),
            Arc::clone(&collaborators.indexer),
            collaborators.metrics,
        );

        Self {
            repository,
            indexer: collaborators.indexer,
            signatures: collaborators.signatures,
            preparer,
        }
    }

    /// Registers a batch of metrics. The whole batch is rejected if any identifier exists.
    pub fn add_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>, FundingError> {
        if metrics.is_empty() {
            return Err(FundingError::BadRequest("no metrics supplied".to_string()));
        }
        if let Some(metric) = metrics
            .iter()
            .find(|metric| metric.identifier.0.trim().is_empty())
        {
            return Err(FundingError::BadRequest(format!(
                "metric titled {:?} has an empty identifier",
                metric.title
            )));
        }

        let stored = self.repository.insert_metrics(metrics)?;
        info!(count = stored.len(), "registered metrics");
        Ok(stored)
    }

    pub fn update_metric(
        &self,
        identifier: &MetricIdentifier,
        update: MetricUpdate,
    ) -> Result<Metric, FundingError> {
        let mut metric = self
            .repository
            .fetch_metric(identifier)?
            .ok_or_else(|| FundingError::NotFound(format!("metric {identifier}")))?;

        update.apply(&mut metric);
        self.repository.save_metric(metric.clone())?;
        Ok(metric)
    }

    pub fn list_metrics(&self) -> Result<Vec<Metric>, FundingError> {
        Ok(self.repository.list_metrics()?)
    }

    /// The round must be known to the indexer and every metric must be registered and enabled.
    pub async fn create_pool(&self, request: CreatePoolRequest) -> Result<Pool, FundingError> {
        let key = request.key();

        if request.metric_identifiers.is_empty() {
            return Err(FundingError::BadRequest(format!(
                "pool {key} needs at least one metric"
            )));
        }
        if let Some(duplicate) = first_duplicate(&request.metric_identifiers) {
            return Err(FundingError::BadRequest(format!(
                "metric {duplicate} is listed more than once"
            )));
        }

        self.fetch_round(&key).await?;

        if self.repository.fetch_pool(&key)?.is_some() {
            return Err(FundingError::Repository(RepositoryError::Conflict));
        }

        for identifier in &request.metric_identifiers {
            let metric = self
                .repository
                .fetch_metric(identifier)?
                .ok_or_else(|| FundingError::NotFound(format!("metric {identifier}")))?;
            if !metric.enabled {
                return Err(FundingError::BadRequest(format!(
                    "metric {identifier} is disabled"
                )));
            }
        }

        request.eligibility.validate()?;

        let pool = self
            .repository
            .insert_pool(Pool::new(key.clone(), request.metric_identifiers))?;
        self.repository
            .upsert_eligibility(&key, request.eligibility)?;

        info!(pool = %key, metrics = pool.metric_identifiers.len(), "created pool");
        Ok(pool)
    }

    pub fn pool(&self, key: &PoolKey) -> Result<PoolView, FundingError> {
        let pool = self.require_pool(key)?;
        let eligibility_type = self
            .repository
            .fetch_eligibility(key)?
            .map(|criteria| criteria.policy());

        Ok(PoolView {
            pool,
            eligibility_type,
            application_count: self.repository.applications(key)?.len(),
            vote_count: self.repository.votes(key)?.len(),
        })
    }

    /// Pulls the round's applications from the indexer into the local store.
    pub async fn sync_pool(&self, key: &PoolKey) -> Result<Vec<Application>, FundingError> {
        self.require_pool(key)?;
        let round = self.fetch_round(key).await?;

        let applications: Vec<Application> = round
            .applications
            .into_iter()
            .map(|indexed| Application {
                key: key.clone(),
                application_id: indexed.id,
                project_id: indexed.project_id,
            })
            .collect();

        self.repository
            .upsert_applications(key, applications.clone())?;
        info!(pool = %key, applications = applications.len(), "synchronised pool applications");
        Ok(applications)
    }

    pub fn create_application(
        &self,
        key: &PoolKey,
        application_id: ApplicationId,
    ) -> Result<Application, FundingError> {
        self.require_pool(key)?;

        let application = Application {
            key: key.clone(),
            application_id,
            project_id: None,
        };
        self.repository
            .upsert_applications(key, vec![application.clone()])?;
        Ok(application)
    }

    /// Manager-only replacement of the pool's eligibility criteria.
    pub async fn update_eligibility(
        &self,
        key: &PoolKey,
        signature: &str,
        criteria: EligibilityCriteria,
    ) -> Result<(), FundingError> {
        self.authorize_manager(key, signature).await?;
        self.require_pool(key)?;
        criteria.validate()?;

        self.repository.upsert_eligibility(key, criteria)?;
        info!(pool = %key, "updated eligibility criteria");
        Ok(())
    }

    pub fn is_voter_eligible(
        &self,
        key: &PoolKey,
        voter: &VoterAddress,
    ) -> Result<bool, FundingError> {
        let criteria = self.require_eligibility(key)?;
        Ok(EligibilityResolver::new(&criteria).is_eligible(voter))
    }

    /// Stores the voter's ballot, replacing any earlier one in full.
    pub fn submit_vote(
        &self,
        key: &PoolKey,
        voter: VoterAddress,
        ballot: Ballot,
    ) -> Result<Vote, FundingError> {
        let pool = self.require_pool(key)?;
        if pool.finalized {
            return Err(FundingError::ActionNotAllowed(format!(
                "pool {key} is finalised"
            )));
        }
        self.admit_ballot(&pool, &voter, &ballot)?;

        let vote = self.repository.upsert_vote(Vote {
            key: key.clone(),
            voter,
            ballot,
            updated_at: Utc::now(),
        })?;
        info!(pool = %key, voter = %vote.voter, "recorded vote");
        Ok(vote)
    }

    pub async fn calculation_data(
        &self,
        key: &PoolKey,
    ) -> Result<PreparedCalculationData, FundingError> {
        self.preparer.prepare(key).await
    }

    /// Recomputes and stores the pool's distribution from the current ballots.
    pub async fn calculate_distribution(
        &self,
        key: &PoolKey,
    ) -> Result<Vec<DistributionEntry>, FundingError> {
        self.ensure_open(key)?;
        let criteria = self.require_eligibility(key)?;
        let prepared = self.preparer.prepare(key).await?;
        let votes = self.repository.votes(key)?;

        let distribution = DistributionEngine::new(&criteria).calculate(&prepared, &votes)?;

        // Refused by the store if the pool was finalized while the inputs were fetched.
        self.repository.store_distribution(
            key,
            DistributionData {
                last_updated: Utc::now(),
                distribution: distribution.clone(),
            },
        )?;

        info!(
            pool = %key,
            applications = distribution.len(),
            votes = votes.len(),
            "calculated distribution"
        );
        Ok(distribution)
    }

    /// What-if calculation: the hypothetical ballot stands in for the voter's stored one.
    /// Nothing is persisted, so this also works on finalised pools.
    pub async fn predict_distribution(
        &self,
        key: &PoolKey,
        voter: VoterAddress,
        ballot: Ballot,
    ) -> Result<Vec<DistributionEntry>, FundingError> {
        let pool = self.require_pool(key)?;
        let criteria = self.admit_ballot(&pool, &voter, &ballot)?;
        let prepared = self.preparer.prepare(key).await?;

        let mut votes = self.repository.votes(key)?;
        votes.retain(|vote| !vote.voter.matches(&voter));
        votes.push(Vote {
            key: key.clone(),
            voter,
            ballot,
            updated_at: Utc::now(),
        });

        Ok(DistributionEngine::new(&criteria).calculate(&prepared, &votes)?)
    }

    /// Locks the pool. Computes a distribution first when none exists yet.
    pub async fn finalize_distribution(
        &self,
        key: &PoolKey,
        signature: &str,
    ) -> Result<DistributionData, FundingError> {
        self.authorize_manager(key, signature).await?;
        let pool = self.ensure_open(key)?;

        if pool.effective_distribution().is_none() {
            self.calculate_distribution(key).await?;
        }

        let pool = self.repository.mark_finalized(key)?;
        let effective = pool.effective_distribution().cloned().ok_or_else(|| {
            FundingError::NotFound(format!("distribution for pool {key}"))
        })?;

        info!(pool = %key, "finalised distribution");
        Ok(effective)
    }

    /// Manager override that wins over the computed distribution until removed.
    pub async fn set_custom_distribution(
        &self,
        key: &PoolKey,
        signature: &str,
        distribution: Vec<DistributionEntry>,
    ) -> Result<DistributionData, FundingError> {
        self.authorize_manager(key, signature).await?;
        self.ensure_open(key)?;
        validate_custom_distribution(&distribution)?;

        let data = DistributionData {
            last_updated: Utc::now(),
            distribution,
        };
        self.repository
            .store_custom_distribution(key, Some(data.clone()))?;

        info!(pool = %key, entries = data.distribution.len(), "stored custom distribution");
        Ok(data)
    }

    pub async fn delete_custom_distribution(
        &self,
        key: &PoolKey,
        signature: &str,
    ) -> Result<(), FundingError> {
        self.authorize_manager(key, signature).await?;
        self.ensure_open(key)?;

        if self.repository.store_custom_distribution(key, None)?.is_none() {
            warn!(pool = %key, "no custom distribution to remove");
            return Ok(());
        }
        info!(pool = %key, "removed custom distribution");
        Ok(())
    }

    fn require_pool(&self, key: &PoolKey) -> Result<Pool, FundingError> {
        self.repository
            .fetch_pool(key)?
            .ok_or_else(|| FundingError::NotFound(format!("pool {key}")))
    }

    fn ensure_open(&self, key: &PoolKey) -> Result<Pool, FundingError> {
        let pool = self.require_pool(key)?;
        if pool.finalized {
            return Err(FundingError::ActionNotAllowed(format!(
                "pool {key} is finalised"
            )));
        }
        Ok(pool)
    }

    /// Shared by voting and prediction: a malformed address is `BadRequest`, an ineligible
    /// voter `ActionNotAllowed`.
    fn admit_ballot(
        &self,
        pool: &Pool,
        voter: &VoterAddress,
        ballot: &Ballot,
    ) -> Result<EligibilityCriteria, FundingError> {
        if !voter.is_well_formed() {
            return Err(FundingError::BadRequest(format!(
                "{voter} is not a valid address"
            )));
        }
        validate_ballot(ballot, pool)?;

        let criteria = self.require_eligibility(&pool.key)?;
        if !EligibilityResolver::new(&criteria).is_eligible(voter) {
            return Err(FundingError::ActionNotAllowed(format!(
                "{voter} is not eligible to vote in pool {}",
                pool.key
            )));
        }
        Ok(criteria)
    }

    fn require_eligibility(&self, key: &PoolKey) -> Result<EligibilityCriteria, FundingError> {
        self.repository
            .fetch_eligibility(key)?
            .ok_or_else(|| FundingError::NotFound(format!("eligibility criteria for pool {key}")))
    }

    async fn fetch_round(&self, key: &PoolKey) -> Result<RoundWithApplications, FundingError> {
        self.indexer
            .round_with_applications(key.chain_id, &key.pool_id)
            .await?
            .ok_or_else(|| FundingError::NotFound(format!("round {key} on the indexer")))
    }

    async fn authorize_manager(&self, key: &PoolKey, signature: &str) -> Result<(), FundingError> {
        let signer = self
            .signatures
            .recover_signer(&key.signing_message(), signature)
            .await?;
        let round = self.fetch_round(key).await?;

        if !round.is_manager(&signer) {
            warn!(pool = %key, signer = %signer, "rejected non-manager signature");
            return Err(FundingError::Unauthorized(format!(
                "{signer} is not a manager of pool {key}"
            )));
        }
        Ok(())
    }
}

fn first_duplicate(identifiers: &[MetricIdentifier]) -> Option<MetricIdentifier> {
    let mut seen = HashSet::new();
    identifiers
        .iter()
        .find(|identifier| !seen.insert(*identifier))
        .cloned()
}

fn validate_custom_distribution(distribution: &[DistributionEntry]) -> Result<(), FundingError> {
    let mut seen = HashSet::new();
    for entry in distribution {
        if entry.distribution_percentage < Decimal::ZERO
            || entry.distribution_percentage > Decimal::ONE_HUNDRED
        {
            return Err(FundingError::BadRequest(format!(
                "percentage {} for application {} must be between 0 and 100",
                entry.distribution_percentage, entry.application_id
            )));
        }
        if !seen.insert(&entry.application_id) {
            return Err(FundingError::BadRequest(format!(
                "application {} appears more than once",
                entry.application_id
            )));
        }
    }

    let total: Decimal = distribution
        .iter()
        .map(|entry| entry.distribution_percentage)
        .sum();
    if (total - Decimal::ONE_HUNDRED).abs() > custom_distribution_tolerance() {
        return Err(FundingError::BadRequest(format!(
            "custom distribution sums to {total}, expected 100"
        )));
    }
    Ok(())
}
