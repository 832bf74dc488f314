use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::funding::domain::{
    Application, ApplicationId, Ballot, BallotItem, DistributionData, DistributionEntry, Metric,
    MetricIdentifier, MetricOrientation, Pool, PoolKey, Vote, VoterAddress,
};
use crate::funding::eligibility::EligibilityCriteria;
use crate::funding::external::{
    ApplicationStatus, CollaboratorError, IndexedApplication, Indexer, MetricScoreRecord,
    MetricsProvider, RoundWithApplications, SignatureVerifier,
};
use crate::funding::memory::InMemoryFundingRepository;
use crate::funding::repository::{FundingRepository, RepositoryError};
use crate::funding::service::{Collaborators, CreatePoolRequest, FundingService};
use crate::funding::snapshot::SnapshotIndexer;

pub(super) const CHAIN_ID: u64 = 10;
pub(super) const POOL_ID: &str = "42";
pub(super) const MANAGER: &str = "0x00000000000000000000000000000000000000aa";
pub(super) const VOTER: &str = "0x1111111111111111111111111111111111111111";
pub(super) const SECOND_VOTER: &str = "0x2222222222222222222222222222222222222222";
pub(super) const OUTSIDER: &str = "0x3333333333333333333333333333333333333333";

pub(super) fn pool_key() -> PoolKey {
    PoolKey::new(CHAIN_ID, POOL_ID)
}

pub(super) fn metric(identifier: &str, orientation: MetricOrientation) -> Metric {
    Metric {
        identifier: MetricIdentifier::new(identifier),
        title: identifier.to_string(),
        description: format!("{identifier} over the round window"),
        orientation,
        enabled: true,
    }
}

pub(super) fn scenario_metrics() -> Vec<Metric> {
    vec![
        metric("engagement", MetricOrientation::Increase),
        metric("gasFees", MetricOrientation::Decrease),
    ]
}

pub(super) fn scenario_round() -> RoundWithApplications {
    RoundWithApplications {
        chain_id: CHAIN_ID,
        id: POOL_ID.to_string(),
        applications: vec![
            IndexedApplication {
                id: ApplicationId::new("A"),
                status: ApplicationStatus::Approved,
                project_id: Some("project-a".to_string()),
            },
            IndexedApplication {
                id: ApplicationId::new("B"),
                status: ApplicationStatus::Approved,
                project_id: Some("project-b".to_string()),
            },
            IndexedApplication {
                id: ApplicationId::new("C"),
                status: ApplicationStatus::Rejected,
                project_id: None,
            },
        ],
        managers: vec![VoterAddress::new(MANAGER)],
    }
}

pub(super) fn score(application: &str, metric: &str, raw: i64) -> MetricScoreRecord {
    MetricScoreRecord {
        application_id: ApplicationId::new(application),
        metric_identifier: MetricIdentifier::new(metric),
        raw_score: Decimal::from(raw),
    }
}

pub(super) fn scenario_scores() -> Vec<MetricScoreRecord> {
    vec![
        score("A", "engagement", 10),
        score("A", "gasFees", 5),
        score("B", "engagement", 20),
        score("B", "gasFees", 10),
    ]
}

pub(super) fn ballot(entries: &[(&str, i64)]) -> Ballot {
    entries
        .iter()
        .map(|(metric, share)| BallotItem::new(*metric, Decimal::from(*share)))
        .collect()
}

pub(super) fn linear(voters: &[&str]) -> EligibilityCriteria {
    EligibilityCriteria::Linear {
        voters: voters.iter().map(|voter| VoterAddress::new(*voter)).collect(),
    }
}

pub(super) fn weighted(voters: &[(&str, i64)]) -> EligibilityCriteria {
    EligibilityCriteria::Weighted {
        voters: voters
            .iter()
            .map(|(voter, weight)| (VoterAddress::new(*voter), Decimal::from(*weight)))
            .collect(),
    }
}

pub(super) fn create_pool_request(eligibility: EligibilityCriteria) -> CreatePoolRequest {
    CreatePoolRequest {
        chain_id: CHAIN_ID,
        pool_id: POOL_ID.to_string(),
        metric_identifiers: vec![
            MetricIdentifier::new("engagement"),
            MetricIdentifier::new("gasFees"),
        ],
        eligibility,
    }
}

pub(super) fn percentage(distribution: &[DistributionEntry], application: &str) -> Decimal {
    distribution
        .iter()
        .find(|entry| entry.application_id.0 == application)
        .map(|entry| entry.distribution_percentage)
        .expect("application present in distribution")
}

/// Scores served straight from memory, filtered like a real provider would.
pub(super) struct StaticMetrics(pub(super) Vec<MetricScoreRecord>);

#[async_trait]
impl MetricsProvider for StaticMetrics {
    async fn scores(
        &self,
        application_ids: &[ApplicationId],
        _round_id: &str,
        metrics: &[MetricIdentifier],
    ) -> Result<Vec<MetricScoreRecord>, CollaboratorError> {
        Ok(self
            .0
            .iter()
            .filter(|record| application_ids.contains(&record.application_id))
            .filter(|record| metrics.contains(&record.metric_identifier))
            .cloned()
            .collect())
    }
}

/// Treats the signature itself as the signer's address.
pub(super) struct AddressSignatures;

#[async_trait]
impl SignatureVerifier for AddressSignatures {
    async fn recover_signer(
        &self,
        _message: &str,
        signature: &str,
    ) -> Result<VoterAddress, CollaboratorError> {
        let signer = VoterAddress::new(signature);
        if signer.is_well_formed() {
            Ok(signer)
        } else {
            Err(CollaboratorError::Signature("malformed signature".to_string()))
        }
    }
}

pub(super) struct OfflineIndexer;

#[async_trait]
impl Indexer for OfflineIndexer {
    async fn round_with_applications(
        &self,
        _chain_id: u64,
        _pool_id: &str,
    ) -> Result<Option<RoundWithApplications>, CollaboratorError> {
        Err(CollaboratorError::Indexer("connection refused".to_string()))
    }
}

/// Behaves like the in-memory store, except that once armed the next ballot read also locks
/// the pool with a distribution of its own, as a manager finalizing concurrently would.
#[derive(Default)]
pub(super) struct FinalizeDuringVoteRead {
    pub(super) inner: InMemoryFundingRepository,
    armed: AtomicBool,
}

impl FinalizeDuringVoteRead {
    pub(super) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub(super) fn concurrent_distribution() -> Vec<DistributionEntry> {
        vec![DistributionEntry {
            application_id: ApplicationId::new("A"),
            distribution_percentage: Decimal::ONE_HUNDRED,
        }]
    }
}

impl FundingRepository for FinalizeDuringVoteRead {
    fn insert_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>, RepositoryError> {
        self.inner.insert_metrics(metrics)
    }

    fn fetch_metric(
        &self,
        identifier: &MetricIdentifier,
    ) -> Result<Option<Metric>, RepositoryError> {
        self.inner.fetch_metric(identifier)
    }

    fn save_metric(&self, metric: Metric) -> Result<(), RepositoryError> {
        self.inner.save_metric(metric)
    }

    fn list_metrics(&self) -> Result<Vec<Metric>, RepositoryError> {
        self.inner.list_metrics()
    }

    fn insert_pool(&self, pool: Pool) -> Result<Pool, RepositoryError> {
        self.inner.insert_pool(pool)
    }

    fn fetch_pool(&self, key: &PoolKey) -> Result<Option<Pool>, RepositoryError> {
        self.inner.fetch_pool(key)
    }

    fn store_distribution(
        &self,
        key: &PoolKey,
        data: DistributionData,
    ) -> Result<(), RepositoryError> {
        self.inner.store_distribution(key, data)
    }

    fn store_custom_distribution(
        &self,
        key: &PoolKey,
        data: Option<DistributionData>,
    ) -> Result<Option<DistributionData>, RepositoryError> {
        self.inner.store_custom_distribution(key, data)
    }

    fn mark_finalized(&self, key: &PoolKey) -> Result<Pool, RepositoryError> {
        self.inner.mark_finalized(key)
    }

    fn upsert_applications(
        &self,
        key: &PoolKey,
        applications: Vec<Application>,
    ) -> Result<(), RepositoryError> {
        self.inner.upsert_applications(key, applications)
    }

    fn applications(&self, key: &PoolKey) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications(key)
    }

    fn upsert_eligibility(
        &self,
        key: &PoolKey,
        criteria: EligibilityCriteria,
    ) -> Result<(), RepositoryError> {
        self.inner.upsert_eligibility(key, criteria)
    }

    fn fetch_eligibility(
        &self,
        key: &PoolKey,
    ) -> Result<Option<EligibilityCriteria>, RepositoryError> {
        self.inner.fetch_eligibility(key)
    }

    fn upsert_vote(&self, vote: Vote) -> Result<Vote, RepositoryError> {
        self.inner.upsert_vote(vote)
    }

    fn votes(&self, key: &PoolKey) -> Result<Vec<Vote>, RepositoryError> {
        let votes = self.inner.votes(key)?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.inner.store_distribution(
                key,
                DistributionData {
                    last_updated: Utc::now(),
                    distribution: Self::concurrent_distribution(),
                },
            )?;
            self.inner.mark_finalized(key)?;
        }
        Ok(votes)
    }
}

pub(super) fn collaborators(scores: Vec<MetricScoreRecord>) -> Collaborators {
    Collaborators {
        indexer: Arc::new(SnapshotIndexer::new(vec![scenario_round()])),
        metrics: Arc::new(StaticMetrics(scores)),
        signatures: Arc::new(AddressSignatures),
    }
}

pub(super) fn build_service() -> (
    FundingService<InMemoryFundingRepository>,
    Arc<InMemoryFundingRepository>,
) {
    let repository = Arc::new(InMemoryFundingRepository::default());
    let service = FundingService::new(repository.clone(), collaborators(scenario_scores()));
    (service, repository)
}

/// Registers the scenario metrics and creates the pool with the given criteria.
pub(super) async fn seeded_service(
    eligibility: EligibilityCriteria,
) -> (
    FundingService<InMemoryFundingRepository>,
    Arc<InMemoryFundingRepository>,
) {
    let (service, repository) = build_service();
    service
        .add_metrics(scenario_metrics())
        .expect("metrics register");
    service
        .create_pool(create_pool_request(eligibility))
        .await
        .expect("pool created");
    (service, repository)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
