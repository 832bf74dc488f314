//! Ports for the systems this service reads from but does not own: the round indexer, the
//! metrics snapshot provider, and signature recovery.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, MetricIdentifier, VoterAddress};

/// Review status the round indexer reports for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedApplication {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundWithApplications {
    pub chain_id: u64,
    pub id: String,
    #[serde(default)]
    pub applications: Vec<IndexedApplication>,
    /// Addresses holding the manager role for the round.
    #[serde(default)]
    pub managers: Vec<VoterAddress>,
}

impl RoundWithApplications {
    pub fn approved_application_ids(&self) -> Vec<ApplicationId> {
        self.applications
            .iter()
            .filter(|application| application.status == ApplicationStatus::Approved)
            .map(|application| application.id.clone())
            .collect()
    }

    pub fn is_manager(&self, address: &VoterAddress) -> bool {
        self.managers.iter().any(|manager| manager.matches(address))
    }
}

/// Raw score reported for one application on one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricScoreRecord {
    pub application_id: ApplicationId,
    pub metric_identifier: MetricIdentifier,
    pub raw_score: Decimal,
}

/// Failure talking to an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("indexer unavailable: {0}")]
    Indexer(String),
    #[error("metrics provider unavailable: {0}")]
    Metrics(String),
    #[error("signature rejected: {0}")]
    Signature(String),
}

#[async_trait]
pub trait Indexer: Send + Sync {
    /// `None` when the indexer has never seen the round.
    async fn round_with_applications(
        &self,
        chain_id: u64,
        pool_id: &str,
    ) -> Result<Option<RoundWithApplications>, CollaboratorError>;
}

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Entries may be missing for applications lacking data on a metric.
    async fn scores(
        &self,
        application_ids: &[ApplicationId],
        round_id: &str,
        metric_identifiers: &[MetricIdentifier],
    ) -> Result<Vec<MetricScoreRecord>, CollaboratorError>;
}

#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn recover_signer(
        &self,
        message: &str,
        signature: &str,
    ) -> Result<VoterAddress, CollaboratorError>;
}
