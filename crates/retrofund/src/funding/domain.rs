use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A funding round instance, scoped to the chain it lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolKey {
    pub chain_id: u64,
    pub pool_id: String,
}

impl PoolKey {
    pub fn new(chain_id: u64, pool_id: impl Into<String>) -> Self {
        Self {
            chain_id,
            pool_id: pool_id.into(),
        }
    }

    /// Message a pool manager signs to prove control over the pool.
    pub fn signing_message(&self) -> String {
        format!("{}:{}", self.chain_id, self.pool_id)
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain_id, self.pool_id)
    }
}

/// Identifier wrapper for applications, as assigned by the round indexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Globally unique name of a scoring dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricIdentifier(pub String);

impl MetricIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for MetricIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encoded account address. Stored as received; compare through [`VoterAddress::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterAddress(pub String);

impl VoterAddress {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn normalized(&self) -> String {
        self.0.trim().to_ascii_lowercase()
    }

    /// `0x` followed by exactly 20 hex-encoded bytes.
    pub fn is_well_formed(&self) -> bool {
        let Some(digits) = self.0.trim().strip_prefix("0x") else {
            return false;
        };
        digits.len() == 40 && hex::decode(digits).is_ok()
    }

    pub fn matches(&self, other: &VoterAddress) -> bool {
        self.normalized() == other.normalized()
    }
}

impl fmt::Display for VoterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether higher raw scores are better or worse for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricOrientation {
    Increase,
    Decrease,
}

impl MetricOrientation {
    pub const fn is_increasing(self) -> bool {
        matches!(self, MetricOrientation::Increase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub identifier: MetricIdentifier,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub orientation: MetricOrientation,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Partial update applied to a registered metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub orientation: Option<MetricOrientation>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl MetricUpdate {
    pub fn apply(self, metric: &mut Metric) {
        if let Some(title) = self.title {
            metric.title = title;
        }
        if let Some(description) = self.description {
            metric.description = description;
        }
        if let Some(orientation) = self.orientation {
            metric.orientation = orientation;
        }
        if let Some(enabled) = self.enabled {
            metric.enabled = enabled;
        }
    }
}

/// A single application's share of the pool payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionEntry {
    pub application_id: ApplicationId,
    pub distribution_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionData {
    pub last_updated: DateTime<Utc>,
    pub distribution: Vec<DistributionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    #[serde(flatten)]
    pub key: PoolKey,
    pub metric_identifiers: Vec<MetricIdentifier>,
    #[serde(default)]
    pub distribution: Option<DistributionData>,
    #[serde(default)]
    pub custom_distribution: Option<DistributionData>,
    #[serde(default)]
    pub finalized: bool,
}

impl Pool {
    pub fn new(key: PoolKey, metric_identifiers: Vec<MetricIdentifier>) -> Self {
        Self {
            key,
            metric_identifiers,
            distribution: None,
            custom_distribution: None,
            finalized: false,
        }
    }

    pub fn includes_metric(&self, metric: &MetricIdentifier) -> bool {
        self.metric_identifiers.contains(metric)
    }

    /// A manager override wins over the computed distribution.
    pub fn effective_distribution(&self) -> Option<&DistributionData> {
        self.custom_distribution
            .as_ref()
            .or(self.distribution.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(flatten)]
    pub key: PoolKey,
    pub application_id: ApplicationId,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Share (0-100) of a voter's influence placed on one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotItem {
    pub metric_identifier: MetricIdentifier,
    pub vote_share: Decimal,
}

impl BallotItem {
    pub fn new(metric_identifier: impl Into<String>, vote_share: Decimal) -> Self {
        Self {
            metric_identifier: MetricIdentifier::new(metric_identifier),
            vote_share,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ballot(pub Vec<BallotItem>);

impl Ballot {
    pub fn items(&self) -> &[BallotItem] {
        &self.0
    }

    pub fn share_for(&self, metric: &MetricIdentifier) -> Option<Decimal> {
        self.0
            .iter()
            .find(|item| &item.metric_identifier == metric)
            .map(|item| item.vote_share)
    }

    pub fn total_share(&self) -> Decimal {
        self.0.iter().map(|item| item.vote_share).sum()
    }
}

impl FromIterator<BallotItem> for Ballot {
    fn from_iter<T: IntoIterator<Item = BallotItem>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One voter's ballot for a pool. At most one per (pool, voter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    #[serde(flatten)]
    pub key: PoolKey,
    pub voter: VoterAddress,
    pub ballot: Ballot,
    pub updated_at: DateTime<Utc>,
}
