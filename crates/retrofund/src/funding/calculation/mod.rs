mod aggregation;
mod engine;
mod normalizer;
mod preparer;

pub use aggregation::{flat_vote_mass, weighted_metric_shares, AdmittedBallot, MetricWeights};
pub use engine::DistributionEngine;
pub use normalizer::normalize_score;
pub use preparer::CalculationDataPreparer;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, MetricIdentifier, MetricOrientation};
use super::external::MetricScoreRecord;

/// Smallest and largest valid raw score observed for one metric across the approved batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricBounds {
    pub min_value: Decimal,
    pub max_value: Decimal,
}

impl MetricBounds {
    pub fn observe(values: impl IntoIterator<Item = Decimal>) -> Option<Self> {
        values.into_iter().fold(None, |bounds, value| match bounds {
            None => Some(Self {
                min_value: value,
                max_value: value,
            }),
            Some(Self {
                min_value,
                max_value,
            }) => Some(Self {
                min_value: min_value.min(value),
                max_value: max_value.max(value),
            }),
        })
    }
}

/// Everything the engine needs to score a pool, with missing scores already substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedCalculationData {
    pub metric_identifiers: Vec<MetricIdentifier>,
    pub orientations: BTreeMap<MetricIdentifier, MetricOrientation>,
    pub application_ids: Vec<ApplicationId>,
    pub scores: Vec<MetricScoreRecord>,
    pub bounds: BTreeMap<MetricIdentifier, MetricBounds>,
}

/// Integrity failures detected while turning prepared data into a distribution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalculationError {
    #[error("metric {0} is scored but not configured for the pool")]
    UnknownMetric(MetricIdentifier),
    #[error("no score bounds recorded for metric {0}")]
    MissingBounds(MetricIdentifier),
    #[error("no orientation recorded for metric {0}")]
    MissingOrientation(MetricIdentifier),
    #[error("arithmetic overflow while weighting application {0}")]
    Overflow(ApplicationId),
}
