use std::collections::HashSet;

use rust_decimal::Decimal;

use super::domain::{Ballot, MetricIdentifier, Pool};

/// Shape violations caught before a ballot reaches storage or the calculation engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BallotError {
    #[error("vote share {share} for metric {metric} must be between 0 and 100")]
    ShareOutOfRange {
        metric: MetricIdentifier,
        share: Decimal,
    },
    #[error("ballot allocates {total} percent, more than 100")]
    OverAllocated { total: Decimal },
    #[error("metric {0} appears more than once in the ballot")]
    DuplicateMetric(MetricIdentifier),
    #[error("metric {0} is not part of this pool")]
    UnknownMetric(MetricIdentifier),
}

/// A ballot may leave part of the voter's influence unallocated, but never more than 100.
pub fn validate_ballot(ballot: &Ballot, pool: &Pool) -> Result<(), BallotError> {
    let mut seen = HashSet::new();

    for item in ballot.items() {
        if !pool.includes_metric(&item.metric_identifier) {
            return Err(BallotError::UnknownMetric(item.metric_identifier.clone()));
        }
        if !seen.insert(&item.metric_identifier) {
            return Err(BallotError::DuplicateMetric(item.metric_identifier.clone()));
        }
        if item.vote_share < Decimal::ZERO || item.vote_share > Decimal::ONE_HUNDRED {
            return Err(BallotError::ShareOutOfRange {
                metric: item.metric_identifier.clone(),
                share: item.vote_share,
            });
        }
    }

    let total = ballot.total_share();
    if total > Decimal::ONE_HUNDRED {
        return Err(BallotError::OverAllocated { total });
    }

    Ok(())
}
