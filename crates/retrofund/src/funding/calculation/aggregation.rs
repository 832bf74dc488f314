use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::funding::domain::{Ballot, MetricIdentifier};

/// Per-metric consensus weight, on a 0-100 scale.
pub type MetricWeights = BTreeMap<MetricIdentifier, Decimal>;

/// A ballot that passed the eligibility filter, with the weight its voter carries.
#[derive(Debug, Clone, Copy)]
pub struct AdmittedBallot<'a> {
    pub ballot: &'a Ballot,
    pub weight: Decimal,
}

/// Linear pools: raw vote mass per metric.
///
/// The totals are not rescaled, so abstentions and partial ballots simply contribute less.
pub fn flat_vote_mass(
    ballots: &[AdmittedBallot<'_>],
    metrics: &[MetricIdentifier],
) -> MetricWeights {
    metrics
        .iter()
        .map(|metric| {
            let mass = ballots
                .iter()
                .filter_map(|admitted| admitted.ballot.share_for(metric))
                .sum::<Decimal>();
            (metric.clone(), mass)
        })
        .collect()
}

/// Weighted pools: shares scaled by `weight / 100`, then renormalized to sum to exactly 100
/// across the pool's metrics. With no weighted mass at all every metric gets an equal split.
pub fn weighted_metric_shares(
    ballots: &[AdmittedBallot<'_>],
    metrics: &[MetricIdentifier],
) -> MetricWeights {
    let mut totals: MetricWeights = metrics
        .iter()
        .map(|metric| (metric.clone(), Decimal::ZERO))
        .collect();

    for admitted in ballots {
        let scale = admitted.weight / Decimal::ONE_HUNDRED;
        for item in admitted.ballot.items() {
            match totals.get_mut(&item.metric_identifier) {
                Some(total) => *total += item.vote_share * scale,
                None => debug!(
                    metric = %item.metric_identifier,
                    "ignoring ballot share for metric outside the pool"
                ),
            }
        }
    }

    let grand_total: Decimal = totals.values().copied().sum();
    let raw_shares: Vec<Decimal> = if grand_total.is_zero() {
        let equal = Decimal::ONE_HUNDRED / Decimal::from(metrics.len().max(1));
        metrics.iter().map(|_| equal).collect()
    } else {
        metrics
            .iter()
            .map(|metric| totals[metric] / grand_total * Decimal::ONE_HUNDRED)
            .collect()
    };

    metrics
        .iter()
        .cloned()
        .zip(settle_to_hundred(raw_shares))
        .collect()
}

// The last metric absorbs the division residue so the shares add up to 100 exactly.
fn settle_to_hundred(mut shares: Vec<Decimal>) -> Vec<Decimal> {
    if let Some((last, rest)) = shares.split_last_mut() {
        let allocated: Decimal = rest.iter().copied().sum();
        *last = Decimal::ONE_HUNDRED - allocated;
    }
    shares
}
