use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use super::aggregation::{flat_vote_mass, weighted_metric_shares, AdmittedBallot, MetricWeights};
use super::normalizer::normalize_score;
use super::{CalculationError, PreparedCalculationData};
use crate::funding::domain::{ApplicationId, DistributionEntry, Vote};
use crate::funding::eligibility::{EligibilityCriteria, EligibilityPolicy, EligibilityResolver};

/// Turns prepared scores plus ballots into a ranked percentage split.
///
/// The engine is pure: the same inputs always give the same distribution. Persisting the
/// result is left to the caller.
pub struct DistributionEngine {
    resolver: EligibilityResolver,
}

impl DistributionEngine {
    pub fn new(criteria: &EligibilityCriteria) -> Self {
        Self {
            resolver: EligibilityResolver::new(criteria),
        }
    }

    /// Per-metric weights after dropping ballots from ineligible voters.
    pub fn metric_weights(&self, prepared: &PreparedCalculationData, votes: &[Vote]) -> MetricWeights {
        let admitted: Vec<AdmittedBallot<'_>> = votes
            .iter()
            .filter_map(|vote| {
                self.resolver.admit(&vote.voter).map(|weight| AdmittedBallot {
                    ballot: &vote.ballot,
                    weight,
                })
            })
            .collect();

        if admitted.len() < votes.len() {
            debug!(
                discarded = votes.len() - admitted.len(),
                "discarding ballots from ineligible voters"
            );
        }

        match self.resolver.policy() {
            EligibilityPolicy::Linear => flat_vote_mass(&admitted, &prepared.metric_identifiers),
            EligibilityPolicy::Weighted => {
                weighted_metric_shares(&admitted, &prepared.metric_identifiers)
            }
        }
    }

    /// Every application in `prepared` appears exactly once, sorted by percentage descending
    /// with ties broken by application id. Percentages sum to 100 unless every score is zero.
    pub fn calculate(
        &self,
        prepared: &PreparedCalculationData,
        votes: &[Vote],
    ) -> Result<Vec<DistributionEntry>, CalculationError> {
        let weights = self.metric_weights(prepared, votes);

        let mut scores: BTreeMap<ApplicationId, Decimal> = prepared
            .application_ids
            .iter()
            .map(|application_id| (application_id.clone(), Decimal::ZERO))
            .collect();

        for record in &prepared.scores {
            let metric = &record.metric_identifier;
            if !prepared.metric_identifiers.contains(metric) {
                return Err(CalculationError::UnknownMetric(metric.clone()));
            }
            let bounds = prepared
                .bounds
                .get(metric)
                .ok_or_else(|| CalculationError::MissingBounds(metric.clone()))?;
            let orientation = prepared
                .orientations
                .get(metric)
                .copied()
                .ok_or_else(|| CalculationError::MissingOrientation(metric.clone()))?;

            let normalized = normalize_score(record.raw_score, bounds, orientation)
                .ok_or_else(|| CalculationError::Overflow(record.application_id.clone()))?;
            let weight = weights.get(metric).copied().unwrap_or(Decimal::ZERO);
            let contribution = normalized
                .checked_mul(weight)
                .map(|value| value / Decimal::ONE_HUNDRED)
                .ok_or_else(|| CalculationError::Overflow(record.application_id.clone()))?;

            let total = scores
                .entry(record.application_id.clone())
                .or_insert(Decimal::ZERO);
            *total = total
                .checked_add(contribution)
                .ok_or_else(|| CalculationError::Overflow(record.application_id.clone()))?;
        }

        let grand_total: Decimal = scores.values().copied().sum();

        let mut distribution = scores
            .into_iter()
            .map(|(application_id, score)| {
                let distribution_percentage = if grand_total.is_zero() {
                    Decimal::ZERO
                } else {
                    score
                        .checked_div(grand_total)
                        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                        .ok_or_else(|| CalculationError::Overflow(application_id.clone()))?
                };
                Ok(DistributionEntry {
                    application_id,
                    distribution_percentage,
                })
            })
            .collect::<Result<Vec<_>, CalculationError>>()?;

        distribution.sort_by(rank);
        Ok(distribution)
    }
}

fn rank(left: &DistributionEntry, right: &DistributionEntry) -> Ordering {
    right
        .distribution_percentage
        .cmp(&left.distribution_percentage)
        .then_with(|| left.application_id.cmp(&right.application_id))
}
