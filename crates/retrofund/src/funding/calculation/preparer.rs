use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{MetricBounds, PreparedCalculationData};
use crate::funding::domain::{ApplicationId, MetricIdentifier, PoolKey};
use crate::funding::error::FundingError;
use crate::funding::external::{Indexer, MetricScoreRecord, MetricsProvider};
use crate::funding::repository::FundingRepository;

/// Gathers pool configuration, approved applications and raw scores into
/// [`PreparedCalculationData`].
///
/// An approved application with no score for a metric is charged the worst observed value:
/// the minimum for increasing metrics, the maximum for decreasing ones.
pub struct CalculationDataPreparer<R> {
    repository: Arc<R>,
    indexer: Arc<dyn Indexer>,
    metrics: Arc<dyn MetricsProvider>,
}

impl<R> CalculationDataPreparer<R>
where
    R: FundingRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        indexer: Arc<dyn Indexer>,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Self {
        Self {
            repository,
            indexer,
            metrics,
        }
    }

    pub async fn prepare(&self, key: &PoolKey) -> Result<PreparedCalculationData, FundingError> {
        let pool = self
            .repository
            .fetch_pool(key)?
            .ok_or_else(|| FundingError::NotFound(format!("pool {key}")))?;

        let mut orientations = BTreeMap::new();
        for identifier in &pool.metric_identifiers {
            let metric = self
                .repository
                .fetch_metric(identifier)?
                .ok_or_else(|| FundingError::NotFound(format!("metric {identifier}")))?;
            orientations.insert(identifier.clone(), metric.orientation);
        }

        let round = self
            .indexer
            .round_with_applications(key.chain_id, &key.pool_id)
            .await?
            .ok_or_else(|| FundingError::NotFound(format!("round {key} on the indexer")))?;

        let mut seen = HashSet::new();
        let application_ids: Vec<ApplicationId> = round
            .approved_application_ids()
            .into_iter()
            .filter(|application_id| seen.insert(application_id.clone()))
            .collect();

        let mut prepared = PreparedCalculationData {
            metric_identifiers: pool.metric_identifiers.clone(),
            orientations,
            application_ids,
            ..PreparedCalculationData::default()
        };

        if prepared.application_ids.is_empty() {
            debug!(pool = %key, "no approved applications; skipping score fetch");
            return Ok(prepared);
        }

        let records = self
            .metrics
            .scores(
                &prepared.application_ids,
                &key.pool_id,
                &prepared.metric_identifiers,
            )
            .await?;

        let approved: HashSet<&ApplicationId> = prepared.application_ids.iter().collect();
        let mut observed: HashMap<(ApplicationId, MetricIdentifier), Decimal> = HashMap::new();
        for record in records {
            if !approved.contains(&record.application_id)
                || !prepared.metric_identifiers.contains(&record.metric_identifier)
            {
                debug!(
                    application = %record.application_id,
                    metric = %record.metric_identifier,
                    "dropping score outside the approved batch"
                );
                continue;
            }
            observed.insert(
                (record.application_id, record.metric_identifier),
                record.raw_score,
            );
        }

        for metric in &prepared.metric_identifiers {
            let values = observed
                .iter()
                .filter(|((_, scored_metric), _)| scored_metric == metric)
                .map(|(_, value)| *value);
            match MetricBounds::observe(values) {
                Some(bounds) => {
                    prepared.bounds.insert(metric.clone(), bounds);
                }
                None => warn!(pool = %key, metric = %metric, "no valid scores for metric"),
            }
        }

        let mut substituted = 0usize;
        for application_id in &prepared.application_ids {
            for metric in &prepared.metric_identifiers {
                let Some(bounds) = prepared.bounds.get(metric) else {
                    continue;
                };
                let raw_score = match observed.get(&(application_id.clone(), metric.clone())) {
                    Some(value) => *value,
                    None => {
                        substituted += 1;
                        let increasing = prepared
                            .orientations
                            .get(metric)
                            .map(|orientation| orientation.is_increasing())
                            .unwrap_or(true);
                        if increasing {
                            bounds.min_value
                        } else {
                            bounds.max_value
                        }
                    }
                };
                prepared.scores.push(MetricScoreRecord {
                    application_id: application_id.clone(),
                    metric_identifier: metric.clone(),
                    raw_score,
                });
            }
        }

        debug!(
            pool = %key,
            applications = prepared.application_ids.len(),
            scores = prepared.scores.len(),
            substituted,
            "prepared calculation data"
        );

        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funding::domain::{Metric, MetricOrientation, Pool};
    use crate::funding::external::{
        ApplicationStatus, CollaboratorError, IndexedApplication, RoundWithApplications,
    };
    use crate::funding::memory::InMemoryFundingRepository;
    use async_trait::async_trait;

    struct FixedRound(RoundWithApplications);

    #[async_trait]
    impl Indexer for FixedRound {
        async fn round_with_applications(
            &self,
            _chain_id: u64,
            _pool_id: &str,
        ) -> Result<Option<RoundWithApplications>, CollaboratorError> {
            Ok(Some(self.0.clone()))
        }
    }

    struct FixedScores(Vec<MetricScoreRecord>);

    #[async_trait]
    impl MetricsProvider for FixedScores {
        async fn scores(
            &self,
            _application_ids: &[ApplicationId],
            _round_id: &str,
            _metrics: &[MetricIdentifier],
        ) -> Result<Vec<MetricScoreRecord>, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    fn application(id: &str, status: ApplicationStatus) -> IndexedApplication {
        IndexedApplication {
            id: ApplicationId::new(id),
            status,
            project_id: None,
        }
    }

    fn record(application: &str, metric: &str, raw: i64) -> MetricScoreRecord {
        MetricScoreRecord {
            application_id: ApplicationId::new(application),
            metric_identifier: MetricIdentifier::new(metric),
            raw_score: Decimal::from(raw),
        }
    }

    fn preparer(scores: Vec<MetricScoreRecord>) -> (CalculationDataPreparer<InMemoryFundingRepository>, PoolKey) {
        let key = PoolKey::new(10, "7");
        let repository = Arc::new(InMemoryFundingRepository::default());
        repository
            .insert_metrics(vec![
                Metric {
                    identifier: MetricIdentifier::new("engagement"),
                    title: "Engagement".to_string(),
                    description: String::new(),
                    orientation: MetricOrientation::Increase,
                    enabled: true,
                },
                Metric {
                    identifier: MetricIdentifier::new("gasFees"),
                    title: "Gas fees".to_string(),
                    description: String::new(),
                    orientation: MetricOrientation::Decrease,
                    enabled: true,
                },
            ])
            .expect("metrics");
        repository
            .insert_pool(Pool::new(
                key.clone(),
                vec![
                    MetricIdentifier::new("engagement"),
                    MetricIdentifier::new("gasFees"),
                ],
            ))
            .expect("pool");

        let round = RoundWithApplications {
            chain_id: 10,
            id: "7".to_string(),
            applications: vec![
                application("A", ApplicationStatus::Approved),
                application("B", ApplicationStatus::Approved),
                application("C", ApplicationStatus::Approved),
                application("D", ApplicationStatus::Rejected),
            ],
            managers: Vec::new(),
        };

        (
            CalculationDataPreparer::new(
                repository,
                Arc::new(FixedRound(round)),
                Arc::new(FixedScores(scores)),
            ),
            key,
        )
    }

    fn raw(prepared: &PreparedCalculationData, application: &str, metric: &str) -> Option<Decimal> {
        prepared
            .scores
            .iter()
            .find(|record| {
                record.application_id.0 == application && record.metric_identifier.0 == metric
            })
            .map(|record| record.raw_score)
    }

    #[tokio::test]
    async fn missing_scores_take_the_worst_observed_value() {
        let (preparer, key) = preparer(vec![
            record("A", "engagement", 10),
            record("A", "gasFees", 4),
            record("B", "engagement", 30),
            record("B", "gasFees", 9),
        ]);

        let prepared = preparer.prepare(&key).await.expect("prepared");

        assert_eq!(prepared.application_ids.len(), 3);
        assert_eq!(raw(&prepared, "C", "engagement"), Some(Decimal::from(10)));
        assert_eq!(raw(&prepared, "C", "gasFees"), Some(Decimal::from(9)));
        assert_eq!(prepared.scores.len(), 6);
    }

    #[tokio::test]
    async fn scores_for_unapproved_applications_are_dropped() {
        let (preparer, key) = preparer(vec![
            record("A", "engagement", 10),
            record("D", "engagement", 500),
        ]);

        let prepared = preparer.prepare(&key).await.expect("prepared");

        let bounds = prepared.bounds[&MetricIdentifier::new("engagement")];
        assert_eq!(bounds.max_value, Decimal::from(10));
        assert!(raw(&prepared, "D", "engagement").is_none());
        assert!(!prepared.bounds.contains_key(&MetricIdentifier::new("gasFees")));
        assert!(raw(&prepared, "B", "gasFees").is_none());
    }

    #[tokio::test]
    async fn unknown_pool_is_not_found() {
        let (preparer, _) = preparer(Vec::new());

        let error = preparer
            .prepare(&PoolKey::new(10, "missing"))
            .await
            .expect_err("missing pool");

        assert!(matches!(error, FundingError::NotFound(_)));
    }
}
