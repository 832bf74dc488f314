//! File-backed collaborators: a JSON dump of indexed rounds and a CSV export of metric scores.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::info;

use super::domain::{ApplicationId, MetricIdentifier};
use super::external::{
    CollaboratorError, Indexer, MetricScoreRecord, MetricsProvider, RoundWithApplications,
};

#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    InvalidScore { line: u64, value: String },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(err) => write!(f, "failed to read snapshot: {}", err),
            SnapshotError::Json(err) => write!(f, "invalid indexer snapshot: {}", err),
            SnapshotError::Csv(err) => write!(f, "invalid metrics snapshot: {}", err),
            SnapshotError::InvalidScore { line, value } => {
                write!(f, "line {}: score {:?} is not a decimal number", line, value)
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(err) => Some(err),
            SnapshotError::Json(err) => Some(err),
            SnapshotError::Csv(err) => Some(err),
            SnapshotError::InvalidScore { .. } => None,
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<csv::Error> for SnapshotError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Serves rounds from a JSON array of [`RoundWithApplications`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndexer {
    rounds: Vec<RoundWithApplications>,
}

impl SnapshotIndexer {
    pub fn new(rounds: Vec<RoundWithApplications>) -> Self {
        Self { rounds }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let file = std::fs::File::open(path.as_ref())?;
        let indexer = Self::from_reader(file)?;
        info!(
            path = %path.as_ref().display(),
            rounds = indexer.rounds.len(),
            "loaded indexer snapshot"
        );
        Ok(indexer)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        let rounds: Vec<RoundWithApplications> = serde_json::from_reader(reader)?;
        Ok(Self::new(rounds))
    }
}

#[async_trait]
impl Indexer for SnapshotIndexer {
    async fn round_with_applications(
        &self,
        chain_id: u64,
        pool_id: &str,
    ) -> Result<Option<RoundWithApplications>, CollaboratorError> {
        Ok(self
            .rounds
            .iter()
            .find(|round| round.chain_id == chain_id && round.id == pool_id)
            .cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RoundScore {
    round_id: String,
    record: MetricScoreRecord,
}

/// Serves scores from a `round_id,application_id,metric_identifier,score` CSV export.
///
/// Rows with an empty score are treated as missing data and never returned.
#[derive(Debug, Clone, Default)]
pub struct CsvMetricsProvider {
    scores: Vec<RoundScore>,
}

impl CsvMetricsProvider {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let file = std::fs::File::open(path.as_ref())?;
        let provider = Self::from_reader(file)?;
        info!(
            path = %path.as_ref().display(),
            scores = provider.scores.len(),
            "loaded metrics snapshot"
        );
        Ok(provider)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut scores = Vec::new();

        // Line 1 is the header row.
        for (index, row) in csv_reader.deserialize::<ScoreRow>().enumerate() {
            let row = row?;
            let Some(value) = row.score else {
                continue;
            };
            let raw_score = parse_score(&value).ok_or_else(|| SnapshotError::InvalidScore {
                line: index as u64 + 2,
                value: value.clone(),
            })?;
            scores.push(RoundScore {
                round_id: row.round_id,
                record: MetricScoreRecord {
                    application_id: ApplicationId::new(row.application_id),
                    metric_identifier: MetricIdentifier::new(row.metric_identifier),
                    raw_score,
                },
            });
        }

        Ok(Self { scores })
    }
}

fn parse_score(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

#[async_trait]
impl MetricsProvider for CsvMetricsProvider {
    async fn scores(
        &self,
        application_ids: &[ApplicationId],
        round_id: &str,
        metrics: &[MetricIdentifier],
    ) -> Result<Vec<MetricScoreRecord>, CollaboratorError> {
        Ok(self
            .scores
            .iter()
            .filter(|score| score.round_id == round_id)
            .filter(|score| application_ids.contains(&score.record.application_id))
            .filter(|score| metrics.contains(&score.record.metric_identifier))
            .map(|score| score.record.clone())
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    round_id: String,
    application_id: String,
    metric_identifier: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    score: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|raw| !raw.trim().is_empty()))
}
