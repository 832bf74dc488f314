//! Retro-funding pools: metric registry, eligibility, ballots and the distribution engine.
//!
//! A pool mirrors a funding round on the indexer. Voters split their influence across the
//! pool's metrics; the engine combines those ballots with normalized application scores into
//! a percentage payout per approved application.

pub mod ballot;
pub mod calculation;
pub mod domain;
pub mod eligibility;
pub mod error;
pub mod external;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use ballot::{validate_ballot, BallotError};
pub use calculation::{
    CalculationDataPreparer, CalculationError, DistributionEngine, MetricBounds,
    PreparedCalculationData,
};
pub use domain::{
    Application, ApplicationId, Ballot, BallotItem, DistributionData, DistributionEntry, Metric,
    MetricIdentifier, MetricOrientation, MetricUpdate, Pool, PoolKey, Vote, VoterAddress,
};
pub use eligibility::{EligibilityCriteria, EligibilityError, EligibilityPolicy, EligibilityResolver};
pub use error::{ErrorKind, FundingError};
pub use external::{
    ApplicationStatus, CollaboratorError, IndexedApplication, Indexer, MetricScoreRecord,
    MetricsProvider, RoundWithApplications, SignatureVerifier,
};
pub use memory::InMemoryFundingRepository;
pub use repository::{FundingRepository, PoolView, RepositoryError};
pub use router::funding_router;
pub use service::{Collaborators, CreatePoolRequest, FundingService};
pub use snapshot::{CsvMetricsProvider, SnapshotError, SnapshotIndexer};
