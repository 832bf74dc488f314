use crate::infra::DevSignatureVerifier;
use clap::Args;
use retrofund::error::AppError;
use retrofund::funding::{
    ApplicationId, ApplicationStatus, Ballot, BallotItem, Collaborators, CreatePoolRequest,
    CsvMetricsProvider, DistributionEntry, EligibilityCriteria, FundingService,
    InMemoryFundingRepository, IndexedApplication, Metric, MetricIdentifier, MetricOrientation,
    PoolKey, RoundWithApplications, SnapshotIndexer, VoterAddress,
};
use rust_decimal::Decimal;
use std::io::Cursor;
use std::sync::Arc;

const CHAIN_ID: u64 = 10;
const POOL_ID: &str = "42";
const MANAGER: &str = "0x00000000000000000000000000000000000000aa";
const VOTER: &str = "0x1111111111111111111111111111111111111111";

const SAMPLE_SCORES: &str = "round_id,application_id,metric_identifier,score\n\
42,A,engagement,10\n\
42,A,gasFees,5\n\
42,B,engagement,20\n\
42,B,gasFees,10\n";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Share of the sample ballot placed on engagement (higher is better)
    #[arg(long, default_value_t = Decimal::from(70))]
    pub(crate) engagement_share: Decimal,
    /// Share of the sample ballot placed on gas fees (lower is better)
    #[arg(long, default_value_t = Decimal::from(30))]
    pub(crate) gas_share: Decimal,
    /// Finalize the pool after calculating
    #[arg(long)]
    pub(crate) finalize: bool,
    /// Print the distribution as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        engagement_share,
        gas_share,
        finalize,
        json,
    } = args;

    let service = sample_service()?;
    let key = PoolKey::new(CHAIN_ID, POOL_ID);

    service.add_metrics(vec![
        sample_metric("engagement", "Engagement", MetricOrientation::Increase),
        sample_metric("gasFees", "Gas fees", MetricOrientation::Decrease),
    ])?;
    service
        .create_pool(CreatePoolRequest {
            chain_id: CHAIN_ID,
            pool_id: POOL_ID.to_string(),
            metric_identifiers: vec![
                MetricIdentifier::new("engagement"),
                MetricIdentifier::new("gasFees"),
            ],
            eligibility: EligibilityCriteria::Linear {
                voters: vec![VoterAddress::new(VOTER)],
            },
        })
        .await?;

    let ballot = Ballot(vec![
        BallotItem::new("engagement", engagement_share),
        BallotItem::new("gasFees", gas_share),
    ]);
    service.submit_vote(&key, VoterAddress::new(VOTER), ballot)?;

    let what_if = Ballot(vec![
        BallotItem::new("engagement", gas_share),
        BallotItem::new("gasFees", engagement_share),
    ]);
    let prediction = service
        .predict_distribution(&key, VoterAddress::new(VOTER), what_if)
        .await?;

    let distribution = if finalize {
        let signature = DevSignatureVerifier::sign(MANAGER, &key.signing_message());
        service
            .finalize_distribution(&key, &signature)
            .await?
            .distribution
    } else {
        service.calculate_distribution(&key).await?
    };

    if json {
        let payload = serde_json::json!({
            "pool": key.to_string(),
            "finalized": finalize,
            "distribution": distribution,
            "prediction": prediction,
        });
        let rendered = serde_json::to_string_pretty(&payload)?;
        println!("{rendered}");
    } else {
        println!("Retro funding demo for pool {key}");
        render_distribution(
            &format!(
                "Ballot: engagement {engagement_share}%, gas fees {gas_share}% ({})",
                if finalize { "finalised" } else { "calculated" }
            ),
            &distribution,
        );
        println!();
        render_distribution(
            &format!("Prediction: engagement {gas_share}%, gas fees {engagement_share}% (not saved)"),
            &prediction,
        );
    }

    Ok(())
}

fn sample_service() -> Result<FundingService<InMemoryFundingRepository>, AppError> {
    let round = RoundWithApplications {
        chain_id: CHAIN_ID,
        id: POOL_ID.to_string(),
        applications: ["A", "B"]
            .into_iter()
            .map(|id| IndexedApplication {
                id: ApplicationId::new(id),
                status: ApplicationStatus::Approved,
                project_id: None,
            })
            .collect(),
        managers: vec![VoterAddress::new(MANAGER)],
    };
    let metrics = CsvMetricsProvider::from_reader(Cursor::new(SAMPLE_SCORES))?;

    Ok(FundingService::new(
        Arc::new(InMemoryFundingRepository::default()),
        Collaborators {
            indexer: Arc::new(SnapshotIndexer::new(vec![round])),
            metrics: Arc::new(metrics),
            signatures: Arc::new(DevSignatureVerifier),
        },
    ))
}

fn sample_metric(identifier: &str, title: &str, orientation: MetricOrientation) -> Metric {
    Metric {
        identifier: MetricIdentifier::new(identifier),
        title: title.to_string(),
        description: String::new(),
        orientation,
        enabled: true,
    }
}

fn render_distribution(heading: &str, distribution: &[DistributionEntry]) {
    println!("{heading}");
    println!("{:<12} {:>10}", "application", "payout %");
    for entry in distribution {
        println!(
            "{:<12} {:>10}",
            entry.application_id.to_string(),
            entry.distribution_percentage.round_dp(2)
        );
    }
}
