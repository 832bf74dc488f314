use crate::cli::ServeArgs;
use crate::infra::{collaborators_from_config, AppState};
use crate::routes::with_funding_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use retrofund::config::AppConfig;
use retrofund::error::AppError;
use retrofund::funding::{FundingService, InMemoryFundingRepository};
use retrofund::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.apply(&mut config.server);
    telemetry::init(&config.telemetry)?;

    let readiness = Arc::new(AtomicBool::new(false));
    let app = build_app(&config, readiness.clone())?;

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness.store(true, Ordering::Release);
    info!(environment = ?config.environment, %addr, "retro funding service listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Funding routes plus the operational endpoints, backed by an in-memory repository.
fn build_app(config: &AppConfig, readiness: Arc<AtomicBool>) -> Result<Router, AppError> {
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let state = AppState {
        readiness,
        metrics: Arc::new(prometheus_handle),
    };

    let service = FundingService::new(
        Arc::new(InMemoryFundingRepository::default()),
        collaborators_from_config(config)?,
    );

    Ok(with_funding_routes(Arc::new(service))
        .layer(Extension(state))
        .layer(prometheus_layer))
}
