use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    ApplicationId, Ballot, DistributionEntry, Metric, MetricIdentifier, MetricUpdate, PoolKey,
    VoterAddress,
};
use super::eligibility::EligibilityCriteria;
use super::error::{ErrorKind, FundingError};
use super::repository::FundingRepository;
use super::service::{CreatePoolRequest, FundingService};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRequest {
    pub chain_id: u64,
    pub pool_id: String,
}

/// Body of every manager-only action; the signature covers `"{chainId}:{poolId}"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerRequest {
    pub chain_id: u64,
    pub pool_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityUpdateRequest {
    pub chain_id: u64,
    pub pool_id: String,
    pub signature: String,
    pub eligibility: EligibilityCriteria,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDistributionRequest {
    pub chain_id: u64,
    pub pool_id: String,
    pub signature: String,
    pub distribution: Vec<DistributionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub chain_id: u64,
    pub pool_id: String,
    pub application_id: ApplicationId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub chain_id: u64,
    pub pool_id: String,
    pub voter: VoterAddress,
    pub ballot: Ballot,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterEligibilityRequest {
    pub chain_id: u64,
    pub pool_id: String,
    pub voter: VoterAddress,
}

/// Router builder exposing the metric, pool and voting endpoints.
pub fn funding_router<R>(service: Arc<FundingService<R>>) -> Router
where
    R: FundingRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/metrics",
            get(list_metrics_handler::<R>).post(add_metrics_handler::<R>),
        )
        .route(
            "/api/v1/metrics/:identifier",
            put(update_metric_handler::<R>),
        )
        .route("/api/v1/pools", post(create_pool_handler::<R>))
        .route(
            "/api/v1/pools/:chain_id/:pool_id",
            get(pool_handler::<R>),
        )
        .route("/api/v1/pools/sync", post(sync_pool_handler::<R>))
        .route("/api/v1/pools/calculate", post(calculate_handler::<R>))
        .route("/api/v1/pools/finalize", post(finalize_handler::<R>))
        .route(
            "/api/v1/pools/eligibility",
            post(update_eligibility_handler::<R>),
        )
        .route(
            "/api/v1/pools/custom-distribution",
            post(set_custom_distribution_handler::<R>)
                .delete(delete_custom_distribution_handler::<R>),
        )
        .route(
            "/api/v1/pools/calculation-data",
            post(calculation_data_handler::<R>),
        )
        .route(
            "/api/v1/applications",
            post(create_application_handler::<R>),
        )
        .route("/api/v1/votes", post(submit_vote_handler::<R>))
        .route("/api/v1/votes/predict", post(predict_handler::<R>))
        .route(
            "/api/v1/votes/eligibility",
            post(voter_eligibility_handler::<R>),
        )
        .with_state(service)
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::ActionNotAllowed => StatusCode::FORBIDDEN,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: FundingError) -> Response {
    let kind = err.kind();
    if kind == ErrorKind::ServerError {
        error!(error = %err, "funding request failed");
    }
    let payload = json!({
        "error": err.to_string(),
        "kind": kind,
    });
    (status_for(kind), Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, FundingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_metrics_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
) -> Response
where
    R: FundingRepository + 'static,
{
    respond(StatusCode::OK, service.list_metrics())
}

pub(crate) async fn add_metrics_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(metrics): Json<Vec<Metric>>,
) -> Response
where
    R: FundingRepository + 'static,
{
    respond(StatusCode::CREATED, service.add_metrics(metrics))
}

pub(crate) async fn update_metric_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Path(identifier): Path<String>,
    Json(update): Json<MetricUpdate>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let identifier = MetricIdentifier::new(identifier);
    respond(StatusCode::OK, service.update_metric(&identifier, update))
}

pub(crate) async fn create_pool_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<CreatePoolRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    respond(StatusCode::CREATED, service.create_pool(request).await)
}

pub(crate) async fn pool_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Path((chain_id, pool_id)): Path<(u64, String)>,
) -> Response
where
    R: FundingRepository + 'static,
{
    respond(StatusCode::OK, service.pool(&PoolKey::new(chain_id, pool_id)))
}

pub(crate) async fn sync_pool_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<PoolRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    match service.sync_pool(&key).await {
        Ok(applications) => {
            let payload = json!({
                "pool": key,
                "applications": applications,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn calculate_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<PoolRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    match service.calculate_distribution(&key).await {
        Ok(distribution) => {
            let payload = json!({ "data": distribution });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn finalize_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<ManagerRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    respond(
        StatusCode::OK,
        service.finalize_distribution(&key, &request.signature).await,
    )
}

pub(crate) async fn update_eligibility_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<EligibilityUpdateRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    match service
        .update_eligibility(&key, &request.signature, request.eligibility)
        .await
    {
        Ok(()) => {
            let payload = json!({ "message": "eligibility updated" });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn set_custom_distribution_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<CustomDistributionRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    respond(
        StatusCode::CREATED,
        service
            .set_custom_distribution(&key, &request.signature, request.distribution)
            .await,
    )
}

pub(crate) async fn delete_custom_distribution_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<ManagerRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    match service
        .delete_custom_distribution(&key, &request.signature)
        .await
    {
        Ok(()) => {
            let payload = json!({ "message": "custom distribution removed" });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn calculation_data_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<PoolRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    respond(StatusCode::OK, service.calculation_data(&key).await)
}

pub(crate) async fn create_application_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<CreateApplicationRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    respond(
        StatusCode::CREATED,
        service.create_application(&key, request.application_id),
    )
}

pub(crate) async fn submit_vote_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<VoteRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    respond(
        StatusCode::CREATED,
        service.submit_vote(&key, request.voter, request.ballot),
    )
}

pub(crate) async fn predict_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<VoteRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    match service
        .predict_distribution(&key, request.voter, request.ballot)
        .await
    {
        Ok(distribution) => {
            let payload = json!({ "data": distribution });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn voter_eligibility_handler<R>(
    State(service): State<Arc<FundingService<R>>>,
    Json(request): Json<VoterEligibilityRequest>,
) -> Response
where
    R: FundingRepository + 'static,
{
    let key = PoolKey::new(request.chain_id, request.pool_id);
    match service.is_voter_eligible(&key, &request.voter) {
        Ok(eligible) => {
            let payload = json!({
                "voter": request.voter,
                "eligible": eligible,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}
