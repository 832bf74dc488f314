use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use retrofund::funding::{funding_router, FundingRepository, FundingService};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

/// Mounts `/health`, `/ready` and `/metrics` next to the funding API.
pub(crate) fn with_funding_routes<R>(service: Arc<FundingService<R>>) -> axum::Router
where
    R: FundingRepository + 'static,
{
    funding_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness))
        .route("/metrics", get(prometheus_metrics))
}

async fn healthcheck() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness(Extension(state): Extension<AppState>) -> (StatusCode, Json<Value>) {
    if state.readiness.load(Ordering::Acquire) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting" })),
        )
    }
}

async fn prometheus_metrics(Extension(state): Extension<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, PROMETHEUS_TEXT)], state.metrics.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::DevSignatureVerifier;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use retrofund::funding::{
        Collaborators, CsvMetricsProvider, InMemoryFundingRepository, SnapshotIndexer,
    };
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let service = Arc::new(FundingService::new(
            Arc::new(InMemoryFundingRepository::default()),
            Collaborators {
                indexer: Arc::new(SnapshotIndexer::default()),
                metrics: Arc::new(CsvMetricsProvider::default()),
                signatures: Arc::new(DevSignatureVerifier),
            },
        ));
        let recorder = PrometheusBuilder::new().build_recorder();
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        };
        with_funding_routes(service).layer(Extension(state))
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let response = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_package() {
        let response = app(false)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["service"], "retrofund-api");
    }

    #[tokio::test]
    async fn funding_routes_are_mounted() {
        let response = app(true)
            .oneshot(
                Request::get("/api/v1/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn unknown_pool_is_not_found() {
        let response = app(true)
            .oneshot(
                Request::get("/api/v1/pools/10/42")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
