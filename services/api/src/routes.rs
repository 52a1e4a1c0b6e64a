use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Extension;
use axum::Json;
use ndis_coord::workflows::coordination::{
    coordination_router, CoordinationRepository, CoordinationService, NotificationPublisher,
    RateTable,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_coordination_routes<R, N>(
    service: Arc<CoordinationService<R, N>>,
) -> axum::Router
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let tables: Arc<Vec<RateTable>> = Arc::new(service.rates().tables().to_vec());

    coordination_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/pay/rate-tables",
            get(move || rate_tables_endpoint(tables.clone())),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Rate tables are public award data, so no role is required to read them.
pub(crate) async fn rate_tables_endpoint(tables: Arc<Vec<RateTable>>) -> Json<Vec<RateTable>> {
    Json(tables.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::load_rate_schedule;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use ndis_coord::workflows::coordination::{
        CoordinationConfig, InMemoryCoordinationStore, InMemoryNotifier, ROLE_HEADER,
    };
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn app(ready: bool) -> (axum::Router, Arc<AtomicBool>) {
        let rates = load_rate_schedule(None).expect("standard rates");
        let service = Arc::new(CoordinationService::new(
            Arc::new(InMemoryCoordinationStore::default()),
            Arc::new(InMemoryNotifier::default()),
            CoordinationConfig::default(),
            rates,
        ));
        let readiness = Arc::new(AtomicBool::new(ready));
        let state = AppState {
            readiness: readiness.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        (
            with_coordination_routes(service).layer(Extension(state)),
            readiness,
        )
    }

    async fn call(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.expect("route executes");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 256 * 1024)
            .await
            .expect("read body");
        let payload = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, payload)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_the_startup_flag() {
        let (router, readiness) = app(false);

        let (status, payload) = call(router.clone(), get_request("/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload["status"], "initializing");

        readiness.store(true, Ordering::Release);
        let (status, payload) = call(router, get_request("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], "ready");
    }

    #[tokio::test]
    async fn rate_tables_are_listed_without_a_role() {
        let (router, _) = app(true);

        let (status, payload) = call(router, get_request("/api/v1/pay/rate-tables")).await;
        assert_eq!(status, StatusCode::OK);
        let tables = payload.as_array().expect("table list");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0]["effective_from"], "2025-07-01");
    }

    #[tokio::test]
    async fn coordination_routes_are_mounted() {
        let (router, _) = app(true);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/pay/quote")
            .header(ROLE_HEADER, "admin")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "classification": "scs_level_3",
                    "date": "2026-03-10",
                    "start_time": "18:00:00",
                    "end_time": "20:00:00"
                })
                .to_string(),
            ))
            .expect("request builds");

        let (status, payload) = call(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["base_amount"], "97.50");
        assert_eq!(payload["penalties"][0]["kind"], "evening");
    }
}
