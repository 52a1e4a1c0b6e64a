use crate::cli::ServeArgs;
use crate::infra::{load_rate_schedule, AppState};
use crate::routes::with_coordination_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use ndis_coord::config::AppConfig;
use ndis_coord::error::AppError;
use ndis_coord::telemetry;
use ndis_coord::workflows::coordination::{
    CoordinationService, InMemoryCoordinationStore, InMemoryNotifier,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let rates = load_rate_schedule(args.rates_csv.as_deref())?;
    let coordination_service = Arc::new(CoordinationService::new(
        Arc::new(InMemoryCoordinationStore::default()),
        Arc::new(InMemoryNotifier::default()),
        config.coordination.clone(),
        rates,
    ));

    let app = with_coordination_routes(coordination_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        warning_days = config.coordination.compliance_warning_days,
        "ndis service coordinator ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
