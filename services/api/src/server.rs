use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_scoring_routes;
use altscore::config::AppConfig;
use altscore::error::AppError;
use altscore::scoring::CreditScorer;
use altscore::service::{ApplicantService, ServiceError};
use altscore::store::{CsvRecordStore, RecordStore};
use altscore::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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

    // Missing or malformed artifacts abort startup; the service never runs degraded.
    let scorer = Arc::new(CreditScorer::load(&config.models)?);
    let store = Arc::new(CsvRecordStore::new(config.store.data_file.clone()));
    store.ensure_store().map_err(ServiceError::from)?;
    let service = Arc::new(ApplicantService::new(scorer, store));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_scoring_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, data_file = %config.store.data_file.display(), "altscore service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
