use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryDocumentStore};
use crate::routes::with_verification_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use business_verify::config::AppConfig;
use business_verify::error::AppError;
use business_verify::telemetry;
use business_verify::workflows::verification::{
    run_intake_worker, DecisionService, FsBlobStore, IntakeHandler, JwtIdentityProvider,
    RequestCreatedGateway,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.auto_approve {
        config.verification.auto_approve = true;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryDocumentStore::default());
    let blobs = Arc::new(FsBlobStore::new(config.blobs.root.clone()));
    let identity = Arc::new(JwtIdentityProvider::hs256(
        config.auth.require_secret()?.as_bytes(),
        config.auth.issuer.as_deref(),
        config.auth.audience.as_deref(),
    ));

    let intake = Arc::new(IntakeHandler::new(
        store.clone(),
        blobs,
        config.verification,
    ));
    let (intake_queue, intake_worker_queue) = mpsc::channel(config.intake.queue_depth);
    tokio::spawn(run_intake_worker(intake, intake_worker_queue));

    let gateway = Arc::new(RequestCreatedGateway::new(
        store.clone(),
        intake_queue,
        config.intake.require_event_secret()?,
    ));
    let decisions = Arc::new(DecisionService::new(store, identity));

    let app = with_verification_routes(decisions, gateway)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        auto_approve = config.verification.auto_approve,
        blob_root = %config.blobs.root.display(),
        "business verification service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
