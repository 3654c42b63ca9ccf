use crate::cli::ServeArgs;
use crate::infra::{AppState, CatalogBackend, SubmitterBackend};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use student_intake::config::AppConfig;
use student_intake::error::AppError;
use student_intake::telemetry;
use student_intake::workflows::intake::IntakeService;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.require_guardian_id {
        config.intake.require_guardian_id = true;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = Arc::new(CatalogBackend::from_config(&config.intake));
    let submitter = Arc::new(SubmitterBackend::from_config(&config.intake)?);
    let intake_service = Arc::new(IntakeService::new(
        catalog,
        submitter,
        config.intake.stage_gates(),
    )
    .with_idle_timeout(config.intake.session_idle_timeout));

    let app = with_intake_routes(intake_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        require_guardian_id = config.intake.require_guardian_id,
        "student intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
