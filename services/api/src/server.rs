use crate::cli::ServeArgs;
use crate::infra::{build_service, load_roster, AppState};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tenant_marketplace::config::AppConfig;
use tenant_marketplace::error::AppError;
use tenant_marketplace::telemetry;
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

    let roster = load_roster(args.providers.as_deref())?;
    let roster_source = if args.providers.is_some() { "csv" } else { "sample" };
    info!(
        providers = roster.len(),
        source = roster_source,
        "provider directory loaded"
    );

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(build_service(config.marketplace.clone(), roster));

    let app = with_marketplace_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        currency = %config.marketplace.default_currency,
        urgent_within_days = config.marketplace.urgent_within_days,
        "marketplace service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
