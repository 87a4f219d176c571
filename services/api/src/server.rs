use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryGridProvider, InMemoryProfileProvider, InMemoryResultStore};
use crate::routes::{with_evaluation_routes, ServiceOrchestrator};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use grid_scoring::config::{AppConfig, ScoringConfig};
use grid_scoring::error::AppError;
use grid_scoring::scoring::{EvaluationOrchestrator, GridCache};
use grid_scoring::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let orchestrator = Arc::new(build_orchestrator(&config.scoring)?);
    let app = with_evaluation_routes(orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "grid scoring service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Preloads the configured grids and profiles and wires them to an in-memory result store.
pub(crate) fn build_orchestrator(scoring: &ScoringConfig) -> Result<ServiceOrchestrator, AppError> {
    let grids = InMemoryGridProvider::default();
    grids.load_paths(&scoring.grid_paths)?;
    if grids.names().is_empty() {
        warn!("no grids configured; set SCORING_GRID_PATHS to serve evaluations");
    }

    let profiles = InMemoryProfileProvider::default();
    if let Some(path) = &scoring.profiles_path {
        profiles.load_path(path)?;
    }

    let orchestrator = EvaluationOrchestrator::new(
        Arc::new(grids),
        Arc::new(profiles),
        Arc::new(InMemoryResultStore::default()),
    );

    Ok(if scoring.grid_cache {
        orchestrator.with_grid_cache(Arc::new(GridCache::new()))
    } else {
        orchestrator
    })
}
