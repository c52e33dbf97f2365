use crate::cli::ServeArgs;
use crate::infra::{open_persistence, otp_service, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hunt_property::config::AppConfig;
use hunt_property::error::AppError;
use hunt_property::telemetry;
use hunt_property::AppContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
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

    let persistence = open_persistence(&config).await?;
    let otp = otp_service(&config, persistence.otp_store.clone());
    let context = AppContext::new(
        persistence.stores,
        otp,
        config.content.clone(),
        config.otp.expose_code,
    );

    tokio::fs::create_dir_all(&config.content.uploads_dir).await?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        backend: persistence.backend,
    };

    let app = with_service_routes(context)
        .nest_service("/uploads", ServeDir::new(&config.content.uploads_dir))
        .layer(Extension(app_state))
        .layer(CorsLayer::permissive())
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        backend = persistence.backend.as_str(),
        "hunt property api ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(readiness_flag))
        .await?;
    info!("hunt property api stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM and flips readiness off first.
async fn shutdown_signal(readiness: Arc<AtomicBool>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    readiness.store(false, Ordering::Release);
    info!("shutdown signal received, draining connections");
}
