use crate::cli::ServeArgs;
use crate::console::Console;
use crate::infra::{AppState, TrackerState};
use crate::routes::router;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use kpi_tracker::config::AppConfig;
use kpi_tracker::error::AppError;
use kpi_tracker::telemetry;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs, with_console: bool) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir.take() {
        config.storage.data_dir = data_dir;
    }

    telemetry::init(&config.telemetry)?;

    let state = TrackerState::open(&config.storage.data_dir)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = router(state.clone(), app_state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "kpi tracker ready");

    let console_exit = Arc::new(Notify::new());
    if with_console {
        spawn_console(state.clone(), console_exit.clone())?;
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(console_exit))
        .await?;
    readiness_flag.store(false, Ordering::Release);

    let summary = state.save_in_background().await?;
    info!(
        roles = summary.roles,
        kpis = summary.kpis,
        measurements = summary.measurements,
        "dataset saved on shutdown"
    );
    Ok(())
}

/// Run the console over stdin/stdout on its own thread, notifying `exit`
/// when the user leaves it.
fn spawn_console(state: TrackerState, exit: Arc<Notify>) -> io::Result<()> {
    std::thread::Builder::new()
        .name("kpi-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let mut console = Console::new(
                state,
                stdin.lock(),
                io::stdout(),
                Local::now().date_naive(),
            );
            if let Err(err) = console.run() {
                warn!(error = %err, "console stopped");
            }
            exit.notify_one();
        })?;
    Ok(())
}

async fn shutdown_signal(console_exit: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
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
                warn!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
        _ = console_exit.notified() => info!("console closed, shutting down"),
    }
}
