//! Canopy Server: application entry point.

use std::error::Error;

use canopy_db::DbManager;
use canopy_server::jobs::spawn_daily_report_job;
use canopy_server::{AppState, ServerConfig, build_router};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("canopy=info".parse()?))
        .json()
        .init();

    info!("Starting Canopy server...");

    let config = ServerConfig::from_env();
    let manager = DbManager::connect(&config.db).await?;

    let offset = config.compliance.business_day_offset;
    let state = AppState::new(manager.client().clone(), config.compliance);

    let report_job = config
        .report_job
        .enabled
        .then(|| spawn_daily_report_job(state.clone(), offset, config.report_job.clone()));

    let app = build_router(state);
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(job) = report_job {
        job.abort();
    }
    info!("Canopy server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
