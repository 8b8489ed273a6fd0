use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use trainfeed::api::{ApiServer, AppState};
use trainfeed::config::AppConfig;
use trainfeed::job::JobDispatcher;
use trainfeed::logging::init_logging;
use trainfeed::service::JobService;
use trainfeed::utils::http_client::build_http_client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();
    let (logging_config, _log_guard) = init_logging(&config.log_dir)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        batch_workers = config.dispatch.batch_workers,
        dispatch_workers = config.dispatcher.workers,
        log_dir = %logging_config.log_dir().display(),
        "Starting trainfeed"
    );

    let client = build_http_client(config.http_timeout)?;
    let service = Arc::new(JobService::new(client, config.dispatch.clone()));

    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.clone());

    let dispatcher = JobDispatcher::new(config.dispatcher.clone());
    dispatcher.start(service.clone());

    let service_handle = service.clone();
    let state = AppState::new(service).with_logging(logging_config);
    let server = ApiServer::new(config.api.clone(), state).with_cancel_token(shutdown.clone());

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let served = server.run().await;
    shutdown.cancel();
    dispatcher.stop().await;

    let abandoned = service_handle.drain_queue();
    if !abandoned.is_empty() {
        warn!(
            jobs = ?abandoned.iter().map(|job| job.id()).collect::<Vec<_>>(),
            "Jobs still queued at shutdown were not run"
        );
    }

    served?;
    info!("trainfeed stopped");
    Ok(())
}

async fn wait_for_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, initiating graceful shutdown"),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }

    token.cancel();
}
