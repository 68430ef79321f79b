use anyhow::Result;
use portwatch::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let fetch_timeout = Duration::from_secs(app_config.polling.fetch_timeout_secs);
    let client = Arc::new(fetcher::PortainerClient::connect(
        &app_config.portainer,
        fetch_timeout,
    )?);
    tracing::info!(
        name = %app_config.portainer.name,
        config_id = %app_config.portainer.config_id,
        base_url = %client.base_url(),
        "Portainer client ready"
    );

    let coordinator = coordinator::Coordinator::new(
        client.clone(),
        coordinator::CoordinatorContext {
            config_id: app_config.portainer.config_id.clone(),
            config_name: app_config.portainer.name.clone(),
            features: app_config.features,
            fetch_timeout,
            max_concurrent_inspections: app_config.polling.max_concurrent_inspections,
        },
    );
    let state = coordinator::CoordinatorState::new(app_config.selection.clone());

    let (published_tx, published_rx) = watch::channel(state.published());
    let (events_tx, _) = broadcast::channel(app_config.publishing.broadcast_capacity);
    let (commands_tx, commands_rx) = mpsc::channel(worker::COMMAND_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            coordinator,
            state,
            published_tx,
            events_tx: events_tx.clone(),
            commands_rx,
            shutdown_rx,
        },
        worker::WorkerConfig {
            scan_interval: Duration::from_secs(app_config.polling.scan_interval_secs),
        },
    );

    let app = routes::app(
        published_rx,
        events_tx,
        commands_tx,
        client,
        app_config.features,
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let in_container = std::path::Path::new("/.dockerenv").exists()
        || std::env::var("CONTAINER").as_deref() == Ok("1");

    routes::serve(
        listener,
        app,
        shutdown_signal(in_container),
        shutdown_tx,
        worker_handle,
    )
    .await?;

    Ok(())
}

/// SIGTERM, plus ctrl-c outside a container (PID 1 in Docker only gets SIGTERM).
async fn shutdown_signal(in_container: bool) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) if in_container => {
                sigterm.recv().await;
            }
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = in_container;
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Received shutdown signal");
}
