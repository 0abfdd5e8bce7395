mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use solace_core::{CoreConfig, DirectoryStatus, Hub, NoticeKind, Services};
use solace_db::Database;
use solace_gateway::{LocalBackend, PresenceDispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solace=debug".into()),
        )
        .init();

    // Config
    let config = CoreConfig::from_env()?;
    let db_path = std::env::var("SOLACE_DB_PATH").unwrap_or_else(|_| "solace.db".into());
    let user_id = match std::env::var("SOLACE_USER_ID") {
        Ok(raw) => raw
            .trim()
            .parse::<Uuid>()
            .with_context(|| format!("invalid SOLACE_USER_ID: {}", raw))?,
        Err(_) => Uuid::new_v4(),
    };
    let seed_demo = std::env::var("SOLACE_SEED_DEMO")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    if seed_demo {
        seed::seed_demo(&db)?;
    }

    let dispatcher = PresenceDispatcher::new();
    let backend = Arc::new(LocalBackend::new(db, dispatcher, user_id));
    let hub = Hub::new(Some(user_id), Services::from_backend(backend), config.clone());

    info!(
        %user_id,
        debounce_ms = config.presence_debounce.as_millis() as u64,
        connect_scope = %config.connect_scope,
        "Solace hub starting"
    );

    let watchers = spawn_watchers(&hub);

    if let Err(e) = hub.enter().await {
        warn!("Initial load failed: {}", e);
    }

    shutdown_signal().await;

    hub.shutdown().await;
    for watcher in watchers {
        watcher.abort();
    }
    Ok(())
}

/// Log hub, directory and notice changes as they happen.
fn spawn_watchers(hub: &Hub) -> Vec<tokio::task::JoinHandle<()>> {
    let mut state_rx = hub.watch();
    let state = tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            info!(
                mode = ?state.mode,
                supporter = state.is_supporter(),
                available = state.is_available(),
                conversations = state.conversations.len(),
                load_error = state.load_error.as_deref().unwrap_or("-"),
                "hub state"
            );
        }
    });

    let mut directory_rx = hub.directory().watch();
    let directory = tokio::spawn(async move {
        while directory_rx.changed().await.is_ok() {
            let view = directory_rx.borrow_and_update().clone();
            match &view.status {
                DirectoryStatus::Ready(supporters) => {
                    let names: Vec<&str> =
                        supporters.iter().map(|s| s.display_name.as_str()).collect();
                    info!(revision = view.revision, "Available supporters: {:?}", names);
                }
                DirectoryStatus::Failed(err) => {
                    warn!(revision = view.revision, "Supporter directory failed: {}", err);
                }
                DirectoryStatus::Idle | DirectoryStatus::Loading => {}
            }
        }
    });

    let mut notices_rx = hub.notices();
    let notices = tokio::spawn(async move {
        loop {
            match notices_rx.recv().await {
                Ok(notice) => match notice.kind {
                    NoticeKind::Success => info!("{}", notice.title),
                    NoticeKind::Error => warn!(
                        "{}: {}",
                        notice.title,
                        notice.detail.as_deref().unwrap_or("unknown error")
                    ),
                },
                Err(RecvError::Lagged(n)) => warn!("Missed {} notices", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    vec![state, directory, notices]
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
