use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapgram::{
    api,
    config::{Config, MediaBackend},
    media_store as media,
    replication::Replicator,
    social::SocialService,
    state_machine::SocialStateMachine,
    storage::Database,
    AppState,
};

/// GCS access tokens last an hour
const GCS_TOKEN_REFRESH: Duration = Duration::from_secs(45 * 60);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "snapgram starting");

    let config = Config::load()?;
    info!(
        single_node = config.is_single_node(),
        "Loaded configuration for node: {}", config.node.id
    );

    let db = Database::open(&config.node.data_dir)?;
    info!("Database opened at: {}", config.node.data_dir);

    let mut background = Vec::new();

    let media_store: Arc<dyn media::MediaStore> = match config.media.backend {
        MediaBackend::Local => {
            let store =
                media::LocalStore::new(&config.media.local_media_path, &config.media.public_url)?;
            info!(
                "Using local media backend at: {}",
                config.media.local_media_path
            );
            Arc::new(store)
        }
        MediaBackend::Gcs => {
            let bucket = config
                .media
                .gcs_bucket
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("GCS_BUCKET is required for the gcs backend"))?;
            let store = Arc::new(
                media::GcsStore::new(bucket, config.media.gcs_credentials_file.as_deref()).await?,
            );
            info!("Using GCS media backend, bucket: {}", bucket);

            let refresher = Arc::clone(&store);
            background.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(GCS_TOKEN_REFRESH);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = refresher.refresh_token().await {
                        tracing::error!(error = %e, "Failed to refresh GCS access token");
                    }
                }
            }));
            store as Arc<dyn media::MediaStore>
        }
    };

    // Build muster configuration
    let cluster_port = config.cluster.cluster_port;
    let cluster_peers: Vec<String> = config
        .cluster
        .peers
        .iter()
        .map(|peer| {
            if let Some((host, _)) = peer.rsplit_once(':') {
                format!("{host}:{cluster_port}")
            } else {
                format!("{peer}:{cluster_port}")
            }
        })
        .collect();

    let muster_config = muster::Config {
        node_id: config.node.id.clone(),
        cluster_port,
        heartbeat_interval_ms: config.cluster.heartbeat_interval_ms,
        election_timeout_ms: config.cluster.election_timeout_ms,
        discovery: muster::DiscoveryConfig {
            dns_name: config.cluster.discovery.dns_name.clone(),
            peers: cluster_peers,
            poll_interval_secs: config.cluster.discovery.poll_interval_seconds,
        },
    };

    // Cluster log and social records share one redb instance
    let muster_storage = muster::RedbStorage::new(db.inner())?;
    let state_machine = SocialStateMachine::new(db.clone());
    let node = muster::MusterNode::new(muster_config, muster_storage, state_machine)?;

    // Start cluster background tasks (heartbeat, election, discovery, TCP server)
    let cluster_handles = node.start();

    let replicator: Arc<dyn Replicator> = node.clone();
    let social = SocialService::new(
        db.clone(),
        replicator,
        media_store,
        config.social.clone(),
    );

    match social.resume_pending_deletions().await {
        Ok(0) => {}
        Ok(finished) => info!(finished, "Resumed interrupted post deletions"),
        Err(e) => tracing::warn!(error = %e, "Could not scan for interrupted post deletions"),
    }

    background.push(spawn_sweeper(
        social.clone(),
        Duration::from_secs(config.social.sweep_interval_seconds),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        node: Arc::clone(&node),
        social,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down background tasks");
    for handle in cluster_handles.into_iter().chain(background) {
        handle.abort();
    }

    // Persist cluster state to disk
    if let Err(e) = node.persist_state().await {
        tracing::error!(error = %e, "Failed to persist cluster state during shutdown");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Periodically drop expired drafts and retry failed media deletes.
fn spawn_sweeper(social: SocialService, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = social.sweep_expired_drafts(chrono::Utc::now()).await {
                tracing::warn!(error = %e, "Draft sweep failed");
            }
            if let Err(e) = social.reconcile_orphaned_media().await {
                tracing::warn!(error = %e, "Orphaned media reconciliation failed");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
