mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faretrack_core::audit::{create_audit_system, AuditEvent, AuditStore, SqliteAuditStore};
use faretrack_core::notify::{NotificationChannel, NotificationGate, WebhookChannel};
use faretrack_core::provider::{HttpPricingProvider, PricingProvider};
use faretrack_core::store::{NotificationStore, PackageStore, RunLockStore, SqliteStore};
use faretrack_core::{load_config, validate_config, PriceRefresher, RequoteSupervisor};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("FARETRACK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Provider base URL: {}", config.provider.base_url);
    info!("Database path: {:?}", config.database.path);

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Create SQLite package store (also backs notification logs and run locks)
    let store = Arc::new(
        SqliteStore::new(&config.database.path).context("Failed to create package store")?,
    );
    let packages: Arc<dyn PackageStore> = store.clone();
    let notifications: Arc<dyn NotificationStore> = store.clone();
    let locks: Arc<dyn RunLockStore> = store;
    info!("Package store initialized");

    // Create SQLite audit store
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);

    // Spawn audit writer task
    let writer_handle = tokio::spawn(audit_writer.run());

    // Emit ServiceStarted event
    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;
    info!("Emitted ServiceStarted audit event");

    // Create pricing provider client
    let provider: Arc<dyn PricingProvider> =
        Arc::new(HttpPricingProvider::new(config.provider.clone()));
    info!("Pricing provider client initialized");

    // Create notification gate if a webhook is configured
    let gate: Option<Arc<NotificationGate>> = match &config.notifier.webhook_url {
        Some(url) => {
            info!("Initializing webhook notification channel");
            let channel: Arc<dyn NotificationChannel> = Arc::new(
                WebhookChannel::new(url.clone(), config.notifier.timeout_secs as u64)
                    .context("Failed to create webhook channel")?,
            );
            Some(Arc::new(NotificationGate::new(
                config.notifier.clone(),
                channel,
                Arc::clone(&packages),
                Arc::clone(&notifications),
                audit_handle.clone(),
            )))
        }
        None => {
            info!("No notification webhook configured");
            None
        }
    };

    // Create refresh job and requote supervisor
    let refresher = Arc::new(PriceRefresher::new(
        Arc::clone(&provider),
        Arc::clone(&packages),
        gate.clone(),
        audit_handle.clone(),
        config.refresh.clone(),
    ));
    let supervisor = Arc::new(RequoteSupervisor::new(
        config.bot.clone(),
        Arc::clone(&packages),
        gate.clone(),
        audit_handle.clone(),
    ));

    // Shutdown channel, flipped to true when a termination signal arrives.
    // In-flight requote runs watch it and kill the bot process.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        packages,
        locks,
        audit_store,
        audit_handle.clone(),
        refresher,
        supervisor,
        gate,
        shutdown_rx,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("Server error")?;

    // Emit ServiceStopped event
    info!("Server shutting down...");
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // Drop all holders of AuditHandle so the writer's channel closes.
    // AppState was dropped with the router; the refresher and supervisor
    // clones went with it. Order matters: the final event is emitted
    // BEFORE dropping the handle.
    drop(audit_handle);

    // Wait for writer to flush remaining events
    if let Err(e) = writer_handle.await {
        error!("Audit writer task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
