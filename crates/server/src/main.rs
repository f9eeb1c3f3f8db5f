mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triage_core::{
    create_audit_system, load_config, validate_config, AuditActor, AuditEvent, AuditStore,
    Classifier, HttpClassifier, PolicyStore, SqliteAuditStore, SqlitePolicyStore,
    SqliteSuggestionStore, SqliteTicketStore, SuggestionStore, TicketStore, TriageRunner,
};

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
    let config_path = std::env::var("TRIAGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Classifier URL: {}", config.classifier.url);
    info!("Database path: {:?}", config.database.path);

    // Create SQLite stores
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    let ticket_store: Arc<dyn TicketStore> = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to create ticket store")?,
    );
    info!("Ticket store initialized");

    let suggestion_store: Arc<dyn SuggestionStore> = Arc::new(
        SqliteSuggestionStore::new(&config.database.path)
            .context("Failed to create suggestion store")?,
    );
    info!("Suggestion store initialized");

    let policy_store: Arc<dyn PolicyStore> = Arc::new(
        SqlitePolicyStore::new(&config.database.path).context("Failed to create policy store")?,
    );
    info!("Policy store initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);

    // Spawn audit writer task
    let writer_handle = tokio::spawn(audit_writer.run());

    // Emit ServiceStarted event
    audit_handle
        .emit(
            AuditActor::System,
            None,
            AuditEvent::ServiceStarted {
                version: VERSION.to_string(),
                config_summary: format!(
                    "classifier={}, workers={}",
                    config.classifier.url, config.triage.workers
                ),
            },
        )
        .await;
    info!("Emitted ServiceStarted audit event");

    // Create classification client
    let classifier: Arc<dyn Classifier> =
        Arc::new(HttpClassifier::new(config.classifier.clone()));
    info!("Classification client initialized");

    // Create and start the triage runner
    let runner = Arc::new(TriageRunner::new(
        config.triage.clone(),
        Arc::clone(&ticket_store),
        Arc::clone(&suggestion_store),
        Arc::clone(&policy_store),
        classifier,
        Some(audit_handle.clone()),
    ));
    runner.start().await;
    info!("Triage runner started");

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        audit_handle.clone(),
        audit_store,
        ticket_store,
        suggestion_store,
        policy_store,
        Arc::clone(&runner),
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
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the triage runner
    info!("Stopping triage runner...");
    runner.stop().await;

    // Emit ServiceStopped event
    info!("Server shutting down...");
    audit_handle
        .emit(
            AuditActor::System,
            None,
            AuditEvent::ServiceStopped {
                reason: "graceful_shutdown".to_string(),
            },
        )
        .await;

    // Drop all holders of AuditHandle so the writer's channel closes.
    // The runner holds a handle clone; its dispatcher released it when the
    // shutdown signal broke the loop. The router (and its AppState) was
    // dropped when axum::serve returned. Order matters: the final event is
    // emitted BEFORE handles are dropped.
    drop(runner);
    drop(audit_handle);

    // Wait for writer to finish processing remaining events
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
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
}
