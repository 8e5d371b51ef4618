use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clubflow_workflow::background::{deadline_sweep, reconciliation};
use clubflow_workflow::store::{PgWorkflowStore, WorkflowStore};
use clubflow_workflow::WorkflowConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubflow_worker=debug,clubflow_workflow=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    // --- Configuration ---
    let config = WorkflowConfig::from_env().expect("Invalid workflow configuration");
    tracing::info!(
        triage_days = config.deadlines.triage_days,
        proposal_days = config.deadlines.proposal_days,
        name_revision_days = config.deadlines.name_revision_days,
        sweep_interval_secs = config.deadline_sweep_interval.as_secs(),
        batch_limit = config.batch_limit,
        "Loaded workflow configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(clubflow_db::DEFAULT_MAX_CONNECTIONS);

    let pool = clubflow_db::create_pool(&database_url, max_connections)
        .await
        .expect("Failed to connect to database");
    tracing::info!(max_connections, "Database connection pool created");

    clubflow_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    clubflow_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store: Arc<dyn WorkflowStore> = Arc::new(PgWorkflowStore::new(pool.clone()));

    // --- Background jobs ---
    // Provisioning retry needs a concrete ClubProvisioner, so the service that
    // owns one spawns background::provisioning_retry::run. This worker only
    // reports the backlog.
    let cancel = CancellationToken::new();

    let sweep_handle = tokio::spawn(deadline_sweep::run(
        Arc::clone(&store),
        config.deadline_sweep_interval,
        config.batch_limit,
        cancel.clone(),
    ));
    let reconciliation_handle = tokio::spawn(reconciliation::run(
        Arc::clone(&store),
        config.provisioning_retry_interval,
        config.batch_limit,
        cancel.clone(),
    ));
    tracing::info!("Worker started (deadline sweep, provisioning reconciliation)");

    shutdown_signal().await;

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), reconciliation_handle).await;

    pool.close().await;
    tracing::info!("Worker shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
