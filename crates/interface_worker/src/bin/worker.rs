//! Transaction normalization worker binary.
//!
//! Polls the processing queues on an interval, claims PENDING items and runs
//! them through the pass-through and summary stages. Lookup caches are
//! bulk-loaded at startup and re-loaded on a slower cadence.
//!
//! # Environment Variables
//!
//! * `WORKER_DATABASE_URL` - PostgreSQL connection string
//! * `WORKER_WORKER_NAME` - Audit identity for modified_by columns
//! * `WORKER_POLL_INTERVAL_SECS` - Seconds between queue polls (default: 30)
//! * `WORKER_CACHE_REFRESH_INTERVAL_SECS` - Seconds between cache reloads (default: 900)
//! * `WORKER_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `WORKER_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)

use std::time::Duration;

use domain_enrichment::{LookupRegistry, RefreshNotification};
use infra_db::{create_pool, DatabaseConfig};
use sqlx::postgres::PgListener;
use interface_worker::bootstrap::{build_lookups, build_stages};
use interface_worker::config::WorkerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config();
    init_tracing(&config.log_level);

    let run_id = Uuid::new_v4();
    tracing::info!(
        %run_id,
        worker = %config.worker_name,
        poll_interval_secs = config.poll_interval_secs,
        "starting transaction normalization worker"
    );

    let pool = create_pool(
        DatabaseConfig::new(&config.database_url).max_connections(config.max_connections),
    )
    .await?;

    let lookups = build_lookups(&pool);
    let (stages, registry) = build_stages(&pool, lookups, &config.worker_name);

    tracing::info!("loading lookup caches");
    registry.refresh_all().await?;

    // Upstream reference-data changes arrive as NOTIFY payloads naming the
    // cache and the changed key values.
    let mut listener = PgListener::connect_with(&pool).await?;
    listener.listen("lookup_refresh").await?;

    let mut poll = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    let mut refresh = tokio::time::interval(Duration::from_secs(config.cache_refresh_interval_secs));
    // The startup load above covers the first refresh tick.
    refresh.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                // A stage error leaves its item IN_PROGRESS for the operator;
                // the worker keeps polling the rest of the backlog.
                match stages.activity.run().await {
                    Ok(summary) if summary.items_claimed > 0 => {
                        tracing::info!(
                            items = summary.items_claimed,
                            rows = summary.transactions_written,
                            "activity stage pass complete"
                        );
                    }
                    Ok(_) => {}
                    Err(error) => tracing::error!(%error, "activity stage failed"),
                }
                match stages.summary.run().await {
                    Ok(summary) if summary.items_claimed > 0 => {
                        tracing::info!(
                            items = summary.items_claimed,
                            rows = summary.transactions_written,
                            "summary stage pass complete"
                        );
                    }
                    Ok(_) => {}
                    Err(error) => tracing::error!(%error, "summary stage failed"),
                }
            }
            _ = refresh.tick() => {
                if let Err(error) = registry.refresh_all().await {
                    tracing::warn!(%error, "lookup cache refresh failed; serving stale data");
                }
            }
            notification = listener.recv() => {
                match notification {
                    Ok(n) => apply_refresh(&registry, n.payload()).await,
                    Err(error) => {
                        // The periodic reload covers the gap until the
                        // listener connection comes back.
                        tracing::warn!(%error, "refresh listener error");
                    }
                }
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    tracing::info!(%run_id, "worker shutdown complete");
    Ok(())
}

/// Decodes and applies one refresh notification payload.
async fn apply_refresh(registry: &LookupRegistry, payload: &str) {
    let notification = match RefreshNotification::from_json(payload) {
        Ok(notification) => notification,
        Err(error) => {
            tracing::warn!(%error, payload, "discarding refresh notification");
            return;
        }
    };
    match registry.apply(&notification).await {
        Ok(rows) => tracing::info!(
            cache = %notification.cache,
            rows,
            "applied refresh notification"
        ),
        Err(error) => tracing::warn!(%error, cache = %notification.cache, "refresh failed"),
    }
}

/// Loads worker configuration from environment variables, falling back to
/// defaults when unset.
fn load_config() -> WorkerConfig {
    WorkerConfig::from_env().unwrap_or_else(|_| WorkerConfig {
        database_url: std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("WORKER_DATABASE_URL"))
            .unwrap_or_else(|_| WorkerConfig::default().database_url),
        log_level: std::env::var("WORKER_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string()),
        ..WorkerConfig::default()
    })
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
