use anyhow::Context;
use dotenvy as dotenv;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cash_handover::config::Config;
use cash_handover::db::{PgHandoverStore, StalePendingMonitor};
use cash_handover::directory::PgStationDirectory;
use cash_handover::handover::{HandoverService, VariancePolicy};
use cash_handover::shift::PgShiftLedger;
use cash_handover::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // trying multiple .env locations since working directory differs between dev and prod
    let _ = dotenv::from_filename_override(".env");
    let _ = dotenv::from_filename_override(concat!(env!("CARGO_MANIFEST_DIR"), "/.env"));
    let _ = dotenv::dotenv_override();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cash_handover=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cash handover service");

    let config = Config::from_env().context("error with configuration")?;
    tracing::info!("Configuration loaded successfully");

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let read_pool = match &config.database_read_url {
        Some(url) => {
            tracing::info!("Connecting to read replica...");
            Some(
                PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(url)
                    .await
                    .context("Failed to connect to read replica")?,
            )
        }
        None => None,
    };
    tracing::info!("Database connected successfully");

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Migrations applied");
    }

    let store = Arc::new(PgHandoverStore::new(db_pool.clone(), read_pool));
    let policy = VariancePolicy::new(config.variance_max_relative, config.variance_max_absolute);
    tracing::info!(
        "Variance tolerance: relative <= {}, absolute < {}",
        policy.max_relative,
        policy.max_absolute
    );

    let handover_service = Arc::new(HandoverService::new(
        store.clone(),
        Arc::new(PgStationDirectory::new(db_pool.clone())),
        Arc::new(PgShiftLedger::new(db_pool.clone())),
        policy,
    ));

    // spawning as background task so server startup isn't blocked by the scan schedule
    let monitor = StalePendingMonitor::new(
        store,
        config.stale_pending_hours,
        config.stale_scan_interval_secs,
    );
    tokio::spawn(async move {
        tracing::info!("Starting stale pending handover monitor");
        if let Err(e) = monitor.run_periodic_scan().await {
            tracing::error!("Stale handover monitor stopped: {}", e);
        }
    });

    let app = build_router(Arc::new(AppState { handover_service }));

    // in case the configured port is taken, try a few more before giving up
    let host: std::net::IpAddr = config.host.parse().context("HOST is not an IP address")?;
    let mut port = config.port;
    let mut listener = None;

    for _ in 0..10u16 {
        let addr = SocketAddr::from((host, port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => {
                listener = Some((addr, l));
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to bind to {}: {} (trying next port)", addr, e);
                port = port.saturating_add(1);
            }
        }
    }

    let (addr, listener) = listener.ok_or_else(|| anyhow::anyhow!(
        "Failed to bind to any port in range {}..{}",
        config.port,
        config.port.saturating_add(9)
    ))?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
