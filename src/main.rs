use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use wallet_settlement::api::{create_router, AppState};
use wallet_settlement::config::Settings;
use wallet_settlement::gateway::WechatPayAdapter;
use wallet_settlement::observability::{init_logging, init_metrics, LogConfig, LogFormat};
use wallet_settlement::repositories::PgStore;
use wallet_settlement::services::{LedgerLimits, PgCatalog, SettlementCoordinator, WalletLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;

    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(settings.application.log_format.as_str()),
        ..LogConfig::default()
    });
    info!("Configuration loaded");

    let metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    // Connect to PostgreSQL
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout_secs))
        .connect(&settings.database.url)
        .await
        .context("failed to connect to database")?;
    info!("Database connection established");

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    let store = Arc::new(PgStore::new(pool.clone()));
    let catalog = Arc::new(PgCatalog::new(pool.clone()));
    let ledger = Arc::new(WalletLedger::new(
        store.clone(),
        catalog,
        LedgerLimits::from(&settings.ledger),
    ));
    let gateway = Arc::new(
        WechatPayAdapter::new(&settings.gateway.api_v3_key)
            .context("invalid gateway configuration")?,
    );
    let settlement = Arc::new(SettlementCoordinator::new(store, ledger.clone(), gateway));

    let state = AppState::new(ledger, settlement)
        .with_pool(pool)
        .with_metrics(metrics_handle);
    let app = create_router(state);

    let addr = format!("{}:{}", settings.application.host, settings.application.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
