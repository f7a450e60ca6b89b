//! caretrack-api - CareTrack administration backend service

use anyhow::Result;
use clap::Parser;
use tracing::info;

use caretrack_api::config::Config;
use caretrack_api::{build_router, db, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting CareTrack API v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::parse();
    config.validate()?;

    let pool = db::connect(&config.database_url).await?;
    info!("✓ Connected to database");

    db::schema::init_database(&pool).await?;

    if config.enable_audit {
        info!("Audit logging enabled");
    } else {
        info!("Audit logging disabled (set CARETRACK_ENABLE_AUDIT=true to enable)");
    }

    let state = AppState::new(pool, &config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("caretrack-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
