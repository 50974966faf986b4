use anyhow::Result;
use research_flow::{config::DEFAULT_LOG_FILTER, router, AppState, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;
    info!(
        "Search providers in fallback order: {:?}",
        state.pipeline.provider_names()
    );

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Research server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
