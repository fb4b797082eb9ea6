//! Parley server entrypoint

use tracing_subscriber::EnvFilter;

use parley_server::{routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool =
        parley_shared::create_pool(&config.database_url, config.database_max_connections).await?;
    parley_shared::run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, pool);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Parley server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
