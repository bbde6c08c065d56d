use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use storefront_infra::AppState;
use storefront_infra::config::ResponderConfig;
use storefront_infra::handlers;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("storefront_infra=debug,tower_http=debug")
        }))
        .init();

    let config = ResponderConfig::from_env()?;
    tracing::info!(
        "database target {}:{} (name={}, user={})",
        config.database.host,
        config.database.port,
        config.database.name,
        config.database.user
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = handlers::router(AppState::new(config));

    tracing::info!("backend-placeholder listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
