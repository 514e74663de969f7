//! Caución gateway binary entrypoint.

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use caucion_common::config::AppConfig;

use caucion_api::routes::create_router;
use caucion_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("caucion_api=debug,caucion_chain=debug,caucion_common=info,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Caución gateway...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let addr = config.bind_addr;
    let cors = cors_layer(config.front_origin.as_deref())?;

    tracing::info!(
        config_path = %config.config_path.display(),
        abi_dir = %config.abi_dir.display(),
        validation = %config.validation_mode,
        admin_token = config.admin_token.is_some(),
        "Configuration loaded"
    );
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is not set; configuration writes are open");
    }

    // Build application state and warm the configuration cell
    let state = AppState::from_config(config);
    let record = state.store.load().await;
    tracing::info!(network = %record.network, "Configuration record ready");

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    Ok(())
}

/// CORS restricted to `FRONT_ORIGIN` when set, permissive otherwise.
fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };

    let origin: HeaderValue = origin
        .parse()
        .map_err(|_| anyhow::anyhow!("FRONT_ORIGIN must be a valid header value"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}
