use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, RestConfig, cors_layer, router};
use mobilemed_core::{CoreConfig, Store};

/// Main entry point for the MobileMed application
///
/// Connects the store, then serves the REST API until Ctrl-C. In-flight requests are allowed
/// to finish before the store is closed.
///
/// # Environment Variables
/// - `MOBILEMED_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `DATABASE_URL`: SQLite database URL (default: "sqlite://mobilemed.db")
/// - `DATABASE_MAX_CONNECTIONS`: connection pool size (default: 5)
/// - `MOBILEMED_MAX_PAGE_SIZE`: largest accepted `pageSize` (default: 100)
/// - `API_KEY`: when set, record routes require a matching `x-api-key` header
/// - `CORS_ALLOWED_ORIGIN`: single allowed origin (default: any)
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, store startup or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mobilemed_run=info".parse()?)
                .add_directive("mobilemed_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let core_cfg = CoreConfig::from_env_values(
        std::env::var("DATABASE_URL").ok(),
        std::env::var("DATABASE_MAX_CONNECTIONS").ok(),
        std::env::var("MOBILEMED_MAX_PAGE_SIZE").ok(),
    )?;
    let rest_cfg = RestConfig::from_env_values(
        std::env::var("MOBILEMED_REST_ADDR").ok(),
        std::env::var("API_KEY").ok(),
        std::env::var("CORS_ALLOWED_ORIGIN").ok(),
    );

    let store = Store::connect(&core_cfg).await?;
    let state = AppState::new(
        store.clone(),
        core_cfg.max_page_size(),
        rest_cfg.api_key.clone(),
    );
    let app = router(state, cors_layer(rest_cfg.cors_allowed_origin.as_deref())?);

    if rest_cfg.api_key.is_none() {
        tracing::warn!("API_KEY not set; record routes are open");
    }

    let listener = tokio::net::TcpListener::bind(&rest_cfg.addr).await?;
    tracing::info!("++ Starting MobileMed REST on {}", rest_cfg.addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    store.close().await;
    served?;

    tracing::info!("-- MobileMed stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
