use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tower_http::cors::CorsLayer;
use tracing::info;

use social_link::api::{create_authorize_router, create_links_router, AuthorizeAppState, LinksAppState};
use social_link::authorize::AuthorizationCoordinator;
use social_link::config::{load_config, ServiceConfig};
use social_link::links::AccountLinkStore;
use social_link::provider::TwitterProvider;
use social_link::session::{run_pending_cleanup, PendingStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_link=info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            load_config(&path).map_err(|e| anyhow!("Failed to load config from {}: {}", path, e))?
        }
        None => ServiceConfig::default(),
    };

    // Secrets come from the environment only
    let consumer_key = std::env::var("SOCIAL_LINK_CONSUMER_KEY")
        .context("SOCIAL_LINK_CONSUMER_KEY must be set")?;
    let consumer_secret = std::env::var("SOCIAL_LINK_CONSUMER_SECRET")
        .context("SOCIAL_LINK_CONSUMER_SECRET must be set")?;
    let encryption_key = std::env::var("SOCIAL_LINK_ENCRYPTION_KEY")
        .context("SOCIAL_LINK_ENCRYPTION_KEY must be set (base64, 32 bytes)")?;

    let links = Arc::new(
        AccountLinkStore::new(&config.storage.db_path, &encryption_key)
            .context("Failed to open account link store")?,
    );

    let provider = Arc::new(TwitterProvider::new(
        consumer_key,
        consumer_secret,
        config.provider.clone(),
    ));

    let pending = PendingStore::new(config.session.expiry_seconds);
    tokio::spawn(run_pending_cleanup(
        pending.clone(),
        config.session.cleanup_interval_seconds,
    ));

    let coordinator = Arc::new(AuthorizationCoordinator::new(
        provider,
        pending,
        links.clone(),
        config.server.callback_base_url.clone(),
    ));

    let app = create_authorize_router(AuthorizeAppState {
        coordinator,
        auth_enabled: config.server.auth_enabled,
        result_path: config.server.result_path.clone(),
    })
    .merge(create_links_router(LinksAppState {
        links,
        auth_enabled: config.server.auth_enabled,
    }))
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!(addr = %config.server.bind_addr, "social-link listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
