//! Ramazan Yardımı dashboard - Entry point.

use axum::http::HeaderName;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use yardim_dashboard::{
    api::{cors_layer, create_router_with_rate_limit, AppState, RateLimitState},
    bootstrap,
    config::Config,
};
use yardim_registry::{AidStore, SqliteStore};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Ramazan Yardımı dashboard");

    // Open the registration store
    let opened = if config.database.is_in_memory() {
        SqliteStore::open_in_memory()
    } else {
        SqliteStore::open(&config.database.path)
    };
    let store: Arc<dyn AidStore> = match opened {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to open database {:?}: {}", config.database.path, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = bootstrap::ensure_admin(store.as_ref(), &config.auth).await {
        error!("Bootstrap failed: {:#}", e);
        std::process::exit(1);
    }

    let user_header = match HeaderName::from_bytes(config.auth.user_header.trim().as_bytes()) {
        Ok(h) => h,
        Err(e) => {
            error!("Invalid user header {:?}: {}", config.auth.user_header, e);
            std::process::exit(1);
        }
    };

    // Create application state
    let state = AppState::new(store, user_header.clone());

    // Create rate limiter from config
    let rate_limit = RateLimitState::new(config.rate_limit.global_per_minute);

    // Create router with rate limiting
    let mut app = create_router_with_rate_limit(state, rate_limit);
    if let Some(cors) = cors_layer(&config.server.cors_origins(), &user_header) {
        info!("CORS enabled for {}", config.server.cors_allowed_origins);
        app = app.layer(cors);
    }

    // Bind to address
    let addr = SocketAddr::new(
        config.server.listen_addr.parse().unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
