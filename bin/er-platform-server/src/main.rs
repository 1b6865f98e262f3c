//! Event Registration Platform Server
//!
//! Serves the events, registrations, admin and auth APIs plus health probes
//! and Swagger UI.
//!
//! ## Configuration
//!
//! An optional TOML file (first argument or `ER_CONFIG`) followed by
//! environment overrides:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ER_HTTP_PORT` | `8080` | HTTP API port |
//! | `ER_DATABASE_URL` | `postgres://localhost:5432/event_registration` | Postgres connection URL |
//! | `ER_DATABASE_MAX_CONNECTIONS` | `10` | Pool size |
//! | `ER_DATABASE_STATEMENT_TIMEOUT_MS` | `5000` | Per-operation datastore deadline |
//! | `ER_JWT_SECRET` | dev secret | HS256 session signing key (required outside dev mode) |
//! | `ER_SESSION_TTL_SECS` | `604800` | Session lifetime |
//! | `ER_LOG_FORMAT` | `text` | `text` or `json` |
//! | `ER_DEV_MODE` | `false` | Seed sample data into an empty database |
//! | `RUST_LOG` | `info` | Log filter |

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tokio::{signal, net::TcpListener};

use er_config::AppConfig;
use er_platform::api::{create_router, PlatformState};
use er_platform::repository::{connect_pool, PostgresStore};
use er_platform::seed::DevDataSeeder;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    er_common::init_logging(config.logging.format, &config.logging.level)
        .context("Failed to initialise logging")?;

    info!(dev_mode = config.dev_mode, "Starting Event Registration Platform Server");

    // Connect to Postgres
    let pool = connect_pool(&config.database).context("Failed to create database pool")?;
    let store = Arc::new(PostgresStore::new(pool, config.database.statement_timeout()));
    store.init_schema().await.context("Failed to initialise database schema")?;

    let state = PlatformState::new(store.clone(), &config).context("Failed to build services")?;

    // Seed development data if in dev mode
    if config.dev_mode {
        let seeder = DevDataSeeder::new(state.identity.clone(), store.clone());
        if let Err(e) = seeder.seed(chrono::Utc::now().date_naive()).await {
            warn!(error = %e, "Dev data seeding failed");
        }
    }

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = config.http_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API server listening on http://{}", addr);
    info!("Swagger UI at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Event Registration Platform Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received...");
}
