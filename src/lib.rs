//! Restaurant POS web service.
//!
//! Customers browse the menu, fill a session cart and place orders. Cashiers
//! and administrators work the order queue, manage the menu and staff
//! accounts and read sales reports through server-rendered pages backed by
//! JSON endpoints. Everything lives in one SQLite file.

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use serde_json::Value;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tracing::{info, warn};

pub mod auth;
pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod oplog;
pub mod orders;
pub mod products;
pub mod reports;
pub mod routes;
pub mod session;
pub mod settings;
pub mod staff;
pub mod views;

use config::Config;
use db::DbState;
use session::SessionStore;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_SHA: &str = env!("BUILD_GIT_SHA");
pub const BUILT_AT: &str = env!("BUILD_TIMESTAMP");

/// Shared by every request handler.
pub struct AppState {
    pub config: Config,
    pub db: DbState,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: Config, db: DbState) -> Self {
        let sessions = Arc::new(SessionStore::new(Duration::minutes(
            config.session_idle_minutes,
        )));
        Self {
            config,
            db,
            sessions,
        }
    }
}

/// A JSON number or a numeric string.
pub(crate) fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A JSON integer, an integral float or an integer string.
pub(crate) fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// Entry point
// ============================================================================

pub async fn run() -> anyhow::Result<()> {
    logging::init(&config::log_dir());

    info!(
        git_sha = GIT_SHA,
        built_at = BUILT_AT,
        "Starting restaurant POS v{VERSION}"
    );

    let config = Config::load().context("loading configuration")?;
    let db = db::init(&config.database_path).context("opening database")?;
    if config.seed_sample_data {
        let conn = db.lock()?;
        db::seed_defaults(&conn, config.bcrypt_cost).context("seeding database")?;
    }

    let state = Arc::new(AppState::new(config, db));
    let app = routes::router(state.clone());

    let address = state.config.bind_address();
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_values_accept_numbers_and_strings() {
        assert_eq!(value_as_f64(&json!(12.5)), Some(12.5));
        assert_eq!(value_as_f64(&json!(" 80 ")), Some(80.0));
        assert_eq!(value_as_f64(&json!("abc")), None);
        assert_eq!(value_as_f64(&json!(null)), None);

        assert_eq!(value_as_i64(&json!(3)), Some(3));
        assert_eq!(value_as_i64(&json!(3.0)), Some(3));
        assert_eq!(value_as_i64(&json!(3.5)), None);
        assert_eq!(value_as_i64(&json!("42")), Some(42));
        assert_eq!(value_as_i64(&json!(true)), None);
    }
}
