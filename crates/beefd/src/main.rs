//! beefd - The missed-delivery tracker service
//!
//! Wires together:
//! - Configuration loading
//! - Key-value backend selection (remote REST or in-memory)
//! - Record store, admin auth and login rate limiting
//! - The HTTP server, with graceful shutdown on SIGTERM/SIGINT

use anyhow::{Context, Result};
use beef_config::{ServiceConfig, load_config};
use beef_core::AdminAuth;
use beef_http::{AppState, build_router};
use beef_store::{KvStore, LockMode, MemoryKv, MissStore, RestKv};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// How often expired login rate limit entries are dropped
const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// beefd - Missed-delivery tracker
#[derive(Parser, Debug)]
#[command(name = "beefd")]
#[command(about = "Missed-delivery tracker HTTP service", long_about = None)]
struct Args {
    /// Configuration file path (optional; environment variables alone suffice)
    #[arg(short, long, env = "BEEF_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address override (takes precedence over BEEF_LISTEN)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Pick the storage backend and matching lock mode
fn open_backend(config: &ServiceConfig) -> Result<(Arc<dyn KvStore>, LockMode)> {
    match &config.kv {
        Some(remote) => {
            let kv = RestKv::new(remote.url.clone(), remote.token.clone())
                .context("Failed to create KV REST client")?;
            info!(url = %kv.url(), "Using remote key-value store");
            Ok((Arc::new(kv), LockMode::Shared))
        }
        None => {
            warn!(
                "No remote key-value store configured, using in-memory storage. \
                 Data will not persist across restarts or be shared between instances"
            );
            Ok((Arc::new(MemoryKv::new()), LockMode::Local))
        }
    }
}

/// Resolves on the first SIGTERM or SIGINT
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
        }
    })
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Failed to load config from {path:?}"),
        None => "Failed to load config from environment".to_string(),
    })?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    info!(
        listen = %config.listen,
        mode = ?config.mode,
        max_attempts = config.login.max_attempts,
        session_expiry_secs = config.session_expiry.as_secs(),
        "Configuration loaded"
    );

    let (kv, lock_mode) = open_backend(&config)?;
    let state = AppState::new(
        MissStore::new(kv, lock_mode),
        AdminAuth::new(config.admin_password.expose(), config.session_expiry),
        config.login,
        config.secure_cookies(),
    );

    // Periodic rate limiter cleanup
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        timer.tick().await;
        loop {
            timer.tick().await;
            let removed = sweep_state.sweep_rate_limits().await;
            if removed > 0 {
                debug!(removed, "Swept expired login rate limit entries");
            }
        }
    });

    // Install handlers before serving so an early signal is not lost
    let shutdown = shutdown_signal()?;

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(addr = %config.listen, "Service running");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    info!("Service stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "beefd starting");

    run(args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use beef_config::parse_config;
    use std::collections::HashMap;

    fn config(env: &[(&str, &str)]) -> ServiceConfig {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        parse_config("config_version = 1", &env).unwrap()
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["beefd"]).unwrap();
        assert_eq!(args.log_level, "info");
        assert!(args.listen.is_none());

        let args =
            Args::try_parse_from(["beefd", "--listen", "127.0.0.1:8080", "-l", "debug"]).unwrap();
        assert_eq!(args.listen, Some("127.0.0.1:8080".parse().unwrap()));
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn test_memory_backend_without_remote_config() {
        let (_kv, mode) = open_backend(&config(&[])).unwrap();
        assert_eq!(mode, LockMode::Local);
    }

    #[test]
    fn test_remote_backend_uses_shared_lock() {
        let config = config(&[
            ("KV_REST_API_URL", "https://kv.example.com"),
            ("KV_REST_API_TOKEN", "token"),
        ]);
        let (_kv, mode) = open_backend(&config).unwrap();
        assert_eq!(mode, LockMode::Shared);
    }
}
