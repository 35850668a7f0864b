use std::collections::HashMap;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

mod config;
mod drive;
mod error;
mod handler;
mod pagination;
mod render;
mod route;
mod token;

use handler::AppState;
use pagination::CursorCache;
use token::TokenCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("drive_index=info")),
        )
        .init();

    let config_path = std::env::var("CONFIG_ENV").unwrap_or_else(|_| "config.env".to_string());
    match dotenvy::from_path_override(&config_path) {
        Ok(()) => tracing::info!(path = %config_path, "loaded configuration file"),
        Err(e) if e.not_found() => tracing::debug!(path = %config_path, "no configuration file"),
        Err(e) => return Err(e).with_context(|| format!("failed to read {config_path}")),
    }

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8787".to_string());
    let address: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {bind}:{port}"))?;

    let cursor_ttl: u64 = match std::env::var("CURSOR_CACHE_TTL_SECS") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid CURSOR_CACHE_TTL_SECS {value:?}"))?,
        Err(_) => 0,
    };

    let state = Arc::new(AppState {
        env: utf8_env(std::env::vars_os()),
        http: reqwest::Client::builder()
            .user_agent(concat!("drive-index/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?,
        tokens: Arc::new(TokenCache::new()),
        cursors: CursorCache::new(Duration::from_secs(cursor_ttl)),
    });

    tracing::info!(%address, cursor_ttl, "listening");
    axum::Server::bind(&address)
        .serve(handler::router(state).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}

/// Environment variables as strings; pairs that are not valid UTF-8 are skipped.
fn utf8_env(vars: impl IntoIterator<Item = (OsString, OsString)>) -> HashMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                let key = key.unwrap_or_else(|raw| raw.to_string_lossy().into_owned());
                tracing::warn!(%key, "skipping non-UTF-8 environment variable");
                None
            }
        })
        .collect()
}
