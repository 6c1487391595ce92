//! Ledger bootstrap binary
//!
//! Opens the configured state store and creates the default token so the
//! marketplace can start minting. Safe to run repeatedly.

use anyhow::Context;
use datamarket_ledger::{storage, Config, Ledger, LoggingConfig, TracingSink};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading config from {}", path))?,
        None => Config::default(),
    };
    config.apply_env().context("applying environment overrides")?;

    init_tracing(&config.logging);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        backend = ?config.storage.backend,
        "Starting ledger bootstrap"
    );

    let store = storage::open(&config.storage)?;
    let ledger = Ledger::new(store)?.with_event_sink(Arc::new(TracingSink));

    match ledger.create_token(&config.token.id, config.token.total_supply) {
        Ok(token) => tracing::info!(token = %token.id, supply = %token.total_supply, "Default token created"),
        Err(e) if e.is_already_exists() => tracing::info!(token = %config.token.id, "Default token already exists"),
        Err(e) => return Err(e).context("creating default token"),
    }

    tracing::info!(
        token = %config.token.id,
        total = %ledger.total_supply(&config.token.id)?,
        available = %ledger.available_supply(&config.token.id)?,
        "Ledger ready"
    );
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
