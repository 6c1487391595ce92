//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//! Counters are registered on a registry owned by the collector, so several
//! ledgers (and tests) can coexist in one process.
//!
//! # Metrics
//!
//! - `ledger_accounts_created_total` - Accounts created
//! - `ledger_tokens_created_total` - Tokens created
//! - `ledger_approvals_total` - Successful approvals
//! - `ledger_transfers_total` - Successful transfer-from operations
//! - `ledger_mints_total` - Successful mints
//! - `ledger_compensations_total` - Compensations applied after a failed step
//! - `ledger_compensation_failures_total` - Compensations that failed

use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Accounts created
    pub accounts_created: IntCounter,

    /// Tokens created
    pub tokens_created: IntCounter,

    /// Successful approvals
    pub approvals: IntCounter,

    /// Successful transfers
    pub transfers: IntCounter,

    /// Successful mints
    pub mints: IntCounter,

    /// Compensations applied
    pub compensations: IntCounter,

    /// Compensations that failed
    pub compensation_failures: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        Ok(Self {
            accounts_created: counter(
                &registry,
                "ledger_accounts_created_total",
                "Total number of accounts created",
            )?,
            tokens_created: counter(
                &registry,
                "ledger_tokens_created_total",
                "Total number of tokens created",
            )?,
            approvals: counter(
                &registry,
                "ledger_approvals_total",
                "Total number of successful approvals",
            )?,
            transfers: counter(
                &registry,
                "ledger_transfers_total",
                "Total number of successful transfer-from operations",
            )?,
            mints: counter(&registry, "ledger_mints_total", "Total number of mints")?,
            compensations: counter(
                &registry,
                "ledger_compensations_total",
                "Compensations applied after a failed step",
            )?,
            compensation_failures: counter(
                &registry,
                "ledger_compensation_failures_total",
                "Compensations that failed and were not retried",
            )?,
            registry,
        })
    }

    /// Record the outcome of a rolled-back saga
    pub fn record_rollback(&self, applied: usize, failed: usize) {
        self.compensations.inc_by(applied as u64);
        self.compensation_failures.inc_by(failed as u64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Create a counter and register it
pub fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}
