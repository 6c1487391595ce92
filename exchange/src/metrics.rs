//! Exchange metrics
//!
//! Registered on the ledger's registry so one scrape covers both.
//!
//! # Metrics
//!
//! - `exchange_contract_types_registered_total` - Contract types registered
//! - `exchange_proposals_accepted_total` - Proposals turned into contracts
//! - `exchange_proposals_rejected_total` - Proposals rejected
//! - `exchange_contracts_shipped_total` - Contracts shipped with payment released
//! - `exchange_contracts_received_total` - Contracts confirmed received
//! - `exchange_settlement_failures_total` - Payment releases that failed after shipment

use datamarket_ledger::metrics::counter;
use prometheus::{IntCounter, Registry};

/// Exchange metrics collector
#[derive(Clone)]
pub struct ExchangeMetrics {
    /// Contract types registered
    pub contract_types_registered: IntCounter,

    /// Proposals accepted
    pub proposals_accepted: IntCounter,

    /// Proposals rejected
    pub proposals_rejected: IntCounter,

    /// Contracts shipped
    pub contracts_shipped: IntCounter,

    /// Contracts received
    pub contracts_received: IntCounter,

    /// Settlement failures
    pub settlement_failures: IntCounter,
}

impl ExchangeMetrics {
    /// Register exchange counters on `registry`
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            contract_types_registered: counter(
                registry,
                "exchange_contract_types_registered_total",
                "Total number of contract types registered",
            )?,
            proposals_accepted: counter(
                registry,
                "exchange_proposals_accepted_total",
                "Total number of proposals turned into contracts",
            )?,
            proposals_rejected: counter(
                registry,
                "exchange_proposals_rejected_total",
                "Total number of rejected proposals",
            )?,
            contracts_shipped: counter(
                registry,
                "exchange_contracts_shipped_total",
                "Total number of contracts shipped",
            )?,
            contracts_received: counter(
                registry,
                "exchange_contracts_received_total",
                "Total number of contracts received",
            )?,
            settlement_failures: counter(
                registry,
                "exchange_settlement_failures_total",
                "Payment releases that failed after shipment was recorded",
            )?,
        })
    }
}
