//! Error types for the exchange

use crate::types::FileStatus;
use thiserror::Error;

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exchange errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] datamarket_ledger::Error),

    /// Escrow of the contract price was refused
    #[error("Payment not approved from {consumer} to {provider}: {source}")]
    PaymentNotApproved {
        /// Consumer ledger account
        consumer: String,
        /// Provider ledger account
        provider: String,
        /// Why the approval failed
        source: datamarket_ledger::Error,
    },

    /// Lifecycle transition not allowed from the contract's current state
    #[error("Invalid state transition for contract {contract_id}: {from} -> {to}")]
    InvalidStateTransition {
        /// Contract ID
        contract_id: String,
        /// Current status (or why the contract has none)
        from: String,
        /// Requested status
        to: FileStatus,
    },

    /// Malformed input or out-of-window timestamp
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Party could not be mapped to a ledger account
    #[error("Identity resolution failed: {0}")]
    Identity(String),

    /// Payment release failed after the shipment was recorded
    #[error("Settlement failed for contract {contract_id} (left {status}): {source}")]
    Settlement {
        /// Contract ID
        contract_id: String,
        /// Status the contract was left in
        status: FileStatus,
        /// Transfer failure
        source: Box<Error>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Underlying ledger error, if this wraps one
    pub fn ledger_error(&self) -> Option<&datamarket_ledger::Error> {
        match self {
            Error::Ledger(e) => Some(e),
            Error::PaymentNotApproved { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True for a ledger `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Ledger(e) if e.is_not_found())
    }

    /// True for a ledger `AlreadyExists`
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::Ledger(e) if e.is_already_exists())
    }
}
