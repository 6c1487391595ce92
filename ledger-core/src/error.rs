//! Error types for the ledger

use crate::types::EntityKind;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// No record stored under the key
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind the caller expected
        kind: EntityKind,
        /// Record key
        id: String,
    },

    /// Record exists but carries another discriminator (ID collision or corruption)
    #[error("Type mismatch for {id}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Record key
        id: String,
        /// Kind the caller expected
        expected: EntityKind,
        /// Discriminator found on the stored record
        found: String,
    },

    /// Bad numeric input or malformed identifier
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Key already holds a record
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Kind being created
        kind: EntityKind,
        /// Record key
        id: String,
    },

    /// Balance cannot cover the requested debit or reservation
    #[error("Insufficient funds on {account}: required {required}, available {available}")]
    InsufficientFunds {
        /// Account being debited
        account: String,
        /// Amount the operation needs
        required: Decimal,
        /// Amount the account can cover
        available: Decimal,
    },

    /// Spender's allowance is smaller than the requested transfer
    #[error("Insufficient allowance from {owner} to {spender}: required {required}, allowed {allowed}")]
    InsufficientAllowance {
        /// Owner of the funds
        owner: String,
        /// Spender drawing the funds
        spender: String,
        /// Requested amount
        required: Decimal,
        /// Current allowance
        allowed: Decimal,
    },

    /// Mint amount exceeds the token's remaining supply
    #[error("Supply exceeded for token {token}: requested {requested}, remaining {remaining}")]
    SupplyExceeded {
        /// Token identifier
        token: String,
        /// Requested amount
        requested: Decimal,
        /// Remaining supply
        remaining: Decimal,
    },

    /// Storage error (underlying state store)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for `AlreadyExists`
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
