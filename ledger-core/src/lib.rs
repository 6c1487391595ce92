//! Data Marketplace Ledger Core
//!
//! Token ledger with escrow semantics over a flat key-value state store.
//!
//! # Architecture
//!
//! - **Typed records**: Every stored document carries a `docType`
//!   discriminator checked on read
//! - **Allowances**: Owners reserve funds for a spender with `approve`;
//!   the spender settles with `transfer_from`
//! - **Sagas**: Multi-record mutations run as ordered steps with
//!   compensations, since the store commits each write on its own
//!
//! # Invariants
//!
//! - `total_allowances == sum(allowances)` for every account
//! - Balances never go negative
//! - A transfer never exceeds the spender's allowance

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod repository;
pub mod saga;
pub mod storage;
pub mod types;

// Re-exports
pub use config::{Config, LoggingConfig, StorageBackend, StorageConfig, TokenConfig};
pub use error::{Error, Result};
pub use events::{EventEnvelope, EventSink, LedgerEvent, NoopSink, RecordingSink, TracingSink};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use repository::{Record, Repository};
pub use saga::Saga;
pub use storage::{FaultInjectingStore, MemoryStore, StateStore, StoreOp};
pub use types::{checked_add, ensure_non_negative, Account, AccountId, EntityKind, Token};
