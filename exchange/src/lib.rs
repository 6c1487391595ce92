//! Data Marketplace Exchange
//!
//! Contract types, proposals and the delivery-gated escrow built on the
//! ledger core.
//!
//! # Flow
//!
//! 1. **Registration**: A provider registers a contract type (price, kind,
//!    validity window)
//! 2. **Proposal**: A consumer proposes a contract; the price is escrowed as
//!    an allowance from consumer to provider
//! 3. **Shipment**: The provider marks the data shipped; the escrowed price
//!    moves to the provider
//! 4. **Receipt**: The consumer confirms receipt; the contract is final
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use datamarket_exchange::{
//!     Config, ContractProposal, ContractType, DataKind, Exchange, FileHash, FileStatus,
//!     ProposalExtras, ValidityWindow,
//! };
//! use datamarket_ledger::{AccountId, Ledger, MemoryStore};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! # fn main() -> datamarket_exchange::Result<()> {
//! let ledger = Ledger::new(Arc::new(MemoryStore::new()))?;
//! let exchange = Exchange::new(ledger, &Config::default())?;
//!
//! let ledger = exchange.ledger();
//! ledger.create_token("dmptoken", Decimal::from(1_000))?;
//! ledger.create_account(&AccountId::new("account-acme"), "acme")?;
//! ledger.create_account(&AccountId::new("account-globex"), "globex")?;
//! ledger.mint("dmptoken", &AccountId::new("account-globex"), Decimal::from(10))?;
//!
//! let now = Utc::now();
//! exchange.register_contract_type(ContractType {
//!     id: "traffic".to_string(),
//!     name: "Traffic counts".to_string(),
//!     provider_id: "acme".to_string(),
//!     category_id: "mobility".to_string(),
//!     price: Decimal::from(2),
//!     data_kind: DataKind::File,
//!     validity_window: ValidityWindow::new(now - Duration::days(1), now + Duration::days(30)),
//!     stream: None,
//! })?;
//!
//! exchange.submit_proposal(&ContractProposal {
//!     contract_id: "c-1".to_string(),
//!     consumer_id: "globex".to_string(),
//!     contract_type_id: "traffic".to_string(),
//!     timestamp: now,
//!     extras: ProposalExtras::default(),
//! })?;
//!
//! exchange.mark_shipped("c-1", FileHash::sha256(b"counts.csv"))?;
//! let contract = exchange.mark_received("c-1")?;
//!
//! assert_eq!(contract.extras.file_status, Some(FileStatus::Received));
//! assert_eq!(ledger.balance_of(&AccountId::new("account-acme"))?, Decimal::from(2));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod metrics;
pub mod proposal;
pub mod types;

// Re-exports
pub use config::{Config, IdentityConfig, LifecycleConfig, ShipmentPolicy};
pub use engine::Exchange;
pub use error::{Error, Result};
pub use identity::{IdentityResolver, PrefixedAccountResolver};
pub use metrics::ExchangeMetrics;
pub use types::{
    ContractExtras, ContractProposal, ContractType, DataContract, DataKind, FileHash, FileStatus,
    ProposalExtras, StreamSettings, StreamType, ValidityWindow,
};
