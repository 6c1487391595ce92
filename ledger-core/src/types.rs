//! Core types for the ledger
//!
//! All types are designed for:
//! - Stable JSON layout with an explicit `docType` discriminator
//! - Exact arithmetic (Decimal for token amounts)
//! - Deterministic ordering of allowance maps

use crate::repository::Record;
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ledger account identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Discriminator carried by every persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Ledger account
    Account,
    /// Fungible token
    Token,
    /// Contract-type template offered by a provider
    ContractType,
    /// Data-exchange contract between provider and consumer
    DataContract,
}

impl EntityKind {
    /// Wire value of the discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Token => "token",
            EntityKind::ContractType => "contract_type",
            EntityKind::DataContract => "data_contract",
        }
    }

    /// Parse a stored discriminator
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "account" => Some(EntityKind::Account),
            "token" => Some(EntityKind::Token),
            "contract_type" => Some(EntityKind::ContractType),
            "data_contract" => Some(EntityKind::DataContract),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token account with owner/spender allowances
///
/// `total_allowances` always equals the sum of `allowances` after any
/// allowance operation. Allowances reserve funds but do not move them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account ID (store key)
    pub id: AccountId,

    /// Owning party
    #[serde(default)]
    pub owner: String,

    /// Spendable balance
    pub balance: Decimal,

    /// Sum of all reserved allowances
    pub total_allowances: Decimal,

    /// Spender -> reserved amount
    #[serde(default)]
    pub allowances: BTreeMap<AccountId, Decimal>,
}

impl Account {
    /// Fresh account with zero balance and no allowances
    pub fn new(id: impl Into<AccountId>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            balance: Decimal::ZERO,
            total_allowances: Decimal::ZERO,
            allowances: BTreeMap::new(),
        }
    }

    /// Allowance granted to `spender` (0 when absent)
    pub fn allowance_for(&self, spender: &AccountId) -> Decimal {
        self.allowances.get(spender).copied().unwrap_or(Decimal::ZERO)
    }

    /// Sum of the allowance map
    pub fn allowance_sum(&self) -> Decimal {
        self.allowances.values().copied().sum()
    }

    /// Check `total_allowances == sum(allowances)`
    pub fn allowances_consistent(&self) -> bool {
        self.total_allowances == self.allowance_sum()
    }
}

impl Record for Account {
    const KIND: EntityKind = EntityKind::Account;

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// Named token with a fixed total supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Token ID (store key)
    pub id: String,

    /// Supply fixed at creation
    pub total_supply: Decimal,

    /// Supply not yet minted to accounts
    pub remaining_supply: Decimal,
}

impl Token {
    /// New token whose whole supply is still available
    pub fn new(id: impl Into<String>, total_supply: Decimal) -> Self {
        Self {
            id: id.into(),
            total_supply,
            remaining_supply: total_supply,
        }
    }
}

impl Record for Token {
    const KIND: EntityKind = EntityKind::Token;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Reject negative amounts
pub fn ensure_non_negative(amount: Decimal, what: &str) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(Error::InvalidArgument(format!(
            "{} must be non-negative, got {}",
            what, amount
        )));
    }
    Ok(())
}

/// Add two amounts, failing instead of overflowing
pub fn checked_add(lhs: Decimal, rhs: Decimal, what: &str) -> Result<Decimal> {
    lhs.checked_add(rhs).ok_or_else(|| {
        Error::InvalidArgument(format!("{} overflows: {} + {}", what, lhs, rhs))
    })
}
