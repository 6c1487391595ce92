//! Party to ledger-account resolution
//!
//! Contracts name parties (consumer, provider); payments move between their
//! ledger accounts. Verifying who the caller is happens before the exchange
//! is reached, so resolution here is a pure mapping.

use crate::{Error, Result};
use datamarket_ledger::AccountId;

/// Maps a verified party ID to its ledger account
pub trait IdentityResolver: Send + Sync {
    /// Ledger account of `party_id`
    fn resolve_account_id(&self, party_id: &str) -> Result<AccountId>;
}

/// Resolver deriving `"{prefix}-{party}"`
#[derive(Debug, Clone)]
pub struct PrefixedAccountResolver {
    prefix: String,
}

impl PrefixedAccountResolver {
    /// Create new resolver
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for PrefixedAccountResolver {
    fn default() -> Self {
        Self::new("account")
    }
}

impl IdentityResolver for PrefixedAccountResolver {
    fn resolve_account_id(&self, party_id: &str) -> Result<AccountId> {
        if party_id.trim().is_empty() {
            return Err(Error::Identity("empty party ID".to_string()));
        }
        Ok(AccountId::new(format!("{}-{}", self.prefix, party_id)))
    }
}
