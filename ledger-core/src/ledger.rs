//! Account ledger and allowance protocol
//!
//! [`Ledger`] owns typed access to `Account` and `Token` records and
//! implements every token movement:
//!
//! - `approve` / `allowance` - reserve funds for a spender (replace semantics)
//! - `transfer_from` - move reserved funds, as a compensated three-step saga
//! - `retrieve_funds` / `add_funds` - additive debit and credit
//! - `set_balance` / `mint` - balance overwrite from a token's remaining supply
//!
//! # Invariants
//!
//! - `total_allowances == sum(allowances)` after every allowance operation
//! - No balance goes negative
//! - `transfer_from` never moves more than the spender's allowance
//!
//! # Example
//!
//! ```
//! use datamarket_ledger::{AccountId, Ledger, MemoryStore};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! # fn main() -> datamarket_ledger::Result<()> {
//! let ledger = Ledger::new(Arc::new(MemoryStore::new()))?;
//! let (alice, bob) = (AccountId::new("alice"), AccountId::new("bob"));
//!
//! ledger.create_token("dmp", Decimal::from(1_000))?;
//! ledger.create_account(&alice, "alice")?;
//! ledger.create_account(&bob, "bob")?;
//! ledger.mint("dmp", &alice, Decimal::from(100))?;
//!
//! ledger.approve(&alice, &bob, Decimal::from(30))?;
//! ledger.transfer_from(&alice, &bob, Decimal::from(10))?;
//!
//! assert_eq!(ledger.balance_of(&bob)?, Decimal::from(10));
//! assert_eq!(ledger.allowance(&alice, &bob)?, Decimal::from(20));
//! # Ok(())
//! # }
//! ```

use crate::{
    events::{EventEnvelope, EventSink, LedgerEvent, NoopSink},
    metrics::Metrics,
    repository::Repository,
    saga::Saga,
    storage::StateStore,
    types::{checked_add, ensure_non_negative, Account, AccountId, Token},
    Error, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Main ledger interface
pub struct Ledger<S: ?Sized> {
    /// Typed record access
    repo: Repository<S>,

    /// Fire-and-forget event sink
    events: Arc<dyn EventSink>,

    /// Prometheus counters
    metrics: Metrics,
}

impl<S: ?Sized> std::fmt::Debug for Ledger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

impl<S: StateStore + ?Sized> Ledger<S> {
    /// Ledger over `store` with no event sink
    pub fn new(store: Arc<S>) -> Result<Self> {
        Ok(Self {
            repo: Repository::new(store),
            events: Arc::new(NoopSink),
            metrics: Metrics::new()?,
        })
    }

    /// Set event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Typed record access (shared with collaborators that persist their own kinds)
    pub fn repository(&self) -> &Repository<S> {
        &self.repo
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Ledger store

    /// Create an account with zero balance
    pub fn create_account(&self, id: &AccountId, owner: &str) -> Result<Account> {
        if id.as_str().is_empty() {
            return Err(Error::InvalidArgument("account ID must not be empty".to_string()));
        }

        let account = Account::new(id.clone(), owner);
        self.repo.insert(&account)?;
        self.metrics.accounts_created.inc();

        tracing::info!(account = %id, owner, "Account created");
        Ok(account)
    }

    /// Load an account
    pub fn get_account(&self, id: &AccountId) -> Result<Account> {
        self.repo.get(id.as_str())
    }

    /// Persist an account as-is
    pub fn put_account(&self, account: &Account) -> Result<()> {
        self.repo.put(account)
    }

    /// Create a token whose whole supply is available for minting
    pub fn create_token(&self, id: &str, total_supply: Decimal) -> Result<Token> {
        ensure_non_negative(total_supply, "total supply")?;
        if id.is_empty() {
            return Err(Error::InvalidArgument("token ID must not be empty".to_string()));
        }

        let token = Token::new(id, total_supply);
        self.repo.insert(&token)?;
        self.metrics.tokens_created.inc();

        tracing::info!(token = id, %total_supply, "Token created");
        Ok(token)
    }

    /// Load a token
    pub fn get_token(&self, id: &str) -> Result<Token> {
        self.repo.get(id)
    }

    /// Persist a token as-is
    pub fn put_token(&self, token: &Token) -> Result<()> {
        self.repo.put(token)
    }

    /// Current balance of an account
    pub fn balance_of(&self, id: &AccountId) -> Result<Decimal> {
        Ok(self.get_account(id)?.balance)
    }

    /// Supply fixed at token creation
    pub fn total_supply(&self, token_id: &str) -> Result<Decimal> {
        Ok(self.get_token(token_id)?.total_supply)
    }

    /// Supply not yet minted
    pub fn available_supply(&self, token_id: &str) -> Result<Decimal> {
        Ok(self.get_token(token_id)?.remaining_supply)
    }

    // Allowance protocol

    /// Authorize `spender` to draw `amount` from `owner`
    ///
    /// Replaces any previous allowance to the same spender. The owner's
    /// balance must cover every reservation including the new one. An
    /// approval of zero keeps a zero entry in the map.
    pub fn approve(&self, owner_id: &AccountId, spender_id: &AccountId, amount: Decimal) -> Result<()> {
        ensure_non_negative(amount, "allowance")?;

        let mut owner = self.get_account(owner_id)?;
        self.get_account(spender_id)?;

        let previous = owner.allowance_for(spender_id);
        let required = checked_add(owner.total_allowances - previous, amount, "total allowances")?;
        if owner.balance < required {
            tracing::warn!(
                owner = %owner_id,
                spender = %spender_id,
                balance = %owner.balance,
                %required,
                "Approval exceeds balance"
            );
            return Err(Error::InsufficientFunds {
                account: owner_id.to_string(),
                required,
                available: owner.balance,
            });
        }

        owner.allowances.insert(spender_id.clone(), amount);
        owner.total_allowances = required;
        self.put_account(&owner)?;
        self.metrics.approvals.inc();

        tracing::info!(
            owner = %owner_id,
            spender = %spender_id,
            %amount,
            %previous,
            "Allowance approved"
        );
        Ok(())
    }

    /// Amount `spender` may draw from `owner` (0 when none granted)
    pub fn allowance(&self, owner_id: &AccountId, spender_id: &AccountId) -> Result<Decimal> {
        Ok(self.get_account(owner_id)?.allowance_for(spender_id))
    }

    /// Raw allowance entry, distinguishing "absent" from "zero"
    pub fn allowance_entry(&self, owner_id: &AccountId, spender_id: &AccountId) -> Result<Option<Decimal>> {
        Ok(self.get_account(owner_id)?.allowances.get(spender_id).copied())
    }

    /// Put an allowance entry back to exactly `previous` (absent when `None`)
    ///
    /// Used to undo an escrow. Balances are not touched.
    pub fn restore_allowance(
        &self,
        owner_id: &AccountId,
        spender_id: &AccountId,
        previous: Option<Decimal>,
    ) -> Result<()> {
        let mut owner = self.get_account(owner_id)?;
        let current = owner.allowance_for(spender_id);
        let total = checked_add(
            owner.total_allowances - current,
            previous.unwrap_or(Decimal::ZERO),
            "total allowances",
        )?;

        match previous {
            Some(value) => {
                owner.allowances.insert(spender_id.clone(), value);
            }
            None => {
                owner.allowances.remove(spender_id);
            }
        }
        owner.total_allowances = total;
        self.put_account(&owner)?;

        tracing::info!(owner = %owner_id, spender = %spender_id, ?previous, "Allowance restored");
        Ok(())
    }

    /// Move `amount` of escrowed funds from `source` to `destination`
    ///
    /// The destination must hold an allowance on the source of at least
    /// `amount`. Runs as three independently persisted steps:
    ///
    /// 1. debit the source balance
    /// 2. reduce the destination's allowance on the source
    /// 3. credit the destination balance
    ///
    /// If step 2 or 3 fails the completed steps are compensated (allowance
    /// refunded, source re-credited) and the step's error is returned.
    pub fn transfer_from(
        &self,
        source_id: &AccountId,
        destination_id: &AccountId,
        amount: Decimal,
    ) -> Result<()> {
        ensure_non_negative(amount, "transfer amount")?;

        let mut source = self.get_account(source_id)?;
        self.get_account(destination_id)?;

        let allowed = source.allowance_for(destination_id);
        if amount > allowed {
            tracing::warn!(
                source = %source_id,
                destination = %destination_id,
                %amount,
                %allowed,
                "Transfer exceeds allowance"
            );
            return Err(Error::InsufficientAllowance {
                owner: source_id.to_string(),
                spender: destination_id.to_string(),
                required: amount,
                allowed,
            });
        }

        let mut saga = Saga::new("transfer_from");
        if let Err(err) = self.run_transfer(&mut saga, &mut source, source_id, destination_id, amount) {
            self.metrics
                .record_rollback(saga.compensated().len(), saga.failed_compensations().len());
            return Err(err);
        }
        saga.complete();

        self.metrics.transfers.inc();
        self.emit(LedgerEvent::TransferFrom {
            from: source_id.clone(),
            to: destination_id.clone(),
            value: amount,
        });

        tracing::info!(
            source = %source_id,
            destination = %destination_id,
            %amount,
            "Transfer completed"
        );
        Ok(())
    }

    fn run_transfer<'a>(
        &'a self,
        saga: &mut Saga<'a, Error>,
        source: &mut Account,
        source_id: &'a AccountId,
        destination_id: &'a AccountId,
        amount: Decimal,
    ) -> Result<()> {
        saga.run_step(
            "debit_source",
            || self.retrieve_funds(source, amount).map(|_| ()),
            move || self.credit(source_id, amount),
        )?;

        saga.run_step(
            "reduce_allowance",
            || self.reduce_allowance(source, destination_id, amount).map(|_| ()),
            move || self.refund_allowance(source_id, destination_id, amount),
        )?;

        // Re-read so a self-transfer sees the writes above
        saga.run_final("credit_destination", || self.credit(destination_id, amount))
    }

    /// Debit `amount` from the account and persist
    ///
    /// Returns the new balance. On failure the in-memory account is left as
    /// it was.
    pub fn retrieve_funds(&self, account: &mut Account, amount: Decimal) -> Result<Decimal> {
        ensure_non_negative(amount, "amount")?;
        if amount > account.balance {
            return Err(Error::InsufficientFunds {
                account: account.id.to_string(),
                required: amount,
                available: account.balance,
            });
        }

        let old_balance = account.balance;
        account.balance -= amount;
        if let Err(e) = self.put_account(account) {
            account.balance = old_balance;
            return Err(e);
        }

        tracing::debug!(account = %account.id, %amount, balance = %account.balance, "Funds retrieved");
        Ok(account.balance)
    }

    /// Credit `amount` to the account and persist
    pub fn add_funds(&self, account: &mut Account, amount: Decimal) -> Result<Decimal> {
        ensure_non_negative(amount, "amount")?;

        let balance = checked_add(account.balance, amount, "balance")?;
        let old_balance = account.balance;
        account.balance = balance;
        if let Err(e) = self.put_account(account) {
            account.balance = old_balance;
            return Err(e);
        }

        tracing::debug!(account = %account.id, %amount, balance = %account.balance, "Funds added");
        Ok(account.balance)
    }

    /// Overwrite the account balance with `amount` and persist
    ///
    /// Not additive: whatever the account held before is replaced.
    pub fn set_balance(&self, account: &mut Account, amount: Decimal) -> Result<Decimal> {
        ensure_non_negative(amount, "balance")?;

        let old_balance = account.balance;
        account.balance = amount;
        if let Err(e) = self.put_account(account) {
            account.balance = old_balance;
            return Err(e);
        }

        tracing::debug!(account = %account.id, %old_balance, balance = %amount, "Balance set");
        Ok(account.balance)
    }

    /// Lower the allowance granted to `spender_id` by `amount` and persist
    ///
    /// An absent entry is a no-op returning 0. The entry is removed when it
    /// reaches exactly zero. Returns the remaining allowance.
    pub fn reduce_allowance(
        &self,
        account: &mut Account,
        spender_id: &AccountId,
        amount: Decimal,
    ) -> Result<Decimal> {
        ensure_non_negative(amount, "amount")?;

        let Some(current) = account.allowances.get(spender_id).copied() else {
            return Ok(Decimal::ZERO);
        };
        if amount > current {
            return Err(Error::InsufficientAllowance {
                owner: account.id.to_string(),
                spender: spender_id.to_string(),
                required: amount,
                allowed: current,
            });
        }

        let remaining = current - amount;
        let previous_total = account.total_allowances;
        if remaining.is_zero() {
            account.allowances.remove(spender_id);
        } else {
            account.allowances.insert(spender_id.clone(), remaining);
        }
        account.total_allowances -= amount;

        if let Err(e) = self.put_account(account) {
            account.allowances.insert(spender_id.clone(), current);
            account.total_allowances = previous_total;
            return Err(e);
        }

        tracing::debug!(owner = %account.id, spender = %spender_id, %remaining, "Allowance reduced");
        Ok(remaining)
    }

    /// Set an account's balance from the token's remaining supply
    ///
    /// Overwrites the balance (see [`Ledger::set_balance`]) and decrements
    /// the remaining supply by `amount`. The account is persisted before the
    /// token; if the token write fails the error is returned and the balance
    /// write stands.
    pub fn mint(&self, token_id: &str, account_id: &AccountId, amount: Decimal) -> Result<()> {
        ensure_non_negative(amount, "mint amount")?;

        let mut token = self.get_token(token_id)?;
        if amount > token.remaining_supply {
            tracing::warn!(token = token_id, %amount, remaining = %token.remaining_supply, "Mint exceeds supply");
            return Err(Error::SupplyExceeded {
                token: token_id.to_string(),
                requested: amount,
                remaining: token.remaining_supply,
            });
        }

        let mut account = self.get_account(account_id)?;
        self.set_balance(&mut account, amount)?;

        token.remaining_supply -= amount;
        if let Err(e) = self.put_token(&token) {
            tracing::error!(
                token = token_id,
                account = %account_id,
                %amount,
                error = %e,
                "Balance set but token supply not updated"
            );
            return Err(e);
        }

        self.metrics.mints.inc();
        self.emit(LedgerEvent::SetAccountBalance {
            to: account_id.clone(),
            value: amount,
        });

        tracing::info!(token = token_id, account = %account_id, %amount, "Minted");
        Ok(())
    }

    // Compensations

    fn credit(&self, account_id: &AccountId, amount: Decimal) -> Result<()> {
        let mut account = self.get_account(account_id)?;
        self.add_funds(&mut account, amount).map(|_| ())
    }

    fn refund_allowance(&self, owner_id: &AccountId, spender_id: &AccountId, amount: Decimal) -> Result<()> {
        let mut owner = self.get_account(owner_id)?;
        let restored = checked_add(owner.allowance_for(spender_id), amount, "allowance")?;
        let total = checked_add(owner.total_allowances, amount, "total allowances")?;
        owner.allowances.insert(spender_id.clone(), restored);
        owner.total_allowances = total;
        self.put_account(&owner)
    }

    fn emit(&self, event: LedgerEvent) {
        self.events.emit(&EventEnvelope::new(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::storage::{FaultInjectingStore, MemoryStore, StoreOp};

    fn id(s: &str) -> AccountId {
        AccountId::new(s)
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(Arc::new(MemoryStore::new())).unwrap()
    }

    /// Ledger with funded accounts, balances written directly
    fn seeded<S: StateStore + ?Sized>(ledger: &Ledger<S>, accounts: &[(&str, i64)]) {
        for (name, balance) in accounts {
            let mut account = ledger.create_account(&id(name), name).unwrap();
            account.balance = dec(*balance);
            ledger.put_account(&account).unwrap();
        }
    }

    #[test]
    fn test_create_account_starts_empty() {
        let ledger = ledger();
        let account = ledger.create_account(&id("u1"), "alice").unwrap();
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(ledger.get_account(&id("u1")).unwrap(), account);
        assert_eq!(ledger.metrics().accounts_created.get(), 1);
    }

    #[test]
    fn test_create_account_twice() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 40)]);

        let err = ledger.create_account(&id("u1"), "mallory").unwrap_err();
        assert!(err.is_already_exists());

        let account = ledger.get_account(&id("u1")).unwrap();
        assert_eq!(account.balance, dec(40));
        assert_eq!(account.owner, "u1");
    }

    #[test]
    fn test_create_token() {
        let ledger = ledger();
        let token = ledger.create_token("dmp", dec(500)).unwrap();
        assert_eq!(token.remaining_supply, dec(500));
        assert_eq!(ledger.total_supply("dmp").unwrap(), dec(500));
        assert_eq!(ledger.available_supply("dmp").unwrap(), dec(500));

        assert!(ledger.create_token("dmp", dec(1)).unwrap_err().is_already_exists());
        assert!(matches!(
            ledger.create_token("neg", dec(-1)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(ledger.get_token("neg").unwrap_err().is_not_found());
    }

    #[test]
    fn test_token_id_collision_with_account() {
        let ledger = ledger();
        seeded(&ledger, &[("shared", 0)]);
        assert!(matches!(ledger.get_token("shared"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_approve_replaces_previous_allowance() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100), ("u2", 0)]);

        ledger.approve(&id("u1"), &id("u2"), dec(70)).unwrap();
        assert_eq!(ledger.get_account(&id("u1")).unwrap().total_allowances, dec(70));

        ledger.approve(&id("u1"), &id("u2"), dec(50)).unwrap();
        let owner = ledger.get_account(&id("u1")).unwrap();
        assert_eq!(ledger.allowance(&id("u1"), &id("u2")).unwrap(), dec(50));
        assert_eq!(owner.total_allowances, dec(50));
        assert!(owner.allowances_consistent());
    }

    #[test]
    fn test_approve_insufficient_funds() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100), ("u2", 0), ("u3", 0)]);

        ledger.approve(&id("u1"), &id("u2"), dec(90)).unwrap();
        let err = ledger.approve(&id("u1"), &id("u3"), dec(15)).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        let owner = ledger.get_account(&id("u1")).unwrap();
        assert_eq!(owner.total_allowances, dec(90));
        assert!(!owner.allowances.contains_key(&id("u3")));
    }

    #[test]
    fn test_approve_overflow_is_rejected() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100), ("u2", 0), ("u3", 0)]);
        ledger.approve(&id("u1"), &id("u2"), dec(10)).unwrap();
        let before = ledger.get_account(&id("u1")).unwrap();

        let err = ledger.approve(&id("u1"), &id("u3"), Decimal::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(ledger.get_account(&id("u1")).unwrap(), before);
    }

    #[test]
    fn test_approve_requires_both_accounts() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100)]);

        assert!(ledger.approve(&id("u1"), &id("ghost"), dec(1)).unwrap_err().is_not_found());
        assert!(ledger.approve(&id("ghost"), &id("u1"), dec(1)).unwrap_err().is_not_found());
        assert!(matches!(
            ledger.approve(&id("u1"), &id("u1"), dec(-1)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_approve_zero_keeps_entry() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100), ("u2", 0)]);

        ledger.approve(&id("u1"), &id("u2"), dec(20)).unwrap();
        ledger.approve(&id("u1"), &id("u2"), Decimal::ZERO).unwrap();

        let owner = ledger.get_account(&id("u1")).unwrap();
        assert_eq!(owner.allowances.get(&id("u2")), Some(&Decimal::ZERO));
        assert_eq!(owner.total_allowances, Decimal::ZERO);
        assert_eq!(ledger.allowance_entry(&id("u1"), &id("u2")).unwrap(), Some(Decimal::ZERO));
    }

    #[test]
    fn test_allowance_defaults_to_zero() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100)]);

        assert_eq!(ledger.allowance(&id("u1"), &id("nobody")).unwrap(), Decimal::ZERO);
        assert!(ledger.allowance(&id("ghost"), &id("u1")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_restore_allowance() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100), ("u2", 0), ("u3", 0)]);
        ledger.approve(&id("u1"), &id("u3"), dec(10)).unwrap();
        ledger.approve(&id("u1"), &id("u2"), dec(30)).unwrap();

        ledger.approve(&id("u1"), &id("u2"), dec(60)).unwrap();
        ledger.restore_allowance(&id("u1"), &id("u2"), Some(dec(30))).unwrap();
        let owner = ledger.get_account(&id("u1")).unwrap();
        assert_eq!(owner.allowance_for(&id("u2")), dec(30));
        assert_eq!(owner.total_allowances, dec(40));

        ledger.restore_allowance(&id("u1"), &id("u2"), None).unwrap();
        let owner = ledger.get_account(&id("u1")).unwrap();
        assert!(!owner.allowances.contains_key(&id("u2")));
        assert_eq!(owner.total_allowances, dec(10));
        assert!(owner.allowances_consistent());
    }

    #[test]
    fn test_transfer_from_mechanics() {
        let ledger = ledger();
        seeded(&ledger, &[("source", 1000), ("dest", 5)]);
        ledger.approve(&id("source"), &id("dest"), dec(500)).unwrap();

        ledger.transfer_from(&id("source"), &id("dest"), dec(100)).unwrap();

        let source = ledger.get_account(&id("source")).unwrap();
        assert_eq!(source.balance, dec(900));
        assert_eq!(source.allowance_for(&id("dest")), dec(400));
        assert_eq!(source.total_allowances, dec(400));
        assert_eq!(ledger.balance_of(&id("dest")).unwrap(), dec(105));
    }

    #[test]
    fn test_transfer_exhausting_allowance_removes_entry() {
        let ledger = ledger();
        seeded(&ledger, &[("source", 50), ("dest", 0)]);
        ledger.approve(&id("source"), &id("dest"), dec(20)).unwrap();

        ledger.transfer_from(&id("source"), &id("dest"), dec(20)).unwrap();

        let source = ledger.get_account(&id("source")).unwrap();
        assert!(source.allowances.is_empty());
        assert_eq!(source.total_allowances, Decimal::ZERO);
    }

    #[test]
    fn test_transfer_over_allowance_changes_nothing() {
        let ledger = ledger();
        seeded(&ledger, &[("source", 1000), ("dest", 0)]);
        ledger.approve(&id("source"), &id("dest"), dec(50)).unwrap();
        let before = ledger.get_account(&id("source")).unwrap();

        let err = ledger.transfer_from(&id("source"), &id("dest"), dec(51)).unwrap_err();
        assert!(matches!(err, Error::InsufficientAllowance { .. }));
        assert_eq!(ledger.get_account(&id("source")).unwrap(), before);
        assert_eq!(ledger.balance_of(&id("dest")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_transfer_insufficient_balance_changes_nothing() {
        let ledger = ledger();
        seeded(&ledger, &[("source", 100), ("dest", 0)]);
        ledger.approve(&id("source"), &id("dest"), dec(80)).unwrap();

        // Balance drained behind the allowance's back
        let mut source = ledger.get_account(&id("source")).unwrap();
        source.balance = dec(10);
        ledger.put_account(&source).unwrap();

        let err = ledger.transfer_from(&id("source"), &id("dest"), dec(50)).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(ledger.get_account(&id("source")).unwrap(), source);
        assert_eq!(ledger.balance_of(&id("dest")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_transfer_to_self() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100)]);
        ledger.approve(&id("u1"), &id("u1"), dec(40)).unwrap();

        ledger.transfer_from(&id("u1"), &id("u1"), dec(40)).unwrap();

        let account = ledger.get_account(&id("u1")).unwrap();
        assert_eq!(account.balance, dec(100));
        assert!(account.allowances.is_empty());
        assert_eq!(account.total_allowances, Decimal::ZERO);
    }

    #[test]
    fn test_transfer_emits_event() {
        let sink = Arc::new(RecordingSink::new());
        let ledger = ledger().with_event_sink(sink.clone());
        seeded(&ledger, &[("source", 10), ("dest", 0)]);
        ledger.approve(&id("source"), &id("dest"), dec(2)).unwrap();

        ledger.transfer_from(&id("source"), &id("dest"), dec(2)).unwrap();

        assert_eq!(
            sink.events(),
            vec![LedgerEvent::TransferFrom {
                from: id("source"),
                to: id("dest"),
                value: dec(2),
            }]
        );
        assert_eq!(ledger.metrics().transfers.get(), 1);
    }

    fn faulty_ledger() -> (Arc<FaultInjectingStore<MemoryStore>>, Ledger<FaultInjectingStore<MemoryStore>>) {
        let store = Arc::new(FaultInjectingStore::new(MemoryStore::new()));
        let ledger = Ledger::new(store.clone()).unwrap();
        seeded(&ledger, &[("source", 1000), ("dest", 0)]);
        ledger.approve(&id("source"), &id("dest"), dec(500)).unwrap();
        (store, ledger)
    }

    #[test]
    fn test_transfer_debit_failure_changes_nothing() {
        let (store, ledger) = faulty_ledger();
        store.fail_once(StoreOp::Put, "source", 0);

        let err = ledger.transfer_from(&id("source"), &id("dest"), dec(100)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let source = ledger.get_account(&id("source")).unwrap();
        assert_eq!(source.balance, dec(1000));
        assert_eq!(source.allowance_for(&id("dest")), dec(500));
        assert_eq!(ledger.metrics().compensations.get(), 0);
    }

    #[test]
    fn test_transfer_allowance_failure_recredits_source() {
        let (store, ledger) = faulty_ledger();
        // First source write (debit) succeeds, second (allowance) fails
        store.fail_once(StoreOp::Put, "source", 1);

        let err = ledger.transfer_from(&id("source"), &id("dest"), dec(100)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let source = ledger.get_account(&id("source")).unwrap();
        assert_eq!(source.balance, dec(1000));
        assert_eq!(source.allowance_for(&id("dest")), dec(500));
        assert_eq!(source.total_allowances, dec(500));
        assert_eq!(ledger.balance_of(&id("dest")).unwrap(), Decimal::ZERO);
        assert_eq!(ledger.metrics().compensations.get(), 1);
    }

    #[test]
    fn test_transfer_credit_failure_rolls_back_source() {
        let (store, ledger) = faulty_ledger();
        store.fail_once(StoreOp::Put, "dest", 0);

        let err = ledger.transfer_from(&id("source"), &id("dest"), dec(100)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let source = ledger.get_account(&id("source")).unwrap();
        assert_eq!(source.balance, dec(1000));
        assert_eq!(source.allowance_for(&id("dest")), dec(500));
        assert!(source.allowances_consistent());
        assert_eq!(ledger.balance_of(&id("dest")).unwrap(), Decimal::ZERO);
        assert_eq!(ledger.metrics().compensations.get(), 2);
    }

    #[test]
    fn test_transfer_failed_compensation_is_not_retried() {
        let (store, ledger) = faulty_ledger();
        store.fail_once(StoreOp::Put, "dest", 0);
        // Debit succeeds, allowance reduction succeeds, every later source write fails
        store.fail_always(StoreOp::Put, "source", 2);

        let err = ledger.transfer_from(&id("source"), &id("dest"), dec(100)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        // Known risk: funds left debited from the source, nothing credited
        store.clear_faults();
        let source = ledger.get_account(&id("source")).unwrap();
        assert_eq!(source.balance, dec(900));
        assert_eq!(source.allowance_for(&id("dest")), dec(400));
        assert_eq!(ledger.balance_of(&id("dest")).unwrap(), Decimal::ZERO);
        assert_eq!(ledger.metrics().compensation_failures.get(), 2);
    }

    #[test]
    fn test_retrieve_and_add_funds_are_additive() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 10)]);
        let mut account = ledger.get_account(&id("u1")).unwrap();

        assert_eq!(ledger.add_funds(&mut account, dec(5)).unwrap(), dec(15));
        assert_eq!(ledger.retrieve_funds(&mut account, dec(15)).unwrap(), Decimal::ZERO);
        assert!(matches!(
            ledger.retrieve_funds(&mut account, dec(1)),
            Err(Error::InsufficientFunds { .. })
        ));
        assert_eq!(ledger.balance_of(&id("u1")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_add_funds_overflow_is_rejected() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 100)]);
        let mut account = ledger.get_account(&id("u1")).unwrap();

        let err = ledger.add_funds(&mut account, Decimal::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(account.balance, dec(100));
        assert_eq!(ledger.balance_of(&id("u1")).unwrap(), dec(100));
    }

    #[test]
    fn test_transfer_overflowing_destination_rolls_back() {
        let ledger = ledger();
        seeded(&ledger, &[("source", 10), ("dest", 0)]);
        ledger.approve(&id("source"), &id("dest"), dec(10)).unwrap();

        let mut dest = ledger.get_account(&id("dest")).unwrap();
        dest.balance = Decimal::MAX;
        ledger.put_account(&dest).unwrap();

        let err = ledger.transfer_from(&id("source"), &id("dest"), dec(10)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let source = ledger.get_account(&id("source")).unwrap();
        assert_eq!(source.balance, dec(10));
        assert_eq!(source.allowance_for(&id("dest")), dec(10));
        assert!(source.allowances_consistent());
        assert_eq!(ledger.balance_of(&id("dest")).unwrap(), Decimal::MAX);
    }

    #[test]
    fn test_reduce_allowance_absent_entry_is_noop() {
        let ledger = ledger();
        seeded(&ledger, &[("u1", 10)]);
        let mut account = ledger.get_account(&id("u1")).unwrap();

        let remaining = ledger.reduce_allowance(&mut account, &id("u2"), dec(3)).unwrap();
        assert_eq!(remaining, Decimal::ZERO);
        assert_eq!(account.total_allowances, Decimal::ZERO);
    }

    #[test]
    fn test_mint_overwrites_balance() {
        let sink = Arc::new(RecordingSink::new());
        let ledger = ledger().with_event_sink(sink.clone());
        ledger.create_token("dmp", dec(100)).unwrap();
        seeded(&ledger, &[("u1", 50)]);

        ledger.mint("dmp", &id("u1"), dec(10)).unwrap();

        assert_eq!(ledger.balance_of(&id("u1")).unwrap(), dec(10));
        assert_eq!(ledger.available_supply("dmp").unwrap(), dec(90));
        assert_eq!(ledger.total_supply("dmp").unwrap(), dec(100));
        assert_eq!(
            sink.events(),
            vec![LedgerEvent::SetAccountBalance {
                to: id("u1"),
                value: dec(10),
            }]
        );
    }

    #[test]
    fn test_mint_supply_exceeded() {
        let ledger = ledger();
        ledger.create_token("dmp", dec(5)).unwrap();
        seeded(&ledger, &[("u1", 0)]);

        let err = ledger.mint("dmp", &id("u1"), dec(6)).unwrap_err();
        assert!(matches!(err, Error::SupplyExceeded { .. }));
        assert_eq!(ledger.balance_of(&id("u1")).unwrap(), Decimal::ZERO);
        assert_eq!(ledger.available_supply("dmp").unwrap(), dec(5));
    }

    #[test]
    fn test_mint_token_write_failure_is_not_rolled_back() {
        let store = Arc::new(FaultInjectingStore::new(MemoryStore::new()));
        let ledger = Ledger::new(store.clone()).unwrap();
        ledger.create_token("dmp", dec(100)).unwrap();
        seeded(&ledger, &[("u1", 0)]);
        store.fail_once(StoreOp::Put, "dmp", 0);

        let err = ledger.mint("dmp", &id("u1"), dec(30)).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        assert_eq!(ledger.balance_of(&id("u1")).unwrap(), dec(30));
        assert_eq!(ledger.available_supply("dmp").unwrap(), dec(100));
        assert_eq!(ledger.metrics().mints.get(), 0);
    }
}
