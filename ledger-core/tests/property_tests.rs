//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Allowance bookkeeping: total_allowances == Σ(allowances)
//! - Money conservation: transfers never create or destroy balance
//! - No negative balances
//! - Rejected transfers leave every record untouched

use datamarket_ledger::{Account, AccountId, Error, Ledger, MemoryStore};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const ACCOUNTS: [&str; 3] = ["alice", "bob", "carol"];

/// Operations applied against the ledger
#[derive(Debug, Clone)]
enum Op {
    Approve { owner: usize, spender: usize, amount: Decimal },
    Transfer { source: usize, destination: usize, amount: Decimal },
}

/// Strategy for generating amounts (two decimal places)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..50_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ACCOUNTS.len(), 0..ACCOUNTS.len(), amount_strategy())
            .prop_map(|(owner, spender, amount)| Op::Approve { owner, spender, amount }),
        (0..ACCOUNTS.len(), 0..ACCOUNTS.len(), amount_strategy())
            .prop_map(|(source, destination, amount)| Op::Transfer { source, destination, amount }),
    ]
}

/// Ledger with three accounts funded directly
fn create_test_ledger(balances: [i64; 3]) -> Ledger<MemoryStore> {
    let ledger = Ledger::new(Arc::new(MemoryStore::new())).unwrap();
    for (name, balance) in ACCOUNTS.iter().zip(balances) {
        let mut account = ledger.create_account(&AccountId::new(*name), *name).unwrap();
        account.balance = Decimal::from(balance);
        ledger.put_account(&account).unwrap();
    }
    ledger
}

fn snapshot(ledger: &Ledger<MemoryStore>) -> Vec<Account> {
    ACCOUNTS
        .iter()
        .map(|name| ledger.get_account(&AccountId::new(*name)).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: invariants hold after any sequence of approvals and transfers
    #[test]
    fn prop_invariants_hold(
        balances in prop::array::uniform3(0i64..1_000),
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let ledger = create_test_ledger(balances);
        let total: Decimal = balances.iter().copied().map(Decimal::from).sum();

        for op in ops {
            // Rejections are expected; invariants must hold either way
            let _ = match op {
                Op::Approve { owner, spender, amount } => ledger.approve(
                    &AccountId::new(ACCOUNTS[owner]),
                    &AccountId::new(ACCOUNTS[spender]),
                    amount,
                ),
                Op::Transfer { source, destination, amount } => ledger.transfer_from(
                    &AccountId::new(ACCOUNTS[source]),
                    &AccountId::new(ACCOUNTS[destination]),
                    amount,
                ),
            };

            let accounts = snapshot(&ledger);
            for account in &accounts {
                prop_assert!(account.allowances_consistent(), "allowance sum broken: {:?}", account);
                prop_assert!(account.balance >= Decimal::ZERO);
            }
            let sum: Decimal = accounts.iter().map(|a| a.balance).sum();
            prop_assert_eq!(sum, total);
        }
    }

    /// Property: a transfer above the allowance changes nothing
    #[test]
    fn prop_over_allowance_transfer_rejected(
        balance in 1i64..1_000,
        allowed in amount_strategy(),
        excess in 1i64..10_000,
    ) {
        let ledger = create_test_ledger([balance.max(600), 0, 0]);
        let (alice, bob) = (AccountId::new("alice"), AccountId::new("bob"));
        ledger.approve(&alice, &bob, allowed).unwrap();
        let before = snapshot(&ledger);

        let result = ledger.transfer_from(&alice, &bob, allowed + Decimal::new(excess, 2));

        let is_insufficient_allowance = matches!(result, Err(Error::InsufficientAllowance { .. }));
        prop_assert!(is_insufficient_allowance);
        prop_assert_eq!(snapshot(&ledger), before);
    }

    /// Property: a transfer within the allowance moves exactly the amount
    #[test]
    fn prop_transfer_moves_exact_amount(
        allowed in amount_strategy(),
        fraction in 0u32..=100,
    ) {
        let ledger = create_test_ledger([600, 7, 0]);
        let (alice, bob) = (AccountId::new("alice"), AccountId::new("bob"));
        ledger.approve(&alice, &bob, allowed).unwrap();

        let amount = (allowed * Decimal::from(fraction) / Decimal::from(100)).round_dp(2);
        ledger.transfer_from(&alice, &bob, amount).unwrap();

        prop_assert_eq!(ledger.balance_of(&alice).unwrap(), Decimal::from(600) - amount);
        prop_assert_eq!(ledger.balance_of(&bob).unwrap(), Decimal::from(7) + amount);
        prop_assert_eq!(ledger.allowance(&alice, &bob).unwrap(), allowed - amount);
    }
}
