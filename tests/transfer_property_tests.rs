//! Property-based tests for transfers through the service
//!
//! Transfers run against the in-memory store. Money is neither created nor
//! destroyed by a transfer, whether it succeeds or is rejected, and each
//! successful transfer leaves exactly one record on either side.

use bank_ledger::{
    account::TransactionKind, error::BankError, service::AccountService, store::MemoryStore,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const ACCOUNTS: [&str; 3] = ["ACC1", "ACC2", "ACC3"];

/// Strategy to generate (from, to, amount) with arbitrary, possibly equal, endpoints
fn transfer_strategy() -> impl Strategy<Value = (usize, usize, Decimal)> {
    (0usize..3, 0usize..3, (0i64..=20_000, 0u32..=2))
        .prop_map(|(from, to, (mantissa, scale))| (from, to, Decimal::new(mantissa, scale)))
}

fn total(service: &AccountService<MemoryStore>) -> Decimal {
    ACCOUNTS
        .iter()
        .map(|n| service.get_balance(n).unwrap())
        .sum()
}

proptest! {
    /// Property: the sum of all balances is invariant under any transfer sequence
    #[test]
    fn prop_transfers_conserve_money(
        balances in prop::collection::vec(0i64..=10_000, 3),
        transfers in prop::collection::vec(transfer_strategy(), 0..30),
    ) {
        let service = AccountService::new(Arc::new(MemoryStore::new()));
        for (number, balance) in ACCOUNTS.iter().zip(&balances) {
            service.create_account(number, "Holder", Decimal::from(*balance)).unwrap();
        }
        let expected_total = total(&service);

        for (from, to, amount) in transfers {
            let (from, to) = (ACCOUNTS[from], ACCOUNTS[to]);
            let before = (service.get_balance(from).unwrap(), service.get_balance(to).unwrap());
            let history_len = (
                service.get_transaction_history(from).unwrap().len(),
                service.get_transaction_history(to).unwrap().len(),
            );

            let result = service.transfer(from, to, amount);
            let after = (service.get_balance(from).unwrap(), service.get_balance(to).unwrap());

            match result {
                Ok(()) => {
                    prop_assert_eq!(before.0 + before.1, after.0 + after.1);
                    prop_assert_eq!(after.0, before.0 - amount);

                    let source_log = service.get_transaction_history(from).unwrap();
                    let destination_log = service.get_transaction_history(to).unwrap();
                    prop_assert_eq!(source_log.len(), history_len.0 + 1);
                    prop_assert_eq!(destination_log.len(), history_len.1 + 1);
                    prop_assert_eq!(source_log[history_len.0].kind(), TransactionKind::Withdrawal);
                    prop_assert_eq!(destination_log[history_len.1].kind(), TransactionKind::Deposit);
                }
                Err(BankError::InvalidArgument(_)) | Err(BankError::InsufficientBalance { .. }) => {
                    prop_assert_eq!(before, after);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }

            prop_assert_eq!(total(&service), expected_total);
        }
    }

    /// Property: transferring to the same account always fails and never mutates it
    #[test]
    fn prop_same_account_transfer_fails(index in 0usize..3, mantissa in 0i64..=1_000_000) {
        let service = AccountService::new(Arc::new(MemoryStore::new()));
        for number in ACCOUNTS {
            service.create_account(number, "Holder", Decimal::from(100)).unwrap();
        }
        let number = ACCOUNTS[index];

        let err = service.transfer(number, number, Decimal::new(mantissa, 2)).unwrap_err();

        let is_invalid = matches!(err, BankError::InvalidArgument(_));
        prop_assert!(is_invalid);
        prop_assert_eq!(service.get_balance(number).unwrap(), Decimal::from(100));
        prop_assert!(service.get_transaction_history(number).unwrap().is_empty());
    }
}
