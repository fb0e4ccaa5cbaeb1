//! Process-local store, used by tests and scratch sessions
use super::{AccountStore, CommitError, UnitOfWork};
use crate::account::{Account, TransactionRecord};
use crate::error::StorageError;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct StoredAccount {
    holder_name: String,
    balance: Decimal,
    transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<String, StoredAccount>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<String, StoredAccount>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn upsert(accounts: &mut HashMap<String, StoredAccount>, account: &Account) {
    accounts
        .entry(account.account_number().to_string())
        .and_modify(|stored| {
            stored.holder_name = account.holder_name().to_string();
            stored.balance = account.balance();
        })
        .or_insert_with(|| StoredAccount {
            holder_name: account.holder_name().to_string(),
            balance: account.balance(),
            transactions: vec![],
        });
}

fn append(
    accounts: &mut HashMap<String, StoredAccount>,
    account_number: &str,
    record: &TransactionRecord,
) -> Result<(), StorageError> {
    let stored = accounts
        .get_mut(account_number)
        .ok_or_else(|| StorageError::MissingAccount(account_number.to_string()))?;
    stored.transactions.push(record.clone());
    Ok(())
}

impl AccountStore for MemoryStore {
    fn find_by_number(&self, account_number: &str) -> Result<Option<Account>, StorageError> {
        Ok(self.accounts().get(account_number).map(|stored| {
            Account::restore(
                account_number.to_string(),
                stored.holder_name.clone(),
                stored.balance,
                stored.transactions.clone(),
            )
        }))
    }

    fn save(&self, account: &Account) -> Result<(), StorageError> {
        upsert(&mut self.accounts(), account);
        Ok(())
    }

    fn append_transaction(
        &self,
        account_number: &str,
        record: &TransactionRecord,
    ) -> Result<(), StorageError> {
        append(&mut self.accounts(), account_number, record)
    }

    fn clear_all(&self) -> Result<(), StorageError> {
        self.accounts().clear();
        Ok(())
    }

    /// Applies the whole unit in place under a single lock.
    ///
    /// Every mutation upserts its account before appending to it, so the
    /// appends cannot miss and no reader sees a half-applied unit.
    fn commit(&self, work: &UnitOfWork) -> Result<(), CommitError> {
        let mut accounts = self.accounts();

        for mutation in work.mutations() {
            // Save the account row, then append its new records
            upsert(&mut accounts, &mutation.account);
            let stored = accounts
                .get_mut(mutation.account.account_number())
                .ok_or_else(|| {
                    CommitError::whole(StorageError::MissingAccount(
                        mutation.account.account_number().to_string(),
                    ))
                })?;
            stored.transactions.extend(mutation.records.iter().cloned());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn reload_matches_in_memory_state() {
        let store = MemoryStore::new();
        let mut account = Account::new("ACC1", "Alice", dec!(100)).unwrap();
        store.save(&account).unwrap();

        let record = account.deposit(dec!(20)).unwrap().clone();
        store.save(&account).unwrap();
        store.append_transaction("ACC1", &record).unwrap();

        let loaded = store.find_by_number("ACC1").unwrap().unwrap();
        assert_eq!(loaded, account);
    }

    #[test]
    fn save_keeps_previously_appended_records() {
        let store = MemoryStore::new();
        let mut account = Account::new("ACC1", "Alice", dec!(100)).unwrap();
        store.save(&account).unwrap();
        let record = account.withdraw(dec!(1)).unwrap().clone();
        store.append_transaction("ACC1", &record).unwrap();

        let fresh = Account::new("ACC1", "Alice", dec!(99)).unwrap();
        store.save(&fresh).unwrap();

        let loaded = store.find_by_number("ACC1").unwrap().unwrap();
        assert_eq!(loaded.transactions().len(), 1);
        assert_eq!(loaded.balance(), dec!(99));
    }

    #[test]
    fn append_for_unknown_account_fails() {
        let store = MemoryStore::new();
        let mut account = Account::new("ACC1", "Alice", dec!(100)).unwrap();
        let record = account.deposit(dec!(1)).unwrap().clone();

        let err = store.append_transaction("ACC1", &record).unwrap_err();
        assert!(matches!(err, StorageError::MissingAccount(n) if n == "ACC1"));
    }

    #[test]
    fn commit_applies_every_mutation_of_the_unit() {
        let store = MemoryStore::new();
        let mut source = Account::new("ACC1", "Alice", dec!(100)).unwrap();
        let mut destination = Account::new("ACC2", "Bob", dec!(0)).unwrap();
        store
            .commit(&UnitOfWork::new().record(source.clone(), vec![]))
            .unwrap();
        let earlier = source.deposit(dec!(5)).unwrap().clone();
        store.save(&source).unwrap();
        store.append_transaction("ACC1", &earlier).unwrap();

        let withdrawal = source.withdraw(dec!(30)).unwrap().clone();
        let deposit = destination.deposit(dec!(30)).unwrap().clone();
        store
            .commit(
                &UnitOfWork::new()
                    .record(source.clone(), vec![withdrawal])
                    .record(destination.clone(), vec![deposit]),
            )
            .unwrap();

        assert_eq!(store.find_by_number("ACC1").unwrap().unwrap(), source);
        assert_eq!(store.find_by_number("ACC2").unwrap().unwrap(), destination);
        assert_eq!(source.transactions().len(), 2);
    }

    #[test]
    fn many_commits_keep_every_record() {
        let store = MemoryStore::new();
        let mut account = Account::new("ACC1", "Alice", dec!(0)).unwrap();
        store
            .commit(&UnitOfWork::new().record(account.clone(), vec![]))
            .unwrap();

        for _ in 0..1_000 {
            let record = account.deposit(dec!(1)).unwrap().clone();
            store
                .commit(&UnitOfWork::new().record(account.clone(), vec![record]))
                .unwrap();
        }

        let loaded = store.find_by_number("ACC1").unwrap().unwrap();
        assert_eq!(loaded.balance(), dec!(1000));
        assert_eq!(loaded.transactions().len(), 1_000);
        assert_eq!(loaded, account);
    }

    #[test]
    fn clear_all_removes_everything() {
        let store = MemoryStore::new();
        store
            .save(&Account::new("ACC1", "Alice", dec!(1)).unwrap())
            .unwrap();

        store.clear_all().unwrap();

        assert!(store.find_by_number("ACC1").unwrap().is_none());
    }
}
