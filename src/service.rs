//! Service layer API for account operations
use super::account::{Account, TransactionRecord};
use super::error::{AccountRole, BankError, BankResult};
use super::store::{AccountStore, CommitError, UnitOfWork};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One mutex per account number, handed out on demand. An entry lives only
/// while some caller holds or waits on it.
#[derive(Default)]
struct AccountLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, account_number: &str) -> Arc<Mutex<()>> {
        self.table()
            .entry(account_number.to_string())
            .or_default()
            .clone()
    }

    /// Run `f` holding the lock of every number in `account_numbers`.
    ///
    /// Locks are taken in ascending order so callers locking overlapping sets
    /// cannot deadlock.
    fn with_locked<T>(&self, account_numbers: &[&str], f: impl FnOnce() -> T) -> T {
        let mut ordered = account_numbers.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let slots: Vec<Arc<Mutex<()>>> = ordered.iter().map(|n| self.slot(n)).collect();
        let result = {
            let _guards: Vec<MutexGuard<'_, ()>> = slots.iter().map(|s| hold(s)).collect();
            f()
        };
        drop(slots);

        self.release(&ordered);
        result
    }

    /// Drop the entries nobody else holds a handle to.
    ///
    /// Handles are only cloned under the table lock, so a count of one here
    /// means no caller can be holding or waiting on that slot.
    fn release(&self, account_numbers: &[&str]) {
        let mut table = self.table();
        for number in account_numbers {
            if table
                .get(*number)
                .is_some_and(|slot| Arc::strong_count(slot) == 1)
            {
                table.remove(*number);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().len()
    }
}

fn hold(slot: &Mutex<()>) -> MutexGuard<'_, ()> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AccountService<S: AccountStore> {
    store: Arc<S>,
    locks: AccountLocks,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: AccountLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn load(&self, account_number: &str, role: AccountRole) -> BankResult<Account> {
        self.store
            .find_by_number(account_number)?
            .ok_or_else(|| BankError::not_found(role, account_number))
    }

    fn commit(&self, work: &UnitOfWork) -> BankResult<()> {
        self.store
            .commit(work)
            .map_err(|CommitError { cause, .. }| BankError::Storage(cause))
    }

    /// Open a new account and persist it.
    pub fn create_account(
        &self,
        account_number: &str,
        holder_name: &str,
        initial_balance: Decimal,
    ) -> BankResult<Account> {
        // Validate arguments before touching the store
        if account_number.is_empty() {
            return Err(BankError::InvalidArgument(
                "Account number cannot be empty".into(),
            ));
        }
        if holder_name.is_empty() {
            return Err(BankError::InvalidArgument(
                "Account holder name cannot be empty".into(),
            ));
        }
        if initial_balance < Decimal::ZERO {
            return Err(BankError::InvalidArgument(
                "Initial balance cannot be negative".into(),
            ));
        }

        self.locks.with_locked(&[account_number], || {
            // Check the number is free
            if self.store.find_by_number(account_number)?.is_some() {
                tracing::warn!(account = account_number, "account number already exists");
                return Err(BankError::AlreadyExists(account_number.to_string()));
            }

            // Save to DB
            let account = Account::new(account_number, holder_name, initial_balance)?;
            self.commit(&UnitOfWork::new().record(account.clone(), vec![]))?;

            tracing::info!(account = account_number, balance = %initial_balance, "account created");
            Ok(account)
        })
    }

    pub fn deposit(&self, account_number: &str, amount: Decimal) -> BankResult<()> {
        self.locks.with_locked(&[account_number], || {
            // Load existing account
            let mut account = self.load(account_number, AccountRole::Account)?;

            // Apply the deposit and persist balance with its record
            let record = account.deposit(amount)?.clone();
            self.commit(&UnitOfWork::new().record(account, vec![record]))?;

            tracing::info!(account = account_number, amount = %amount, "deposit applied");
            Ok(())
        })
    }

    pub fn withdraw(&self, account_number: &str, amount: Decimal) -> BankResult<()> {
        self.locks.with_locked(&[account_number], || {
            // Load existing account
            let mut account = self.load(account_number, AccountRole::Account)?;

            // Apply the withdrawal
            let record = match account.withdraw(amount) {
                Ok(record) => record.clone(),
                Err(e) => {
                    tracing::warn!(account = account_number, amount = %amount, error = %e, "withdrawal rejected");
                    return Err(e);
                }
            };

            // Persist balance with its record
            self.commit(&UnitOfWork::new().record(account, vec![record]))?;

            tracing::info!(account = account_number, amount = %amount, "withdrawal applied");
            Ok(())
        })
    }

    /// Move `amount` from one account to another as a single unit of work.
    ///
    /// Either side may be passed as `None`, which is reported as a
    /// `NullReference` for that side before anything else is checked.
    pub fn transfer<'a>(
        &self,
        from: impl Into<Option<&'a str>>,
        to: impl Into<Option<&'a str>>,
        amount: Decimal,
    ) -> BankResult<()> {
        let (from, to): (Option<&str>, Option<&str>) = (from.into(), to.into());
        let from = from.ok_or(BankError::NullReference(AccountRole::Source))?;
        let to = to.ok_or(BankError::NullReference(AccountRole::Destination))?;
        if from == to {
            return Err(BankError::InvalidArgument(
                "Cannot transfer to the same account".into(),
            ));
        }

        self.locks.with_locked(&[from, to], || {
            // Load both sides, source first
            let mut source = self.load(from, AccountRole::Source)?;
            let mut destination = self.load(to, AccountRole::Destination)?;

            // Move the money on the working copies
            let withdrawal = match source.withdraw(amount) {
                Ok(record) => record.clone(),
                Err(e) => {
                    tracing::warn!(from, to, amount = %amount, error = %e, "transfer rejected");
                    return Err(e);
                }
            };
            let deposit = destination.deposit(amount)?.clone();

            // Save both accounts and their records in one unit
            let work = UnitOfWork::new()
                .record(source, vec![withdrawal])
                .record(destination, vec![deposit]);
            match self.store.commit(&work) {
                Ok(()) => {
                    tracing::info!(from, to, amount = %amount, "transfer applied");
                    Ok(())
                }
                Err(CommitError {
                    partial: true,
                    cause,
                }) => {
                    tracing::error!(from, to, amount = %amount, error = %cause, "transfer partially persisted");
                    Err(BankError::TransferIncomplete {
                        from: from.to_string(),
                        to: to.to_string(),
                        amount,
                        cause,
                    })
                }
                Err(CommitError { cause, .. }) => Err(BankError::Storage(cause)),
            }
        })
    }

    pub fn get_balance(&self, account_number: &str) -> BankResult<Decimal> {
        self.locks.with_locked(&[account_number], || {
            Ok(self.load(account_number, AccountRole::Account)?.balance())
        })
    }

    /// Full transaction log for an account, oldest first.
    pub fn get_transaction_history(
        &self,
        account_number: &str,
    ) -> BankResult<Vec<TransactionRecord>> {
        self.locks.with_locked(&[account_number], || {
            let account = self.load(account_number, AccountRole::Account)?;
            Ok(account.transactions().to_vec())
        })
    }
}
