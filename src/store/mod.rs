//! Persistence boundary for accounts and their transaction logs
pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::account::{Account, TransactionRecord};
use crate::error::StorageError;

/// Durable owner of account state.
///
/// `save` upserts the identity fields and balance only. Transaction records
/// are persisted separately through `append_transaction`, each ordered after
/// every record previously appended for the same account.
pub trait AccountStore: Send + Sync {
    fn find_by_number(&self, account_number: &str) -> Result<Option<Account>, StorageError>;

    fn save(&self, account: &Account) -> Result<(), StorageError>;

    fn append_transaction(
        &self,
        account_number: &str,
        record: &TransactionRecord,
    ) -> Result<(), StorageError>;

    /// Wipe every account and transaction.
    fn clear_all(&self) -> Result<(), StorageError>;

    /// Persist a unit of work. Backends that can write all of it atomically
    /// should override this; the default performs the writes one at a time
    /// and reports a failure after the first write as partial.
    fn commit(&self, work: &UnitOfWork) -> Result<(), CommitError> {
        let mut writes = 0usize;
        let fail = |writes: usize, cause| CommitError {
            partial: writes > 0,
            cause,
        };

        for mutation in work.mutations() {
            let number = mutation.account.account_number();
            // Save the account row, then append its records
            self.save(&mutation.account).map_err(|e| fail(writes, e))?;
            writes += 1;
            for record in &mutation.records {
                self.append_transaction(number, record)
                    .map_err(|e| fail(writes, e))?;
                writes += 1;
            }
        }
        Ok(())
    }
}

/// Snapshot of one account after a mutation, with the records that mutation produced.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub account: Account,
    pub records: Vec<TransactionRecord>,
}

/// Ordered set of account mutations that belong to one logical operation.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    mutations: Vec<Mutation>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn record(mut self, account: Account, records: Vec<TransactionRecord>) -> Self {
        self.mutations.push(Mutation { account, records });
        self
    }
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }
}

/// A failed commit. `partial` is set when some, but not all, of the unit's
/// writes were performed before the failure.
#[derive(thiserror::Error, Debug)]
#[error("commit failed (partial write: {partial}): {cause}")]
pub struct CommitError {
    pub partial: bool,
    #[source]
    pub cause: StorageError,
}

impl CommitError {
    /// A failure that left the store as it was, or wrote the unit in full.
    pub fn whole(cause: StorageError) -> Self {
        Self {
            partial: false,
            cause,
        }
    }
}
