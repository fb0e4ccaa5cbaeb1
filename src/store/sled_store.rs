//! sled-backed store
//!
//! Everything lives in the default tree:
//!
//! - `acct:<number>` holds the account row
//! - `txn:<len><number><seq>` holds one transaction row, where `len` is the
//!   big-endian u32 byte length of the number and `seq` a big-endian u64 from
//!   `Db::generate_id`, so a prefix scan yields one account's log in append order.
use super::{AccountStore, CommitError, UnitOfWork};
use crate::account::{Account, TransactionKind, TransactionRecord};
use crate::config::BankConfig;
use crate::error::StorageError;
use crate::types::TimeStamp;
use chrono::Utc;
use rust_decimal::Decimal;
use sled::{Batch, Db};
use std::sync::Arc;

const ACCOUNT_PREFIX: &[u8] = b"acct:";
const TRANSACTION_PREFIX: &[u8] = b"txn:";

#[derive(minicbor::Encode, minicbor::Decode, Debug)]
struct AccountRow {
    #[n(0)]
    account_number: String,
    #[n(1)]
    holder_name: String,
    #[n(2)]
    balance: [u8; 16], // Decimal::serialize
}

#[derive(minicbor::Encode, minicbor::Decode, Debug)]
struct TransactionRow {
    #[n(0)]
    kind: TransactionKind,
    #[n(1)]
    amount: [u8; 16],
    #[n(2)]
    timestamp: TimeStamp<Utc>,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        Self {
            account_number: account.account_number().to_string(),
            holder_name: account.holder_name().to_string(),
            balance: account.balance().serialize(),
        }
    }
}

impl From<&TransactionRecord> for TransactionRow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            kind: record.kind(),
            amount: record.amount().serialize(),
            timestamp: record.timestamp().clone(),
        }
    }
}

impl From<TransactionRow> for TransactionRecord {
    fn from(row: TransactionRow) -> Self {
        TransactionRecord::new(row.kind, Decimal::deserialize(row.amount), row.timestamp)
    }
}

fn account_key(account_number: &str) -> Vec<u8> {
    [ACCOUNT_PREFIX, account_number.as_bytes()].concat()
}

fn transaction_prefix(account_number: &str) -> Vec<u8> {
    let len = account_number.len() as u32;
    [
        TRANSACTION_PREFIX,
        &len.to_be_bytes()[..],
        account_number.as_bytes(),
    ]
    .concat()
}

fn transaction_key(account_number: &str, seq: u64) -> Vec<u8> {
    let mut key = transaction_prefix(account_number);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn encode<T: minicbor::Encode<()>>(row: &T) -> Result<Vec<u8>, StorageError> {
    Ok(minicbor::to_vec(row)?)
}

pub struct SledStore {
    instance: Arc<Db>,
    sync_writes: bool,
}

impl SledStore {
    pub fn new(instance: Arc<Db>) -> Self {
        Self {
            instance,
            sync_writes: false,
        }
    }

    /// Open (or create) the database described by `config`.
    pub fn open(config: &BankConfig) -> Result<Self, StorageError> {
        let db = config.sled_config().open()?;
        tracing::debug!(path = %config.db_path.display(), temporary = config.temporary, "opened sled store");

        Ok(Self {
            instance: Arc::new(db),
            sync_writes: config.sync_writes,
        })
    }

    fn contains_account(&self, account_number: &str) -> Result<bool, StorageError> {
        Ok(self.instance.contains_key(account_key(account_number))?)
    }

    fn flush_if_required(&self) -> Result<(), StorageError> {
        if self.sync_writes {
            self.instance.flush()?;
        }
        Ok(())
    }

    fn load_transactions(&self, account_number: &str) -> Result<Vec<TransactionRecord>, StorageError> {
        self.instance
            .scan_prefix(transaction_prefix(account_number))
            .values()
            .map(|value| -> Result<TransactionRecord, StorageError> {
                let row: TransactionRow = minicbor::decode(&value?)?;
                Ok(row.into())
            })
            .collect()
    }
}

impl AccountStore for SledStore {
    fn find_by_number(&self, account_number: &str) -> Result<Option<Account>, StorageError> {
        let Some(bytes) = self.instance.get(account_key(account_number))? else {
            return Ok(None);
        };
        let row: AccountRow = minicbor::decode(&bytes)?;
        let transactions = self.load_transactions(account_number)?;

        Ok(Some(Account::restore(
            row.account_number,
            row.holder_name,
            Decimal::deserialize(row.balance),
            transactions,
        )))
    }

    fn save(&self, account: &Account) -> Result<(), StorageError> {
        let row = AccountRow::from(account);
        self.instance
            .insert(account_key(account.account_number()), encode(&row)?)?;
        self.flush_if_required()
    }

    fn append_transaction(
        &self,
        account_number: &str,
        record: &TransactionRecord,
    ) -> Result<(), StorageError> {
        // Records only attach to a saved account
        if !self.contains_account(account_number)? {
            return Err(StorageError::MissingAccount(account_number.to_string()));
        }

        // Keys sort by sled's monotonic id, keeping the log in append order
        let seq = self.instance.generate_id()?;
        let row = TransactionRow::from(record);
        self.instance
            .insert(transaction_key(account_number, seq), encode(&row)?)?;
        self.flush_if_required()
    }

    fn clear_all(&self) -> Result<(), StorageError> {
        self.instance.clear()?;
        self.flush_if_required()
    }

    /// Writes every row of the unit in one batch, which sled applies atomically.
    fn commit(&self, work: &UnitOfWork) -> Result<(), CommitError> {
        let stage = || -> Result<Batch, StorageError> {
            let mut batch = Batch::default();
            for mutation in work.mutations() {
                // Account row first, then one row per new record
                let number = mutation.account.account_number();
                batch.insert(
                    account_key(number),
                    encode(&AccountRow::from(&mutation.account))?,
                );
                for record in &mutation.records {
                    let seq = self.instance.generate_id()?;
                    batch.insert(
                        transaction_key(number, seq),
                        encode(&TransactionRow::from(record))?,
                    );
                }
            }
            Ok(batch)
        };

        let batch = stage().map_err(CommitError::whole)?;

        // Save to DB
        self.instance
            .apply_batch(batch)
            .map_err(|e| CommitError::whole(e.into()))?;
        tracing::debug!(mutations = work.mutations().len(), "committed unit of work");

        self.flush_if_required().map_err(CommitError::whole)
    }
}
