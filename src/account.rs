//! Account entity and its transaction log
use super::error::{BankError, BankResult};
use super::types::TimeStamp;
use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    #[n(0)]
    Deposit,
    #[n(1)]
    Withdrawal,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "DEPOSIT"),
            TransactionKind::Withdrawal => write!(f, "WITHDRAWAL"),
        }
    }
}

/// One balance-changing event. Records are never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    kind: TransactionKind,
    amount: Decimal,
    timestamp: TimeStamp<Utc>,
}

impl TransactionRecord {
    pub(crate) fn new(kind: TransactionKind, amount: Decimal, timestamp: TimeStamp<Utc>) -> Self {
        Self {
            kind,
            amount,
            timestamp,
        }
    }
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }
    pub fn amount(&self) -> Decimal {
        self.amount
    }
    pub fn timestamp(&self) -> &TimeStamp<Utc> {
        &self.timestamp
    }
}

/// Keeps `result` only if no fractional digits were rounded away.
///
/// `Decimal` silently drops scale when the exact sum does not fit its 96-bit
/// mantissa, so a result with less scale than either operand is inexact.
fn exact(result: Option<Decimal>, lhs: Decimal, rhs: Decimal) -> Option<Decimal> {
    result.filter(|r| r.scale() >= lhs.scale().max(rhs.scale()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    account_number: String,
    holder_name: String,
    balance: Decimal,
    transactions: Vec<TransactionRecord>, // oldest first
}

impl Account {
    /// Open an account with a starting balance. The starting balance is not
    /// recorded as a transaction.
    pub fn new(
        account_number: impl Into<String>,
        holder_name: impl Into<String>,
        initial_balance: Decimal,
    ) -> BankResult<Self> {
        if initial_balance < Decimal::ZERO {
            return Err(BankError::InvalidArgument(
                "Initial balance cannot be negative".into(),
            ));
        }

        Ok(Self {
            account_number: account_number.into(),
            holder_name: holder_name.into(),
            balance: initial_balance,
            transactions: vec![],
        })
    }

    /// Rebuild an account from persisted state without re-running validation.
    pub(crate) fn restore(
        account_number: String,
        holder_name: String,
        balance: Decimal,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        Self {
            account_number,
            holder_name,
            balance,
            transactions,
        }
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }
    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }
    pub fn balance(&self) -> Decimal {
        self.balance
    }
    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn deposit(&mut self, amount: Decimal) -> BankResult<&TransactionRecord> {
        if amount <= Decimal::ZERO {
            return Err(BankError::InvalidArgument(
                "Deposit amount must be positive".into(),
            ));
        }
        let balance = exact(self.balance.checked_add(amount), self.balance, amount).ok_or_else(
            || {
                BankError::InvalidArgument(
                    "Deposit cannot be applied exactly to the account balance".into(),
                )
            },
        )?;

        self.balance = balance;
        Ok(self.record(TransactionKind::Deposit, amount))
    }

    pub fn withdraw(&mut self, amount: Decimal) -> BankResult<&TransactionRecord> {
        if amount <= Decimal::ZERO {
            return Err(BankError::InvalidArgument(
                "Withdrawal amount must be positive".into(),
            ));
        }
        if amount > self.balance {
            return Err(BankError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }

        let balance = exact(self.balance.checked_sub(amount), self.balance, amount).ok_or_else(
            || {
                BankError::InvalidArgument(
                    "Withdrawal cannot be applied exactly to the account balance".into(),
                )
            },
        )?;

        self.balance = balance;
        Ok(self.record(TransactionKind::Withdrawal, amount))
    }

    fn record(&mut self, kind: TransactionKind, amount: Decimal) -> &TransactionRecord {
        // clock may step backwards; the log must not
        let mut timestamp = TimeStamp::new();
        if let Some(last) = self.transactions.last() {
            if last.timestamp > timestamp {
                timestamp = last.timestamp.clone();
            }
        }

        self.transactions
            .push(TransactionRecord::new(kind, amount, timestamp));
        &self.transactions[self.transactions.len() - 1]
    }
}
