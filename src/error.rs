use rust_decimal::Decimal;
use std::convert::Infallible;
use std::fmt;

/// Which side of an operation an account identifier was supplied for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Account,
    Source,
    Destination,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::Account => write!(f, "Account"),
            AccountRole::Source => write!(f, "Source account"),
            AccountRole::Destination => write!(f, "Destination account"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BankError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{role} not found: {account_number}")]
    NotFound {
        role: AccountRole,
        account_number: String,
    },
    #[error("Account number already exists: {0}")]
    AlreadyExists(String),
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error("{0} was not provided")]
    NullReference(AccountRole),
    #[error("Transfer of {amount} from {from} to {to} left the ledger inconsistent: {cause}")]
    TransferIncomplete {
        from: String,
        to: String,
        amount: Decimal,
        #[source]
        cause: StorageError,
    },
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl BankError {
    pub(crate) fn not_found(role: AccountRole, account_number: &str) -> Self {
        BankError::NotFound {
            role,
            account_number: account_number.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("failed to encode row: {0}")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
    #[error("failed to decode row: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("no account row for {0}")]
    MissingAccount(String),
}

pub type BankResult<T> = Result<T, BankError>;
