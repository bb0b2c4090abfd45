use thiserror::Error;

use crate::decimal::{Amount, Percent};
use crate::types::{AccountId, LoanId, LoanStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LendingError {
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("invalid percentage: {percent}")]
    InvalidPercentage {
        percent: Percent,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: LoanId,
    },

    #[error("account {caller} is not allowed to {action} loan {id}")]
    Unauthorized {
        id: LoanId,
        caller: AccountId,
        action: &'static str,
    },

    #[error("account {caller} is not the ledger owner")]
    NotOwner {
        caller: AccountId,
    },

    #[error("transaction on loan {id} failed: {reason}")]
    TransactionFailed {
        id: LoanId,
        reason: String,
    },

    #[error("ledger unavailable: {message}")]
    LedgerUnavailable {
        message: String,
    },

    #[error("invalid state for loan {id}: current {current:?}, expected {expected}")]
    InvalidState {
        id: LoanId,
        current: LoanStatus,
        expected: &'static str,
    },

    #[error("operation not supported for {kind} loans")]
    OperationNotSupported {
        kind: &'static str,
    },

    #[error("insufficient value: required {required}, provided {provided}")]
    InsufficientValue {
        required: Amount,
        provided: Amount,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("invalid account: {input}")]
    InvalidAccount {
        input: String,
    },

    #[error("sweep already in progress")]
    SweepInProgress,
}

impl LendingError {
    pub(crate) fn overflow(what: &str) -> Self {
        LendingError::CalculationError {
            message: format!("{} overflows", what),
        }
    }
}

pub type Result<T> = std::result::Result<T, LendingError>;
