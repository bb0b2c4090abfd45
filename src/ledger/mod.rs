pub mod memory;

use std::future::Future;

use crate::config::LoanParameters;
use crate::decimal::Amount;
use crate::errors::Result;
use crate::loan::Loan;
use crate::notifications::Subscription;
use crate::types::{AccountId, LoanId};

pub use memory::MemoryLedger;

/// query/transaction boundary to the contract holding the loans
///
/// Every call may suspend and may fail independently of the others. Reads
/// that fail return `LedgerUnavailable`; rejected writes return
/// `TransactionFailed`.
pub trait Ledger: Send + Sync {
    fn loan_parameters(&self) -> impl Future<Output = Result<LoanParameters>> + Send;

    /// one past the highest loan id ever issued
    fn loan_count(&self) -> impl Future<Output = Result<u64>> + Send;

    /// deleted loans are returned with a null borrower
    fn loan(&self, id: LoanId) -> impl Future<Output = Result<Loan>> + Send;

    fn owner(&self) -> impl Future<Output = Result<AccountId>> + Send;

    fn request_close(&self, id: LoanId, caller: AccountId) -> impl Future<Output = Result<()>> + Send;

    fn submit_payment(
        &self,
        id: LoanId,
        caller: AccountId,
        value: Amount,
    ) -> impl Future<Output = Result<()>> + Send;

    fn submit_termination(
        &self,
        id: LoanId,
        caller: AccountId,
        value: Amount,
    ) -> impl Future<Output = Result<()>> + Send;

    fn fund_loan(
        &self,
        id: LoanId,
        caller: AccountId,
        value: Amount,
    ) -> impl Future<Output = Result<()>> + Send;

    fn cancel_loan(&self, id: LoanId, caller: AccountId) -> impl Future<Output = Result<()>> + Send;

    fn subscribe_loan_created(&self) -> impl Future<Output = Result<Subscription>> + Send;
}
