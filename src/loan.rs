use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Amount;
use crate::types::{AccountId, Collateral, LoanId};

/// loan record as held by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower: AccountId,
    /// null until an nft-backed loan is funded
    pub lender: AccountId,
    pub principal: Amount,
    pub collateral: Collateral,
    /// for nft-backed loans, set when funded
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub payments_made: u64,
}

impl Loan {
    /// deposit-backed loan, active from `start_time`
    pub fn deposit_backed(
        id: LoanId,
        borrower: AccountId,
        principal: Amount,
        start_time: DateTime<Utc>,
        duration_seconds: u64,
    ) -> Self {
        Self {
            id,
            borrower,
            lender: AccountId::NULL,
            principal,
            collateral: Collateral::Deposit,
            start_time,
            duration_seconds,
            payments_made: 0,
        }
    }

    /// nft-backed loan request, waiting for a lender
    pub fn nft_backed(
        id: LoanId,
        borrower: AccountId,
        token_id: u64,
        principal: Amount,
        duration_seconds: u64,
    ) -> Self {
        Self {
            id,
            borrower,
            lender: AccountId::NULL,
            principal,
            collateral: Collateral::Nft { token_id },
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            duration_seconds,
            payments_made: 0,
        }
    }

    /// record left behind by a closed loan
    pub fn deleted(id: LoanId) -> Self {
        Self {
            id,
            borrower: AccountId::NULL,
            lender: AccountId::NULL,
            principal: Amount::ZERO,
            collateral: Collateral::Deposit,
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            duration_seconds: 0,
            payments_made: 0,
        }
    }

    /// builder-style: funded by `lender` at `at`
    pub fn funded_by(mut self, lender: AccountId, at: DateTime<Utc>) -> Self {
        self.lender = lender;
        self.start_time = at;
        self
    }

    /// builder-style: with `count` payments already made
    pub fn with_payments(mut self, count: u64) -> Self {
        self.payments_made = count;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.borrower.is_null()
    }

    pub fn is_nft_backed(&self) -> bool {
        self.collateral.is_nft()
    }

    /// nft-backed request nobody has funded yet
    pub fn is_awaiting_lender(&self) -> bool {
        !self.is_deleted() && self.is_nft_backed() && self.lender.is_null()
    }

    /// live loan with a running payment schedule
    pub fn is_funded(&self) -> bool {
        !self.is_deleted() && !(self.is_nft_backed() && self.lender.is_null())
    }

    /// end of the loan term, `None` if it cannot be represented
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        let duration = i64::try_from(self.duration_seconds).ok()?;
        self.start_time.checked_add_signed(Duration::try_seconds(duration)?)
    }

    pub(crate) fn record_payment(&mut self) {
        self.payments_made += 1;
    }
}
