use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LoanParameters;
use crate::decimal::Amount;
use crate::errors::{LendingError, Result};
use crate::loan::Loan;
use crate::types::{LoanId, LoanStatus};

/// loan accounting over validated ledger parameters
///
/// Payments are interest-only with the principal repaid together with the
/// last installment. All operations are pure; `now` is always an argument.
#[derive(Debug, Clone, Copy)]
pub struct AccountingEngine {
    params: LoanParameters,
}

impl AccountingEngine {
    /// fails with `InvalidConfiguration` when the periodicity is zero
    pub fn new(params: LoanParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &LoanParameters {
        &self.params
    }

    fn period(&self) -> Duration {
        // bounded by LoanParameters::validate
        Duration::seconds(self.params.periodicity_seconds as i64)
    }

    /// number of installments over the loan term
    pub fn total_payments(&self, loan: &Loan) -> u64 {
        loan.duration_seconds / self.params.periodicity_seconds
    }

    /// deadline of the next installment
    pub fn next_payment_deadline(&self, loan: &Loan) -> Result<DateTime<Utc>> {
        if !loan.is_funded() {
            return Err(LendingError::InvalidState {
                id: loan.id,
                current: self.status_without_time(loan),
                expected: "funded loan",
            });
        }

        let periods = loan
            .payments_made
            .checked_add(1)
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| LendingError::overflow("payment deadline"))?;

        self.period()
            .checked_mul(periods)
            .and_then(|offset| loan.start_time.checked_add_signed(offset))
            .ok_or_else(|| LendingError::overflow("payment deadline"))
    }

    pub fn is_final_payment(&self, loan: &Loan) -> bool {
        loan.payments_made.saturating_add(1) >= self.total_payments(loan)
    }

    /// interest for one period, rounded down
    pub fn interest_per_period(&self, loan: &Loan) -> Result<Amount> {
        loan.principal
            .percentage(self.params.interest_rate)
            .ok_or_else(|| LendingError::overflow("interest"))
    }

    /// amount of the next installment; the final one includes the principal
    pub fn payment_due(&self, loan: &Loan) -> Result<Amount> {
        let interest = self.interest_per_period(loan)?;
        if !self.is_final_payment(loan) {
            return Ok(interest);
        }
        interest
            .checked_add(loan.principal)
            .ok_or_else(|| LendingError::overflow("final payment"))
    }

    /// cumulative credit as the ledger counts it: one principal per payment
    pub fn paid_amount(&self, loan: &Loan) -> Result<Amount> {
        if loan.payments_made == 0 {
            return Ok(Amount::ZERO);
        }
        loan.principal
            .checked_mul(loan.payments_made)
            .ok_or_else(|| LendingError::overflow("paid amount"))
    }

    /// principal not yet credited, never below zero
    pub fn outstanding_amount(&self, loan: &Loan) -> Result<Amount> {
        Ok(loan.principal.saturating_sub(self.paid_amount(loan)?))
    }

    /// early payoff: principal plus the termination fee, rounded down
    pub fn termination_payoff(&self, loan: &Loan) -> Result<Amount> {
        if loan.is_nft_backed() {
            return Err(LendingError::OperationNotSupported {
                kind: loan.collateral.kind(),
            });
        }
        loan.principal
            .percentage(self.params.termination_fee)
            .and_then(|fee| fee.checked_add(loan.principal))
            .ok_or_else(|| LendingError::overflow("termination payoff"))
    }

    /// true strictly after the end of the term
    pub fn is_expired(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
        match loan.end_time() {
            Some(end) => now > end,
            // a term past the representable range never ends
            None => false,
        }
    }

    pub fn is_payment_missed(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
        if loan.payments_made >= self.total_payments(loan) {
            return false;
        }
        match self.next_payment_deadline(loan) {
            Ok(deadline) => now > deadline,
            Err(_) => false,
        }
    }

    /// funded loan that the ledger should close
    pub fn should_force_close(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
        if !loan.is_funded() {
            return false;
        }
        self.is_expired(loan, now) || self.is_payment_missed(loan, now)
    }

    pub fn status(&self, loan: &Loan, now: DateTime<Utc>) -> LoanStatus {
        if loan.is_deleted() {
            LoanStatus::Deleted
        } else if loan.is_awaiting_lender() {
            LoanStatus::AwaitingLender
        } else if self.is_expired(loan, now) {
            LoanStatus::Expired
        } else if self.is_payment_missed(loan, now) {
            LoanStatus::PaymentMissed
        } else if self.is_final_payment(loan) {
            LoanStatus::FinalInstallment
        } else {
            LoanStatus::Active
        }
    }

    fn status_without_time(&self, loan: &Loan) -> LoanStatus {
        if loan.is_deleted() {
            LoanStatus::Deleted
        } else if loan.is_awaiting_lender() {
            LoanStatus::AwaitingLender
        } else {
            LoanStatus::Active
        }
    }

    /// every computed value for one loan
    ///
    /// A fully paid loan, or one whose counter runs past the schedule, has
    /// no next deadline rather than an error.
    pub fn summary(&self, loan: &Loan, now: DateTime<Utc>) -> Result<LoanSummary> {
        let funded = loan.is_funded();
        let installments_left = loan.payments_made < self.total_payments(loan);

        Ok(LoanSummary {
            loan_id: loan.id,
            status: self.status(loan, now),
            total_payments: self.total_payments(loan),
            payments_made: loan.payments_made,
            payment_due: self.payment_due(loan)?,
            paid_amount: self.paid_amount(loan)?,
            outstanding_amount: self.outstanding_amount(loan)?,
            termination_payoff: if loan.is_nft_backed() {
                None
            } else {
                Some(self.termination_payoff(loan)?)
            },
            next_payment_deadline: if funded && installments_left {
                self.next_payment_deadline(loan).ok()
            } else {
                None
            },
            end_time: if funded { loan.end_time() } else { None },
            should_force_close: self.should_force_close(loan, now),
        })
    }
}

/// computed values for one loan at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub total_payments: u64,
    pub payments_made: u64,
    pub payment_due: Amount,
    pub paid_amount: Amount,
    pub outstanding_amount: Amount,
    /// only for deposit-backed loans
    pub termination_payoff: Option<Amount>,
    /// only for funded loans
    pub next_payment_deadline: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub should_force_close: bool,
}
