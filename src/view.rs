/// serialization support for loans
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accounting::AccountingEngine;
use crate::decimal::{Amount, Percent};
use crate::errors::Result;
use crate::loan::Loan;
use crate::types::{AccountId, Collateral, LoanId, LoanStatus};

/// serializable view of a loan and its computed values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub borrower: AccountId,
    /// absent while an nft-backed request waits for a lender
    pub lender: Option<AccountId>,
    pub collateral: Collateral,
    pub status: LoanStatus,
    pub schedule: ScheduleView,
    pub amounts: AmountsView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleView {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub periodicity_seconds: u64,
    pub total_payments: u64,
    pub payments_made: u64,
    pub next_payment_deadline: Option<DateTime<Utc>>,
    pub is_final_payment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountsView {
    pub principal: Amount,
    pub interest_rate: Percent,
    pub payment_due: Amount,
    pub paid_amount: Amount,
    pub outstanding_amount: Amount,
    pub termination_fee: Percent,
    pub termination_payoff: Option<Amount>,
}

impl LoanView {
    pub fn from_loan(engine: &AccountingEngine, loan: &Loan, now: DateTime<Utc>) -> Result<Self> {
        let summary = engine.summary(loan, now)?;
        let params = engine.params();
        let funded = loan.is_funded();

        Ok(LoanView {
            id: loan.id,
            borrower: loan.borrower,
            lender: (!loan.lender.is_null()).then_some(loan.lender),
            collateral: loan.collateral,
            status: summary.status,
            schedule: ScheduleView {
                start_time: funded.then_some(loan.start_time),
                end_time: summary.end_time,
                duration_seconds: loan.duration_seconds,
                periodicity_seconds: params.periodicity_seconds,
                total_payments: summary.total_payments,
                payments_made: summary.payments_made,
                next_payment_deadline: summary.next_payment_deadline,
                is_final_payment: engine.is_final_payment(loan),
            },
            amounts: AmountsView {
                principal: loan.principal,
                interest_rate: params.interest_rate,
                payment_due: summary.payment_due,
                paid_amount: summary.paid_amount,
                outstanding_amount: summary.outstanding_amount,
                termination_fee: params.termination_fee,
                termination_payoff: summary.termination_payoff,
            },
        })
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoanParameters;
    use chrono::TimeZone;

    const WEEK: u64 = 604_800;

    fn engine() -> AccountingEngine {
        AccountingEngine::new(LoanParameters::weekly(
            Percent::from_percentage(5),
            Percent::from_percentage(10),
        ))
        .unwrap()
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_deposit_backed_view() {
        let loan = Loan::deposit_backed(3, AccountId::from_bytes([1; 20]), Amount::new(1_000), start(), 4 * WEEK)
            .with_payments(3);
        let view = LoanView::from_loan(&engine(), &loan, start()).unwrap();

        assert_eq!(view.id, 3);
        assert_eq!(view.lender, None);
        assert_eq!(view.status, LoanStatus::FinalInstallment);
        assert_eq!(view.schedule.total_payments, 4);
        assert!(view.schedule.is_final_payment);
        assert_eq!(view.schedule.start_time, Some(start()));
        assert_eq!(view.amounts.payment_due, Amount::new(1_050));
        assert_eq!(view.amounts.termination_payoff, Some(Amount::new(1_100)));
    }

    #[test]
    fn test_unfunded_request_has_no_schedule() {
        let loan = Loan::nft_backed(0, AccountId::from_bytes([1; 20]), 42, Amount::new(500), 2 * WEEK);
        let view = LoanView::from_loan(&engine(), &loan, start()).unwrap();

        assert_eq!(view.status, LoanStatus::AwaitingLender);
        assert_eq!(view.schedule.start_time, None);
        assert_eq!(view.schedule.next_payment_deadline, None);
        assert_eq!(view.amounts.termination_payoff, None);
    }

    #[test]
    fn test_json_output() {
        let loan = Loan::nft_backed(0, AccountId::from_bytes([0xab; 20]), 42, Amount::new(500), 2 * WEEK)
            .funded_by(AccountId::from_bytes([2; 20]), start());
        let view = LoanView::from_loan(&engine(), &loan, start()).unwrap();

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"borrower\": \"0xabababababababababababababababababababab\""));
        assert!(json.contains("\"amounts\""));

        let parsed: LoanView = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, view);
    }
}
