pub mod schedule;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::accounting::AccountingEngine;
use crate::errors::{LendingError, Result};
use crate::ledger::Ledger;
use crate::types::{AccountId, LoanId, LoanStatus};

pub use schedule::SweepSchedule;

/// result of checking one loan during a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanOutcome {
    /// close request accepted by the ledger
    Closed { status: LoanStatus },
    /// close request rejected; retried on the next pass
    CloseFailed { status: LoanStatus, reason: String },
    /// record could not be read
    ReadFailed { reason: String },
    /// borrower is the null account
    Deleted,
    /// nft-backed request without a lender
    NotFunded,
    Healthy,
}

impl LoanOutcome {
    /// a close request was submitted for this loan
    pub fn attempted_close(&self) -> bool {
        matches!(self, LoanOutcome::Closed { .. } | LoanOutcome::CloseFailed { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, LoanOutcome::CloseFailed { .. } | LoanOutcome::ReadFailed { .. })
    }
}

/// what one pass over the ledger did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub loan_count: u64,
    pub outcomes: Vec<(LoanId, LoanOutcome)>,
}

impl SweepReport {
    /// ids the sweep decided to close, whether or not the close went through
    pub fn close_decisions(&self) -> Vec<LoanId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.attempted_close())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn closed(&self) -> Vec<LoanId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, LoanOutcome::Closed { .. }))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn failures(&self) -> Vec<LoanId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn outcome(&self, id: LoanId) -> Option<&LoanOutcome> {
        self.outcomes
            .iter()
            .find(|(loan_id, _)| *loan_id == id)
            .map(|(_, outcome)| outcome)
    }
}

/// finds loans past their term or payment deadline and asks the ledger to
/// close them
///
/// Each loan is an independent unit of work: a failed read or a rejected
/// close is recorded and the pass moves on. At most one pass runs at a time
/// per reconciler.
pub struct Reconciler<L> {
    ledger: Arc<L>,
    operator: AccountId,
    time: SafeTimeProvider,
    in_flight: AtomicBool,
}

impl<L: Ledger> Reconciler<L> {
    /// `operator` is the account submitting close requests
    pub fn new(ledger: Arc<L>, operator: AccountId, time: SafeTimeProvider) -> Self {
        Self {
            ledger,
            operator,
            time,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn operator(&self) -> AccountId {
        self.operator
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// one pass at the current time
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.time.now();
        self.sweep_at(now).await
    }

    /// one pass evaluated at `now`
    ///
    /// Fails only when nothing can be evaluated: another pass is running,
    /// the parameters or loan counter cannot be read, or the parameters are
    /// invalid.
    #[instrument(name = "reconcile.sweep", skip(self), fields(sweep_id), err)]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(LendingError::SweepInProgress)?;

        let sweep_id = Uuid::new_v4();
        tracing::Span::current().record("sweep_id", tracing::field::display(sweep_id));

        let params = self.ledger.loan_parameters().await?;
        let engine = AccountingEngine::new(params)?;
        let loan_count = self.ledger.loan_count().await?;

        let mut outcomes = Vec::with_capacity(loan_count.min(1_024) as usize);
        for id in 0..loan_count {
            let outcome = self.check_loan(&engine, id, now).await;
            outcomes.push((id, outcome));
        }

        let report = SweepReport {
            sweep_id,
            evaluated_at: now,
            loan_count,
            outcomes,
        };

        tracing::info!(
            loan_count,
            closed = report.closed().len(),
            failed = report.failures().len(),
            "sweep finished"
        );
        Ok(report)
    }

    async fn check_loan(&self, engine: &AccountingEngine, id: LoanId, now: DateTime<Utc>) -> LoanOutcome {
        let loan = match self.ledger.loan(id).await {
            Ok(loan) => loan,
            Err(e) => {
                tracing::warn!(loan_id = id, error = %e, "could not read loan, skipping");
                return LoanOutcome::ReadFailed { reason: e.to_string() };
            }
        };

        if loan.is_deleted() {
            return LoanOutcome::Deleted;
        }
        if !loan.is_funded() {
            return LoanOutcome::NotFunded;
        }
        if !engine.should_force_close(&loan, now) {
            return LoanOutcome::Healthy;
        }

        let status = engine.status(&loan, now);
        match self.ledger.request_close(id, self.operator).await {
            Ok(()) => {
                tracing::info!(loan_id = id, ?status, "loan closed");
                LoanOutcome::Closed { status }
            }
            Err(e) => {
                tracing::warn!(loan_id = id, ?status, error = %e, "close request failed");
                LoanOutcome::CloseFailed {
                    status,
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// clears the in-flight flag when the pass ends, including on cancellation
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoanParameters;
    use crate::decimal::{Amount, Percent};
    use crate::ledger::MemoryLedger;
    use crate::loan::Loan;
    use chrono::{Duration, TimeZone};
    use hourglass_rs::TimeSource;

    const WEEK: u64 = 604_800;

    fn borrower() -> AccountId {
        AccountId::from_bytes([1; 20])
    }

    fn operator() -> AccountId {
        AccountId::from_bytes([9; 20])
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn params() -> LoanParameters {
        LoanParameters::weekly(Percent::from_percentage(5), Percent::from_percentage(10))
    }

    fn setup() -> (Arc<MemoryLedger>, Reconciler<MemoryLedger>, SafeTimeProvider) {
        let time = SafeTimeProvider::new(TimeSource::Test(start()));
        let ledger = Arc::new(MemoryLedger::new(operator(), params(), time.clone()));
        let reconciler = Reconciler::new(ledger.clone(), operator(), time.clone());
        (ledger, reconciler, time)
    }

    /// loan0 overdue, loan1 deleted, loan2 healthy, evaluated at day 10
    async fn seed(ledger: &MemoryLedger) {
        ledger
            .insert(Loan::deposit_backed(0, borrower(), Amount::new(1_000), start(), 4 * WEEK))
            .await;
        ledger.insert(Loan::deleted(1)).await;
        ledger
            .insert(
                Loan::deposit_backed(2, borrower(), Amount::new(1_000), start(), 4 * WEEK).with_payments(1),
            )
            .await;
    }

    #[tokio::test]
    async fn test_sweep_closes_only_overdue_loan() {
        let (ledger, reconciler, time) = setup();
        seed(&ledger).await;
        time.test_control().unwrap().advance(Duration::days(10));

        let report = reconciler.sweep().await.unwrap();

        assert_eq!(report.loan_count, 3);
        assert_eq!(report.close_decisions(), vec![0]);
        assert_eq!(report.closed(), vec![0]);
        assert_eq!(report.outcome(1), Some(&LoanOutcome::Deleted));
        assert_eq!(report.outcome(2), Some(&LoanOutcome::Healthy));
        assert_eq!(ledger.close_requests().await, vec![0]);
        assert!(ledger.loan(0).await.unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_failed_close_does_not_abort_sweep() {
        let (ledger, reconciler, time) = setup();
        seed(&ledger).await;
        ledger
            .insert(Loan::deposit_backed(3, borrower(), Amount::new(1_000), start(), WEEK))
            .await;
        ledger.fail_writes_for(0).await;
        time.test_control().unwrap().advance(Duration::days(10));

        let report = reconciler.sweep().await.unwrap();

        assert!(matches!(report.outcome(0), Some(LoanOutcome::CloseFailed { .. })));
        assert_eq!(report.outcome(3), Some(&LoanOutcome::Closed { status: LoanStatus::Expired }));
        assert_eq!(report.failures(), vec![0]);
        assert_eq!(ledger.close_requests().await, vec![0, 3]);
    }

    #[tokio::test]
    async fn test_unreadable_loan_is_skipped() {
        let (ledger, reconciler, time) = setup();
        seed(&ledger).await;
        ledger.fail_reads_for(2).await;
        time.test_control().unwrap().advance(Duration::days(10));

        let report = reconciler.sweep().await.unwrap();

        assert!(matches!(report.outcome(2), Some(LoanOutcome::ReadFailed { .. })));
        assert_eq!(report.closed(), vec![0]);
    }

    #[tokio::test]
    async fn test_same_decision_without_state_change() {
        let (ledger, reconciler, time) = setup();
        seed(&ledger).await;
        ledger.fail_writes_for(0).await;
        time.test_control().unwrap().advance(Duration::days(10));

        let first = reconciler.sweep().await.unwrap();
        let second = reconciler.sweep().await.unwrap();
        assert_eq!(first.close_decisions(), second.close_decisions());
        assert_ne!(first.sweep_id, second.sweep_id);
    }

    #[tokio::test]
    async fn test_closed_loan_drops_out_of_next_pass() {
        let (ledger, reconciler, time) = setup();
        seed(&ledger).await;
        time.test_control().unwrap().advance(Duration::days(10));

        assert_eq!(reconciler.sweep().await.unwrap().closed(), vec![0]);
        let second = reconciler.sweep().await.unwrap();
        assert!(second.close_decisions().is_empty());
        assert_eq!(second.outcome(0), Some(&LoanOutcome::Deleted));
    }

    #[tokio::test]
    async fn test_unfunded_requests_are_not_closed() {
        let (ledger, reconciler, time) = setup();
        ledger.request_nft_loan(borrower(), 4, Amount::new(100), WEEK).await;
        time.test_control().unwrap().advance(Duration::days(30));

        let report = reconciler.sweep().await.unwrap();
        assert_eq!(report.outcome(0), Some(&LoanOutcome::NotFunded));
        assert!(ledger.close_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_parameters_abort_pass() {
        let (ledger, reconciler, _time) = setup();
        seed(&ledger).await;
        ledger
            .set_parameters(LoanParameters::new(Percent::from_percentage(5), 0, Percent::ZERO))
            .await;

        assert!(matches!(
            reconciler.sweep().await,
            Err(LendingError::InvalidConfiguration { .. })
        ));
        assert!(!reconciler.is_running());
    }

    #[tokio::test]
    async fn test_unavailable_ledger_aborts_pass() {
        let (ledger, reconciler, _time) = setup();
        seed(&ledger).await;
        ledger.set_unavailable(true).await;

        assert!(matches!(
            reconciler.sweep().await,
            Err(LendingError::LedgerUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_overlapping_sweep_refused() {
        let (ledger, reconciler, _time) = setup();
        seed(&ledger).await;

        let held = InFlight::acquire(&reconciler.in_flight).unwrap();
        assert!(matches!(reconciler.sweep().await, Err(LendingError::SweepInProgress)));
        drop(held);

        assert!(reconciler.sweep().await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_ledger() {
        let (_ledger, reconciler, _time) = setup();
        let report = reconciler.sweep().await.unwrap();
        assert_eq!(report.loan_count, 0);
        assert!(report.outcomes.is_empty());
    }
}
