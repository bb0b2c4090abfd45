use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use tracing::instrument;

use crate::accounting::AccountingEngine;
use crate::config::SweepConfig;
use crate::decimal::Amount;
use crate::errors::{LendingError, Result};
use crate::ledger::Ledger;
use crate::loan::Loan;
use crate::notifications::Subscription;
use crate::reconcile::{Reconciler, SweepReport, SweepSchedule};
use crate::types::{AccountId, LoanId};
use crate::view::LoanView;

/// user-facing entry point bound to one connected account
///
/// Every action checks authorization and loan state against a fresh read
/// before submitting a transaction, so a request the ledger would reject
/// for those reasons never leaves the desk.
pub struct LoanDesk<L> {
    ledger: Arc<L>,
    account: AccountId,
    time: SafeTimeProvider,
    reconciler: Arc<Reconciler<L>>,
}

impl<L: Ledger> LoanDesk<L> {
    pub fn new(ledger: Arc<L>, account: AccountId, time: SafeTimeProvider) -> Self {
        let reconciler = Arc::new(Reconciler::new(ledger.clone(), account, time.clone()));
        Self {
            ledger,
            account,
            time,
            reconciler,
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn reconciler(&self) -> &Arc<Reconciler<L>> {
        &self.reconciler
    }

    async fn engine(&self) -> Result<AccountingEngine> {
        AccountingEngine::new(self.ledger.loan_parameters().await?)
    }

    /// live loan record, `LoanNotFound` for deleted ones
    async fn live_loan(&self, id: LoanId) -> Result<Loan> {
        let loan = self.ledger.loan(id).await?;
        if loan.is_deleted() {
            return Err(LendingError::LoanNotFound { id });
        }
        Ok(loan)
    }

    fn require_borrower(&self, loan: &Loan, action: &'static str) -> Result<()> {
        if loan.borrower != self.account {
            return Err(LendingError::Unauthorized {
                id: loan.id,
                caller: self.account,
                action,
            });
        }
        Ok(())
    }

    /// pay the next installment, returning the amount sent
    #[instrument(name = "desk.pay", skip(self), fields(account = %self.account), err)]
    pub async fn pay(&self, id: LoanId) -> Result<Amount> {
        let engine = self.engine().await?;
        let loan = self.live_loan(id).await?;
        self.require_borrower(&loan, "pay")?;

        let now = self.time.now();
        if !loan.is_funded() {
            return Err(LendingError::InvalidState {
                id,
                current: engine.status(&loan, now),
                expected: "funded loan",
            });
        }
        if loan.payments_made >= engine.total_payments(&loan) {
            return Err(LendingError::InvalidState {
                id,
                current: engine.status(&loan, now),
                expected: "loan with installments left",
            });
        }

        let due = engine.payment_due(&loan)?;
        self.ledger.submit_payment(id, self.account, due).await?;
        tracing::info!(loan_id = id, amount = %due, "installment paid");
        Ok(due)
    }

    /// pay off a deposit-backed loan early
    #[instrument(name = "desk.terminate", skip(self), fields(account = %self.account), err)]
    pub async fn terminate(&self, id: LoanId) -> Result<Amount> {
        let engine = self.engine().await?;
        let loan = self.live_loan(id).await?;
        if loan.is_nft_backed() {
            return Err(LendingError::OperationNotSupported {
                kind: loan.collateral.kind(),
            });
        }
        self.require_borrower(&loan, "terminate")?;

        let payoff = engine.termination_payoff(&loan)?;
        self.ledger.submit_termination(id, self.account, payoff).await?;
        tracing::info!(loan_id = id, payoff = %payoff, "loan terminated");
        Ok(payoff)
    }

    /// withdraw an nft-backed request nobody has funded
    #[instrument(name = "desk.cancel", skip(self), fields(account = %self.account), err)]
    pub async fn cancel(&self, id: LoanId) -> Result<()> {
        let loan = self.live_loan(id).await?;
        self.require_borrower(&loan, "cancel")?;
        if !loan.is_awaiting_lender() {
            return Err(LendingError::InvalidState {
                id,
                current: self.engine().await?.status(&loan, self.time.now()),
                expected: "unfunded nft-backed request",
            });
        }

        self.ledger.cancel_loan(id, self.account).await?;
        tracing::info!(loan_id = id, "loan request cancelled");
        Ok(())
    }

    /// lend the principal of an open request, returning the amount sent
    #[instrument(name = "desk.fund", skip(self), fields(account = %self.account), err)]
    pub async fn fund(&self, id: LoanId) -> Result<Amount> {
        let loan = self.live_loan(id).await?;
        if !loan.is_nft_backed() {
            return Err(LendingError::OperationNotSupported {
                kind: loan.collateral.kind(),
            });
        }
        if !loan.is_awaiting_lender() {
            return Err(LendingError::InvalidState {
                id,
                current: self.engine().await?.status(&loan, self.time.now()),
                expected: "loan not yet funded",
            });
        }
        if loan.borrower == self.account {
            return Err(LendingError::Unauthorized {
                id,
                caller: self.account,
                action: "fund",
            });
        }

        self.ledger.fund_loan(id, self.account, loan.principal).await?;
        tracing::info!(loan_id = id, amount = %loan.principal, "loan funded");
        Ok(loan.principal)
    }

    /// nft-backed requests waiting for a lender
    ///
    /// Loans that cannot be read or rendered are logged and left out.
    pub async fn available_loans(&self) -> Result<Vec<LoanView>> {
        self.collect_views(|loan| loan.is_awaiting_lender()).await
    }

    /// live loans borrowed by the connected account
    pub async fn my_loans(&self) -> Result<Vec<LoanView>> {
        let account = self.account;
        self.collect_views(move |loan| !loan.is_deleted() && loan.borrower == account)
            .await
    }

    async fn collect_views<F>(&self, keep: F) -> Result<Vec<LoanView>>
    where
        F: Fn(&Loan) -> bool,
    {
        let engine = self.engine().await?;
        let count = self.ledger.loan_count().await?;
        let now = self.time.now();

        let mut views = Vec::new();
        for id in 0..count {
            let loan = match self.ledger.loan(id).await {
                Ok(loan) => loan,
                Err(e) => {
                    tracing::warn!(loan_id = id, error = %e, "could not read loan, leaving it out");
                    continue;
                }
            };
            if !keep(&loan) {
                continue;
            }
            match LoanView::from_loan(&engine, &loan, now) {
                Ok(view) => views.push(view),
                Err(e) => tracing::warn!(loan_id = id, error = %e, "could not build loan view, leaving it out"),
            }
        }
        Ok(views)
    }

    /// on-demand sweep with the connected account as operator
    pub async fn check_all(&self) -> Result<SweepReport> {
        self.reconciler.sweep().await
    }

    /// loan-created feed, restricted to the ledger owner
    pub async fn subscribe_loan_created(&self) -> Result<Subscription> {
        let owner = self.ledger.owner().await?;
        if owner != self.account {
            return Err(LendingError::NotOwner { caller: self.account });
        }
        self.ledger.subscribe_loan_created().await
    }
}

impl<L: Ledger + 'static> LoanDesk<L> {
    pub fn start_schedule(&self, config: &SweepConfig) -> Result<SweepSchedule> {
        self.reconciler.start_schedule(config)
    }
}
