use std::collections::HashSet;

use hourglass_rs::SafeTimeProvider;
use tokio::sync::Mutex;

use crate::accounting::AccountingEngine;
use crate::config::LoanParameters;
use crate::decimal::Amount;
use crate::errors::{LendingError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::Ledger;
use crate::loan::Loan;
use crate::notifications::{LoanCreated, LoanCreatedFeed, Subscription};
use crate::types::{AccountId, LoanId};

/// in-process ledger with the contract's loan rules
///
/// Writes are serialized behind one lock, like transactions in a block.
/// Individual loans can be made to fail reads or writes to exercise error
/// paths.
pub struct MemoryLedger {
    owner: AccountId,
    time: SafeTimeProvider,
    feed: LoanCreatedFeed,
    state: Mutex<LedgerState>,
}

struct LedgerState {
    params: LoanParameters,
    loans: Vec<Loan>,
    events: EventStore,
    close_requests: Vec<LoanId>,
    failing_reads: HashSet<LoanId>,
    failing_writes: HashSet<LoanId>,
    unavailable: bool,
}

impl LedgerState {
    fn live_loan(&self, id: LoanId) -> Result<&Loan> {
        self.loans
            .get(id as usize)
            .filter(|loan| !loan.is_deleted())
            .ok_or_else(|| reject(id, "loan does not exist"))
    }

    fn engine(&self, id: LoanId) -> Result<AccountingEngine> {
        AccountingEngine::new(self.params).map_err(|e| reject(id, &e.to_string()))
    }

    fn check_writable(&self, id: LoanId) -> Result<()> {
        if self.failing_writes.contains(&id) {
            return Err(reject(id, "transaction reverted"));
        }
        Ok(())
    }

    /// append to the log; a terminal event also deletes the loan record
    fn record(&mut self, event: Event) {
        if event.is_terminal() {
            let id = event.loan_id();
            if let Some(slot) = self.loans.get_mut(id as usize) {
                *slot = Loan::deleted(id);
            }
        }
        self.events.emit(event);
    }
}

fn reject(id: LoanId, reason: &str) -> LendingError {
    LendingError::TransactionFailed {
        id,
        reason: reason.to_string(),
    }
}

impl MemoryLedger {
    pub fn new(owner: AccountId, params: LoanParameters, time: SafeTimeProvider) -> Self {
        Self {
            owner,
            time,
            feed: LoanCreatedFeed::default(),
            state: Mutex::new(LedgerState {
                params,
                loans: Vec::new(),
                events: EventStore::new(),
                close_requests: Vec::new(),
                failing_reads: HashSet::new(),
                failing_writes: HashSet::new(),
                unavailable: false,
            }),
        }
    }

    /// deposit-backed loan starting now
    pub async fn request_loan(&self, borrower: AccountId, principal: Amount, duration_seconds: u64) -> LoanId {
        let mut state = self.state.lock().await;
        let id = state.loans.len() as LoanId;
        let loan = Loan::deposit_backed(id, borrower, principal, self.time.now(), duration_seconds);
        self.record_request(&mut state, loan);
        id
    }

    /// nft-backed loan request waiting for a lender
    pub async fn request_nft_loan(
        &self,
        borrower: AccountId,
        token_id: u64,
        principal: Amount,
        duration_seconds: u64,
    ) -> LoanId {
        let mut state = self.state.lock().await;
        let id = state.loans.len() as LoanId;
        let loan = Loan::nft_backed(id, borrower, token_id, principal, duration_seconds);
        self.record_request(&mut state, loan);
        id
    }

    /// store a prepared record under the next id
    pub async fn insert(&self, mut loan: Loan) -> LoanId {
        let mut state = self.state.lock().await;
        let id = state.loans.len() as LoanId;
        loan.id = id;
        state.loans.push(loan);
        id
    }

    fn record_request(&self, state: &mut LedgerState, loan: Loan) {
        let now = self.time.now();
        state.events.emit(Event::LoanRequested {
            loan_id: loan.id,
            borrower: loan.borrower,
            principal: loan.principal,
            collateral: loan.collateral,
            timestamp: now,
        });
        self.feed.publish(LoanCreated {
            loan_id: loan.id,
            borrower: loan.borrower,
            principal: loan.principal,
            collateral: loan.collateral,
            timestamp: now,
        });
        tracing::debug!(loan_id = loan.id, borrower = %loan.borrower, principal = %loan.principal, "loan requested");
        state.loans.push(loan);
    }

    pub async fn set_parameters(&self, params: LoanParameters) {
        self.state.lock().await.params = params;
    }

    /// every read of `id` fails until cleared
    pub async fn fail_reads_for(&self, id: LoanId) {
        self.state.lock().await.failing_reads.insert(id);
    }

    /// every write to `id` reverts until cleared
    pub async fn fail_writes_for(&self, id: LoanId) {
        self.state.lock().await.failing_writes.insert(id);
    }

    /// all reads fail until cleared
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.failing_reads.clear();
        state.failing_writes.clear();
        state.unavailable = false;
    }

    /// ids of every close request received, accepted or not
    pub async fn close_requests(&self) -> Vec<LoanId> {
        self.state.lock().await.close_requests.clone()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.state.lock().await.events.events().to_vec()
    }

    /// events recorded for one loan, oldest first
    pub async fn loan_history(&self, id: LoanId) -> Vec<Event> {
        self.state.lock().await.events.for_loan(id).into_iter().cloned().collect()
    }
}

impl Ledger for MemoryLedger {
    async fn loan_parameters(&self) -> Result<LoanParameters> {
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(LendingError::LedgerUnavailable {
                message: "loan parameters unavailable".to_string(),
            });
        }
        Ok(state.params)
    }

    async fn loan_count(&self) -> Result<u64> {
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(LendingError::LedgerUnavailable {
                message: "loan counter unavailable".to_string(),
            });
        }
        Ok(state.loans.len() as u64)
    }

    async fn loan(&self, id: LoanId) -> Result<Loan> {
        let state = self.state.lock().await;
        if state.unavailable || state.failing_reads.contains(&id) {
            return Err(LendingError::LedgerUnavailable {
                message: format!("loan {} could not be read", id),
            });
        }
        state
            .loans
            .get(id as usize)
            .cloned()
            .ok_or(LendingError::LoanNotFound { id })
    }

    async fn owner(&self) -> Result<AccountId> {
        Ok(self.owner)
    }

    async fn request_close(&self, id: LoanId, caller: AccountId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.close_requests.push(id);
        state.check_writable(id)?;

        let now = self.time.now();
        let engine = state.engine(id)?;
        let loan = state.live_loan(id)?;
        if !engine.should_force_close(loan, now) {
            return Err(reject(id, "loan is neither expired nor overdue"));
        }

        state.record(Event::LoanClosed {
            loan_id: id,
            closed_by: caller,
            timestamp: now,
        });
        tracing::debug!(loan_id = id, caller = %caller, "loan closed");
        Ok(())
    }

    async fn submit_payment(&self, id: LoanId, caller: AccountId, value: Amount) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;

        let now = self.time.now();
        let engine = state.engine(id)?;
        let loan = state.live_loan(id)?;
        if loan.borrower != caller {
            return Err(reject(id, "only the borrower can pay"));
        }
        if !loan.is_funded() {
            return Err(reject(id, "loan is not funded"));
        }
        if loan.payments_made >= engine.total_payments(loan) {
            return Err(reject(id, "loan is fully paid"));
        }
        let due = engine.payment_due(loan).map_err(|e| reject(id, &e.to_string()))?;
        if value < due {
            return Err(reject(id, "insufficient payment"));
        }

        let total = engine.total_payments(loan);
        let Some(slot) = state.loans.get_mut(id as usize) else {
            return Err(reject(id, "loan does not exist"));
        };
        slot.record_payment();
        let payments_made = slot.payments_made;

        state.record(Event::PaymentReceived {
            loan_id: id,
            amount: value,
            payments_made,
            timestamp: now,
        });
        tracing::debug!(loan_id = id, amount = %value, payments_made, "payment received");

        if payments_made >= total {
            state.record(Event::LoanRepaid {
                loan_id: id,
                timestamp: now,
            });
            tracing::debug!(loan_id = id, "loan repaid");
        }
        Ok(())
    }

    async fn submit_termination(&self, id: LoanId, caller: AccountId, value: Amount) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;

        let engine = state.engine(id)?;
        let loan = state.live_loan(id)?;
        if loan.borrower != caller {
            return Err(reject(id, "only the borrower can terminate"));
        }
        let payoff = engine
            .termination_payoff(loan)
            .map_err(|e| reject(id, &e.to_string()))?;
        if value < payoff {
            return Err(reject(id, "insufficient payoff"));
        }

        state.record(Event::LoanTerminated {
            loan_id: id,
            payoff: value,
            timestamp: self.time.now(),
        });
        tracing::debug!(loan_id = id, payoff = %value, "loan terminated");
        Ok(())
    }

    async fn fund_loan(&self, id: LoanId, caller: AccountId, value: Amount) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;

        let loan = state.live_loan(id)?;
        if !loan.is_awaiting_lender() {
            return Err(reject(id, "loan is not open for funding"));
        }
        if loan.borrower == caller {
            return Err(reject(id, "borrower cannot fund own loan"));
        }
        if value < loan.principal {
            return Err(reject(id, "insufficient funding"));
        }

        let now = self.time.now();
        let Some(slot) = state.loans.get_mut(id as usize) else {
            return Err(reject(id, "loan does not exist"));
        };
        slot.lender = caller;
        slot.start_time = now;

        state.record(Event::LoanFunded {
            loan_id: id,
            lender: caller,
            amount: value,
            timestamp: now,
        });
        tracing::debug!(loan_id = id, lender = %caller, "loan funded");
        Ok(())
    }

    async fn cancel_loan(&self, id: LoanId, caller: AccountId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_writable(id)?;

        let loan = state.live_loan(id)?;
        if loan.borrower != caller {
            return Err(reject(id, "only the borrower can cancel"));
        }
        if !loan.is_awaiting_lender() {
            return Err(reject(id, "only unfunded requests can be cancelled"));
        }

        state.record(Event::LoanCancelled {
            loan_id: id,
            timestamp: self.time.now(),
        });
        tracing::debug!(loan_id = id, "loan cancelled");
        Ok(())
    }

    async fn subscribe_loan_created(&self) -> Result<Subscription> {
        Ok(self.feed.subscribe())
    }
}
