use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Amount;
use crate::types::{AccountId, Collateral, LoanId};

/// state changes applied by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    LoanRequested {
        loan_id: LoanId,
        borrower: AccountId,
        principal: Amount,
        collateral: Collateral,
        timestamp: DateTime<Utc>,
    },
    LoanFunded {
        loan_id: LoanId,
        lender: AccountId,
        amount: Amount,
        timestamp: DateTime<Utc>,
    },
    PaymentReceived {
        loan_id: LoanId,
        amount: Amount,
        payments_made: u64,
        timestamp: DateTime<Utc>,
    },
    LoanRepaid {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },
    LoanTerminated {
        loan_id: LoanId,
        payoff: Amount,
        timestamp: DateTime<Utc>,
    },
    LoanCancelled {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },
    LoanClosed {
        loan_id: LoanId,
        closed_by: AccountId,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn loan_id(&self) -> LoanId {
        match self {
            Event::LoanRequested { loan_id, .. }
            | Event::LoanFunded { loan_id, .. }
            | Event::PaymentReceived { loan_id, .. }
            | Event::LoanRepaid { loan_id, .. }
            | Event::LoanTerminated { loan_id, .. }
            | Event::LoanCancelled { loan_id, .. }
            | Event::LoanClosed { loan_id, .. } => *loan_id,
        }
    }

    /// the loan record is deleted after this event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::LoanRepaid { .. }
                | Event::LoanTerminated { .. }
                | Event::LoanCancelled { .. }
                | Event::LoanClosed { .. }
        )
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// events for one loan, in emission order
    pub fn for_loan(&self, loan_id: LoanId) -> Vec<&Event> {
        self.events.iter().filter(|e| e.loan_id() == loan_id).collect()
    }
}
