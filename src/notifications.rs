use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::decimal::Amount;
use crate::types::{AccountId, Collateral, LoanId};

/// published whenever the ledger records a new loan request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCreated {
    pub loan_id: LoanId,
    pub borrower: AccountId,
    pub principal: Amount,
    pub collateral: Collateral,
    pub timestamp: DateTime<Utc>,
}

/// fan-out of loan-created notifications
#[derive(Debug, Clone)]
pub struct LoanCreatedFeed {
    sender: broadcast::Sender<LoanCreated>,
}

impl LoanCreatedFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// returns the number of subscribers reached
    pub fn publish(&self, event: LoanCreated) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: Some(self.sender.subscribe()),
        }
    }
}

impl Default for LoanCreatedFeed {
    fn default() -> Self {
        Self::new(64)
    }
}

/// handle to a loan-created subscription; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    receiver: Option<broadcast::Receiver<LoanCreated>>,
}

impl Subscription {
    /// next notification, `None` once unsubscribed or the feed is gone
    pub async fn next(&mut self) -> Option<LoanCreated> {
        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "loan-created subscriber lagged, skipping notifications");
                }
                Err(RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        self.receiver = None;
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(loan_id: LoanId) -> LoanCreated {
        LoanCreated {
            loan_id,
            borrower: AccountId::from_bytes([1; 20]),
            principal: Amount::new(1_000),
            collateral: Collateral::Deposit,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_events() {
        let feed = LoanCreatedFeed::default();
        let mut subscription = feed.subscribe();

        assert_eq!(feed.publish(created(0)), 1);
        assert_eq!(feed.publish(created(1)), 1);

        assert_eq!(subscription.next().await.map(|e| e.loan_id), Some(0));
        assert_eq!(subscription.next().await.map(|e| e.loan_id), Some(1));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let feed = LoanCreatedFeed::default();
        let mut subscription = feed.subscribe();
        assert_eq!(feed.publish(created(0)), 1);

        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(feed.publish(created(0)), 0);
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_receiving() {
        let feed = LoanCreatedFeed::new(2);
        let mut subscription = feed.subscribe();

        for id in 0..5 {
            feed.publish(created(id));
        }

        // oldest notifications were overwritten
        assert_eq!(subscription.next().await.map(|e| e.loan_id), Some(3));
        assert_eq!(subscription.next().await.map(|e| e.loan_id), Some(4));
    }

    #[tokio::test]
    async fn test_feed_dropped_ends_subscription() {
        let feed = LoanCreatedFeed::default();
        let mut subscription = feed.subscribe();
        drop(feed);

        assert_eq!(subscription.next().await, None);
        assert!(!subscription.is_active());
    }
}
