pub mod accounting;
pub mod config;
pub mod decimal;
pub mod desk;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod loan;
pub mod notifications;
pub mod reconcile;
pub mod types;
pub mod view;

// re-export key types
pub use accounting::{AccountingEngine, LoanSummary};
pub use config::{EngineConfig, LoanParameters, SweepConfig};
pub use decimal::{Amount, Percent};
pub use desk::LoanDesk;
pub use errors::{LendingError, Result};
pub use events::{Event, EventStore};
pub use ledger::{Ledger, MemoryLedger};
pub use loan::Loan;
pub use notifications::{LoanCreated, LoanCreatedFeed, Subscription};
pub use reconcile::{LoanOutcome, Reconciler, SweepReport, SweepSchedule};
pub use types::{AccountId, Collateral, LoanId, LoanStatus};
pub use view::{AmountsView, LoanView, ScheduleView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
