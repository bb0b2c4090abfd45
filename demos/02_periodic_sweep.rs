/// periodic sweep - run the reconciler on a timer and stop it cleanly
use std::sync::Arc;
use std::time::Duration;

use loan_accounting_rs::{
    AccountId, Amount, EngineConfig, LoanDesk, LoanParameters, MemoryLedger, Percent, SafeTimeProvider,
    TimeSource,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let config = EngineConfig::from_json(r#"{ "sweep": { "interval": 1, "run_immediately": true } }"#)?;

    let time = SafeTimeProvider::new(TimeSource::System);
    let owner = AccountId::from_bytes([9; 20]);
    let params = LoanParameters::new(Percent::from_percentage(5), 2, Percent::ZERO);
    let ledger = Arc::new(MemoryLedger::new(owner, params, time.clone()));

    // two-second installments, so the loan is overdue shortly after start
    ledger.request_loan(AccountId::from_bytes([1; 20]), Amount::new(100), 10).await;

    let desk = LoanDesk::new(ledger.clone(), owner, time);
    let schedule = desk.start_schedule(&config.sweep)?;

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    println!("passes so far: {}", schedule.passes());
    schedule.shutdown().await;

    println!("close requests: {:?}", ledger.close_requests().await);
    Ok(())
}
