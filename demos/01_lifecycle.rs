/// lifecycle - request, fund, pay and close loans against the in-memory ledger
use std::sync::Arc;

use loan_accounting_rs::chrono::{Duration, TimeZone, Utc};
use loan_accounting_rs::{
    AccountId, Amount, LoanDesk, LoanParameters, MemoryLedger, Percent, SafeTimeProvider, TimeSource,
};

const WEEK: u64 = 604_800;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();
    println!("=== loan lifecycle example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    let controller = time.test_control().unwrap();

    let owner = AccountId::from_bytes([9; 20]);
    let alice = AccountId::from_bytes([1; 20]);
    let bob = AccountId::from_bytes([2; 20]);

    let params = LoanParameters::weekly(Percent::from_percentage(5), Percent::from_percentage(10));
    let ledger = Arc::new(MemoryLedger::new(owner, params, time.clone()));

    let operator = LoanDesk::new(ledger.clone(), owner, time.clone());
    let mut created = operator.subscribe_loan_created().await?;

    // alice borrows against a deposit and asks for an nft-backed loan
    let deposit = ledger.request_loan(alice, Amount::new(1_000), 4 * WEEK).await;
    let nft = ledger.request_nft_loan(alice, 7, Amount::new(500), 2 * WEEK).await;
    for _ in 0..2 {
        if let Some(event) = created.next().await {
            println!("loan created: #{} ({})", event.loan_id, event.collateral.kind());
        }
    }
    created.unsubscribe();

    let alice_desk = LoanDesk::new(ledger.clone(), alice, time.clone());
    let bob_desk = LoanDesk::new(ledger.clone(), bob, time.clone());

    println!("open for funding: {}", bob_desk.available_loans().await?.len());
    println!("bob funds #{} with {}", nft, bob_desk.fund(nft).await?);

    println!("alice pays #{}: {}", deposit, alice_desk.pay(deposit).await?);
    println!("alice pays #{}: {}", nft, alice_desk.pay(nft).await?);

    for view in alice_desk.my_loans().await? {
        println!("{}", view.to_json_pretty()?);
    }

    // alice misses the next installment on both loans
    controller.advance(Duration::days(15));
    let report = operator.check_all().await?;
    println!("\nsweep {} closed {:?}", report.sweep_id, report.closed());
    println!("alice has {} live loans", alice_desk.my_loans().await?.len());

    println!("\nhistory of #{}:", deposit);
    for event in ledger.loan_history(deposit).await {
        println!("  {:?}", event);
    }

    Ok(())
}
