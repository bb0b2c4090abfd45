/// quick start - compute a loan's schedule and amounts
use loan_accounting_rs::chrono::Utc;
use loan_accounting_rs::{AccountId, AccountingEngine, Amount, Loan, LoanParameters, LoanView, Percent};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 5% per week, 10% early termination fee
    let engine = AccountingEngine::new(LoanParameters::weekly(
        Percent::from_percentage(5),
        Percent::from_percentage(10),
    ))?;

    let borrower: AccountId = "0x9cb6ea3311bcd6d8e863d90c94e4d890e1098c80".parse()?;
    let principal = Amount::from_major(1_000, 18).ok_or("principal out of range")?;
    let loan = Loan::deposit_backed(0, borrower, principal, Utc::now(), 4 * 604_800);

    println!("payments:   {}", engine.total_payments(&loan));
    println!("due now:    {}", engine.payment_due(&loan)?.format_units(18));
    println!("payoff:     {}", engine.termination_payoff(&loan)?.format_units(18));
    println!("next due:   {}", engine.next_payment_deadline(&loan)?);

    println!("{}", LoanView::from_loan(&engine, &loan, Utc::now())?.to_json_pretty()?);

    Ok(())
}
