use anyhow::Context;
use bank_ledger::{
    config::BankConfig,
    service::AccountService,
    store::{AccountStore, SledStore},
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Console front end: reports each outcome and keeps going on failure.
struct Console<S: AccountStore> {
    service: AccountService<S>,
}

impl<S: AccountStore> Console<S> {
    fn create_account(&self, account_number: &str, holder: &str, initial_balance: Decimal) {
        match self
            .service
            .create_account(account_number, holder, initial_balance)
        {
            Ok(_) => println!("Account created successfully."),
            Err(e) => eprintln!("Error creating account: {e}"),
        }
    }

    fn deposit(&self, account_number: &str, amount: Decimal) {
        match self.service.deposit(account_number, amount) {
            Ok(()) => println!("Deposit successful."),
            Err(e) => eprintln!("Error during deposit: {e}"),
        }
    }

    fn withdraw(&self, account_number: &str, amount: Decimal) {
        match self.service.withdraw(account_number, amount) {
            Ok(()) => println!("Withdrawal successful."),
            Err(e) => eprintln!("Error during withdrawal: {e}"),
        }
    }

    fn transfer(&self, from: &str, to: &str, amount: Decimal) {
        match self.service.transfer(from, to, amount) {
            Ok(()) => println!("Transfer successful."),
            Err(e) => eprintln!("Error during transfer: {e}"),
        }
    }

    fn print_balance(&self, account_number: &str) {
        match self.service.get_balance(account_number) {
            Ok(balance) => println!("Balance for account {account_number}: {balance}"),
            Err(e) => eprintln!("Error fetching balance: {e}"),
        }
    }

    fn print_transaction_history(&self, account_number: &str) {
        match self.service.get_transaction_history(account_number) {
            Ok(transactions) => {
                println!("Transaction history for account {account_number}:");
                for t in transactions {
                    println!("{} - {} - {}", t.timestamp(), t.kind(), t.amount());
                }
            }
            Err(e) => eprintln!("Error fetching transactions: {e}"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    bank_ledger::init_tracing();

    // temporary database unless BANK_DB_PATH points somewhere
    let config = BankConfig::session_from_env().context("invalid configuration")?;
    let store = SledStore::open(&config)
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;

    let console = Console {
        service: AccountService::new(Arc::new(store)),
    };

    console.create_account("ACC1001", "Alice", Decimal::from(1000));
    console.create_account("ACC1002", "Bob", Decimal::from(500));

    console.deposit("ACC1001", Decimal::from(200));
    console.withdraw("ACC1002", Decimal::from(100));

    console.transfer("ACC1001", "ACC1002", Decimal::from(300));

    console.print_balance("ACC1001");
    console.print_balance("ACC1002");

    console.print_transaction_history("ACC1001");
    console.print_transaction_history("ACC1002");

    // exceeds the balance; reported, not fatal
    console.withdraw("ACC1002", Decimal::from(2000));

    Ok(())
}
