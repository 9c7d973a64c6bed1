//! Transaction example demonstrating units of work on a Database handle
//!
//! Run with: cargo run --example transaction
//!
//! The database lives in a temporary directory and is removed on exit.

use sqlx_named_mapper::{impl_record, Database, Error, Params, Transaction};

#[derive(Debug, Default)]
struct Account {
    id: i64,
    name: String,
    balance: i64,
}

impl_record!(Account { id, name, balance });

#[derive(Debug)]
enum TransferError {
    Db(Error),
    Rejected(String),
}

impl From<Error> for TransferError {
    fn from(e: Error) -> Self {
        TransferError::Db(e)
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::Db(e) => write!(f, "{}", e),
            TransferError::Rejected(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for TransferError {}

fn transfer_money(
    tx: &mut Transaction<'_>,
    from_id: i64,
    to_id: i64,
    amount: i64,
) -> Result<(), TransferError> {
    println!("  Transferring ${} from account {} to account {}", amount, from_id, to_id);

    // Debit from source account
    let debit = Params::new().set("amount", amount).set("id", from_id);
    if tx.update("UPDATE accounts SET balance = balance - :amount WHERE id = :id", &debit)? == 0 {
        return Err(TransferError::Rejected("Source account not found".into()));
    }

    // Check for negative balance
    let source: Option<Account> =
        tx.fetch_optional("SELECT * FROM accounts WHERE id = :id", &debit)?;
    let balance = source.map(|a| a.balance).unwrap_or_default();
    if balance < 0 {
        return Err(TransferError::Rejected(format!(
            "Insufficient funds (balance: ${})",
            balance
        )));
    }

    // Credit to destination account
    let credit = Params::new().set("amount", amount).set("id", to_id);
    if tx.update("UPDATE accounts SET balance = balance + :amount WHERE id = :id", &credit)? == 0 {
        return Err(TransferError::Rejected("Destination account not found".into()));
    }

    println!("  ✓ Transfer completed successfully");
    Ok(())
}

fn show_accounts(db: &mut Database) -> Result<(), Error> {
    let accounts: Vec<Account> = db.fetch_all("SELECT * FROM accounts ORDER BY id", &())?;
    println!("\nCurrent account balances:");
    for account in &accounts {
        println!("  {} (id={}): ${}", account.name, account.id, account.balance);
    }
    Ok(())
}

fn report(outcome: Result<bool, TransferError>) {
    match outcome {
        Ok(true) => println!("  ✓ Transaction committed"),
        Ok(false) => println!("  ✗ Transaction rolled back"),
        Err(e) => println!("  ✗ Transaction rolled back: {}", e),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut db = Database::open(dir.path().join("transaction.db"))?;

    println!("Setting up accounts table...");
    db.execute(
        "CREATE TABLE accounts (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0
        )",
        &(),
    )?;

    println!("\nCreating test accounts...");
    for (name, balance) in [("Alice", 1000), ("Bob", 500), ("Charlie", 750)] {
        db.insert(
            "INSERT INTO accounts (name, balance) VALUES (:name, :balance)",
            &Params::new().set("name", name).set("balance", balance),
        )?;
    }

    show_accounts(&mut db)?;

    // Example 1: Successful transaction
    println!("\n--- Example 1: Successful transfer ---");
    report(db.transaction(|tx| transfer_money(tx, 1, 2, 200).map(|()| true)));
    show_accounts(&mut db)?;

    // Example 2: Failed transaction (insufficient funds)
    println!("\n--- Example 2: Failed transfer (insufficient funds) ---");
    report(db.transaction(|tx| transfer_money(tx, 2, 1, 1000).map(|()| true)));
    show_accounts(&mut db)?;

    // Example 3: Multiple transfers in one transaction
    println!("\n--- Example 3: Multiple transfers in one transaction ---");
    report(db.transaction(|tx| {
        transfer_money(tx, 1, 3, 100)?; // Alice -> Charlie
        transfer_money(tx, 3, 2, 50)?; // Charlie -> Bob
        Ok(true)
    }));
    show_accounts(&mut db)?;

    // Example 4: Explicit transaction, abandoned by drop
    println!("\n--- Example 4: Dropping an open transaction ---");
    {
        let mut tx = db.begin()?;
        tx.execute("DELETE FROM accounts", &())?;
        println!("  Deleted every account inside the transaction, then dropped it");
    }
    show_accounts(&mut db)?;

    db.close()?;
    println!("\nExample completed successfully!");
    Ok(())
}
