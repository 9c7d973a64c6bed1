//! Basic example demonstrating the blocking Database handle
//!
//! Run with: cargo run --example basic
//!
//! The database lives in a temporary directory and is removed on exit.

use sqlx_named_mapper::{impl_record, Database, Params};

#[derive(Debug, Default)]
struct User {
    id: i64,
    name: String,
    email: String,
}

impl_record!(User { id, name, email });

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("basic.db");

    println!("Opening database at {}...", path.display());
    let mut db = Database::open(&path)?;

    println!("\nCreating users table...");
    db.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE
        )",
        &(),
    )?;

    // Example 1: Insert, reading placeholders from a struct
    println!("\n--- Example 1: Inserting users ---");
    let users_to_insert = vec![
        ("Alice", "alice@example.com"),
        ("Bob", "bob@example.com"),
        ("Charlie", "charlie@example.com"),
    ];

    for (name, email) in users_to_insert {
        let user = User {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        };
        let id = db.insert("INSERT INTO users (name, email) VALUES (:name, :email)", &user)?;
        println!("Inserted user '{}': id={}", name, id);
    }

    // Example 2: Query all users
    println!("\n--- Example 2: Fetching all users ---");
    let users: Vec<User> = db.fetch_all("SELECT * FROM users ORDER BY id", &())?;
    println!("Found {} users:", users.len());
    for user in &users {
        println!("  - {} (id={}, email={})", user.name, user.id, user.email);
    }

    // Example 3: Query single user by email
    println!("\n--- Example 3: Finding user by email ---");
    let search_email = "alice@example.com";
    let found: Option<User> = db.fetch_optional(
        "SELECT * FROM users WHERE email = :email",
        &Params::new().set("email", search_email),
    )?;
    match found {
        Some(user) => println!("Found user: {} ({})", user.name, user.email),
        None => println!("User with email '{}' not found", search_email),
    }

    // Example 4: Update user
    println!("\n--- Example 4: Updating user ---");
    let changed = db.update(
        "UPDATE users SET name = :name WHERE email = :email",
        &Params::new().set("name", "Robert").set("email", "bob@example.com"),
    )?;
    println!("Updated {} row(s)", changed);

    // Example 5: Stream rows, stopping early
    println!("\n--- Example 5: Streaming the first two users ---");
    let seen = db.fetch_each("SELECT * FROM users ORDER BY id", &(), |user: User| {
        println!("  - {}", user.name);
        Ok(user.id < 2)
    })?;
    println!("Consumer saw {} row(s)", seen);

    // Example 6: Delete user
    println!("\n--- Example 6: Deleting user ---");
    let removed = db.delete(
        "DELETE FROM users WHERE email = :email",
        &Params::new().set("email", "charlie@example.com"),
    )?;
    println!("Deleted {} row(s)", removed);

    println!("\n--- Final state ---");
    let users: Vec<User> = db.fetch_all("SELECT * FROM users ORDER BY id", &())?;
    println!("Remaining {} users:", users.len());
    for user in &users {
        println!("  - {} (id={}, email={})", user.name, user.id, user.email);
    }

    db.close()?;
    println!("\nExample completed successfully!");
    Ok(())
}
