//! # sqlx-named-mapper
//!
//! Named parameter binding and row-to-struct mapping for SQLite on SQLx, behind a
//! blocking database handle with transaction scoping.
//!
//! ## Features
//!
//! - **Named Placeholders**: Use `:param_name` instead of `?` in your SQL; placeholders inside
//!   string literals, quoted identifiers and comments are left alone
//! - **Struct Carriers**: Placeholder values are read by name from a struct, a map, or [`Params`]
//! - **Struct Results**: Rows are mapped column-by-name into a fresh struct; extra columns are
//!   skipped so `SELECT *` works
//! - **Three Retrieval Modes**: single optional record, ordered collection, or row-by-row consumer
//!   with early stop
//! - **Typed Mutations**: `insert` returns the new row id, `update`/`delete` the affected row count
//! - **Transactions**: a unit of work commits on `Ok(true)` and rolls back on `Ok(false)`, an
//!   error, or a panic
//! - **Structured Errors**: every failure carries its kind, the SQLite result code and the SQL text
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx-named-mapper = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Mapping a Struct
//!
//! ```rust
//! use sqlx_named_mapper::{impl_record, Database};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     key: i64,
//!     name: String,
//!     age: i64,
//! }
//!
//! impl_record!(Person { key, name, age });
//!
//! let mut db = Database::open_in_memory()?;
//! db.execute("CREATE TABLE person (key INTEGER PRIMARY KEY, name TEXT, age INTEGER)", &())?;
//!
//! let alice = Person { key: 0, name: "Alice".into(), age: 30 };
//! let key = db.insert("INSERT INTO person (name, age) VALUES (:name, :age)", &alice)?;
//!
//! let found: Option<Person> =
//!     db.fetch_optional("SELECT * FROM person WHERE name = :name", &alice)?;
//! assert_eq!(found, Some(Person { key, ..alice }));
//! # Ok::<(), sqlx_named_mapper::Error>(())
//! ```
//!
//! ### Collections and Streaming
//!
//! ```rust
//! use sqlx_named_mapper::{impl_record, Database, Params};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     name: String,
//!     age: i64,
//! }
//!
//! impl_record!(Person { name, age });
//!
//! let mut db = Database::open_in_memory()?;
//! db.execute("CREATE TABLE person (name TEXT, age INTEGER)", &())?;
//! db.execute("INSERT INTO person VALUES ('Ann', 15), ('Ben', 25), ('Cid', 30)", &())?;
//!
//! let adults: Vec<Person> =
//!     db.fetch_all("SELECT * FROM person WHERE age > :minAge", &Params::new().set("minAge", 20))?;
//! assert_eq!(adults.len(), 2);
//!
//! // Stop after the first row
//! let seen = db.fetch_each("SELECT * FROM person", &(), |person: Person| {
//!     println!("{}", person.name);
//!     Ok(false)
//! })?;
//! assert_eq!(seen, 1);
//! # Ok::<(), sqlx_named_mapper::Error>(())
//! ```
//!
//! ### Using with Transactions
//!
//! ```rust
//! use sqlx_named_mapper::{Database, Params, Result};
//!
//! let mut db = Database::open_in_memory()?;
//! db.execute("CREATE TABLE log (line TEXT NOT NULL)", &())?;
//!
//! let result = db.transaction(|tx| -> Result<bool> {
//!     tx.insert("INSERT INTO log (line) VALUES (:line)", &Params::new().set("line", "kept?"))?;
//!     tx.insert("INSERT INTO log (line) VALUES (NULL)", &())?; // fails, everything rolls back
//!     Ok(true)
//! });
//! assert!(result.is_err());
//! # Ok::<(), sqlx_named_mapper::Error>(())
//! ```
//!
//! ## How It Works
//!
//! 1. **Parse**: Extract named placeholders (`:name`) and rewrite the SQL with positional `?`
//! 2. **Bind**: Read each placeholder's value from the carrier by name and bind it in order
//! 3. **Step**: Run the statement through SQLx and map each row into a fresh record by column name
//!
//! Records describe themselves with a [`Bindings`] table built once per type (property name to
//! getter, setter and type tag); [`impl_record!`] writes it for plain structs.
//!
//! ## Async Use
//!
//! [`Database`] blocks the calling thread. Inside an async runtime, use [`PreparedQuery`] and
//! [`PreparedQueryAs`] directly on a `SqliteConnection` instead.
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

pub mod binder;
pub mod config;
pub mod database;
pub mod error;
pub mod mapper;
pub mod parser;
pub mod query;
pub mod query_as;
pub mod record;
pub mod transaction;
pub mod value;

pub use config::{DatabaseConfig, TransactionBehavior};
pub use database::Database;
pub use error::{EngineError, Error, ErrorKind, Result, ERROR_DOMAIN};
pub use mapper::Column;
pub use parser::{BindParameter, NamedParameterParser, ParsedSql};
pub use query::PreparedQuery;
pub use query_as::PreparedQueryAs;
pub use record::{Bindings, Parameters, Params, Record};
pub use transaction::Transaction;
pub use value::{ConversionError, FromValue, ToValue, Value, ValueType};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::impl_record;
    pub use crate::{Database, Params, Parameters, Record};
    pub use crate::{PreparedQuery, PreparedQueryAs};
}
