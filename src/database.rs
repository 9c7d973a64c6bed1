//! Blocking handle over one SQLite connection

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::error::{EngineError, Error, Result};
use crate::parser::NamedParameterParser;
use crate::query::PreparedQuery;
use crate::query_as::PreparedQueryAs;
use crate::record::{Parameters, Record};

/// The single open session to one SQLite database.
///
/// Every operation blocks until SQLite is done with it. Operations take
/// `&mut self`, so one handle serves one caller at a time; use separate
/// handles (SQLite then arbitrates file locks between them) or external
/// locking for concurrency.
///
/// The handle drives SQLx on a private current-thread Tokio runtime and must
/// not be used from inside another Tokio runtime; async callers should use
/// [`PreparedQuery`] and [`PreparedQueryAs`] on their own connection.
///
/// # Examples
///
/// ```
/// use sqlx_named_mapper::{impl_record, Database, Params};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Person {
///     key: i64,
///     name: String,
///     age: i64,
/// }
///
/// impl_record!(Person { key, name, age });
///
/// let mut db = Database::open_in_memory()?;
/// db.execute("CREATE TABLE person (key INTEGER PRIMARY KEY, name TEXT, age INTEGER)", &())?;
///
/// let key = db.insert(
///     "INSERT INTO person (name, age) VALUES (:name, :age)",
///     &Params::new().set("name", "Alice").set("age", 30),
/// )?;
///
/// let person: Option<Person> =
///     db.fetch_optional("SELECT * FROM person WHERE key = :key", &Params::new().set("key", key))?;
/// assert_eq!(person, Some(Person { key, name: "Alice".into(), age: 30 }));
/// db.close()?;
/// # Ok::<(), sqlx_named_mapper::Error>(())
/// ```
pub struct Database {
    pub(crate) path: String,
    pub(crate) config: DatabaseConfig,
    parser: NamedParameterParser,
    runtime: Runtime,
    conn: Option<SqliteConnection>,
    pub(crate) in_transaction: bool,
}

impl Database {
    /// Opens (creating if missing) the database file at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, DatabaseConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: DatabaseConfig) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new().filename(path);
        Self::connect(path.display().to_string(), options, config)
    }

    /// Opens a private in-memory database; its contents vanish on close.
    pub fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| open_error(":memory:", &e))?;
        Self::connect(":memory:".to_owned(), options, DatabaseConfig::default())
    }

    fn connect(path: String, options: SqliteConnectOptions, config: DatabaseConfig) -> Result<Self> {
        let parser = NamedParameterParser::new()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Open {
                path: path.clone(),
                code: None,
                message: e.to_string(),
            })?;

        let options = config.apply(options);
        let conn = runtime
            .block_on(options.connect())
            .map_err(|e| open_error(&path, &e))?;
        debug!("Opened database: {}", path);

        Ok(Self {
            path,
            config,
            parser,
            runtime,
            conn: Some(conn),
            in_transaction: false,
        })
    }

    /// Closes the connection. Every later call, including another `close`,
    /// fails with [`Error::Closed`].
    ///
    /// # Errors
    ///
    /// Fails with [`Error::TransactionState`] while a transaction is open on
    /// this handle; finish it first.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.in_transaction {
            return Err(Error::TransactionState(format!(
                "cannot close database {} inside an open transaction",
                self.path
            )));
        }
        let conn = self.conn.take().ok_or(Error::Closed)?;
        self.runtime.block_on(conn.close()).map_err(|e| {
            let engine = EngineError::from_sqlx(&e, "");
            Error::Close {
                path: self.path.clone(),
                code: engine.code,
                message: engine.message,
            }
        })?;
        debug!("Closed database: {}", self.path);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// The path the handle was opened with (`:memory:` for in-memory databases).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Whether a transaction started through this handle is still open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn ensure_open(&self) -> Result<()> {
        if self.conn.is_none() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn session(&mut self) -> Result<(&Runtime, &mut SqliteConnection)> {
        match self.conn.as_mut() {
            Some(conn) => Ok((&self.runtime, conn)),
            None => Err(Error::Closed),
        }
    }

    fn query_as<R: Record>(&self, sql: &str) -> Result<PreparedQueryAs<R>> {
        self.ensure_open()?;
        Ok(PreparedQueryAs::from_parsed(self.parser.parse(sql)?))
    }

    fn query(&self, sql: &str) -> Result<PreparedQuery> {
        self.ensure_open()?;
        Ok(PreparedQuery::from_parsed(self.parser.parse(sql)?))
    }

    /// Runs a transaction control statement (`BEGIN`, `COMMIT`, `ROLLBACK`).
    pub(crate) fn control(&mut self, sql: &'static str) -> Result<()> {
        let (runtime, conn) = self.session()?;
        runtime
            .block_on(sqlx::query(sql).execute(&mut *conn))
            .map_err(|e| Error::Execute(EngineError::from_sqlx(&e, sql)))?;
        Ok(())
    }

    /// Returns the single matching row, or `None` when nothing matches.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::TooManyRows`] when more than one row matches.
    pub fn fetch_optional<R: Record>(
        &mut self,
        sql: &str,
        params: &(impl Parameters + ?Sized),
    ) -> Result<Option<R>> {
        let query = self.query_as::<R>(sql)?;
        let (runtime, conn) = self.session()?;
        runtime.block_on(query.fetch_optional(conn, params))
    }

    /// Returns every matching row in fetch order; empty when nothing matches.
    pub fn fetch_all<R: Record>(&mut self, sql: &str, params: &(impl Parameters + ?Sized)) -> Result<Vec<R>> {
        let query = self.query_as::<R>(sql)?;
        let (runtime, conn) = self.session()?;
        runtime.block_on(query.fetch_all(conn, params))
    }

    /// Hands each matching row to `consumer` in fetch order.
    ///
    /// `consumer` returns `Ok(true)` to continue or `Ok(false)` to stop; an
    /// error stops iteration and is returned as is. Returns the number of
    /// rows handed to the consumer.
    pub fn fetch_each<R, F>(&mut self, sql: &str, params: &(impl Parameters + ?Sized), consumer: F) -> Result<usize>
    where
        R: Record,
        F: FnMut(R) -> Result<bool>,
    {
        let query = self.query_as::<R>(sql)?;
        let (runtime, conn) = self.session()?;
        runtime.block_on(query.fetch_each(conn, params, consumer))
    }

    /// Runs an INSERT and returns the new row id.
    pub fn insert(&mut self, sql: &str, params: &(impl Parameters + ?Sized)) -> Result<i64> {
        let query = self.query(sql)?;
        let (runtime, conn) = self.session()?;
        runtime.block_on(query.insert(conn, params))
    }

    /// Runs an UPDATE and returns the number of rows changed.
    pub fn update(&mut self, sql: &str, params: &(impl Parameters + ?Sized)) -> Result<u64> {
        let query = self.query(sql)?;
        let (runtime, conn) = self.session()?;
        runtime.block_on(query.update(conn, params))
    }

    /// Runs a DELETE and returns the number of rows removed.
    pub fn delete(&mut self, sql: &str, params: &(impl Parameters + ?Sized)) -> Result<u64> {
        let query = self.query(sql)?;
        let (runtime, conn) = self.session()?;
        runtime.block_on(query.delete(conn, params))
    }

    /// Runs any statement to completion, discarding rows.
    pub fn execute(&mut self, sql: &str, params: &(impl Parameters + ?Sized)) -> Result<()> {
        let query = self.query(sql)?;
        let (runtime, conn) = self.session()?;
        runtime.block_on(query.execute(conn, params))?;
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.close()) {
                warn!("Failed to close database {}: {}", self.path, e);
            }
        }
    }
}

fn open_error(path: &str, err: &sqlx::Error) -> Error {
    let engine = EngineError::from_sqlx(err, "");
    Error::Open {
        path: path.to_owned(),
        code: engine.code,
        message: engine.message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Params;
    use crate::ErrorKind;

    #[test]
    fn test_open_in_memory_and_close() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.path(), ":memory:");
        assert!(!db.is_closed());
        db.close().unwrap();
        assert!(db.is_closed());
        assert_eq!(db.close().unwrap_err().kind(), ErrorKind::ClosedHandle);
    }

    #[test]
    fn test_operations_after_close_fail() {
        let mut db = Database::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &()).unwrap();
        db.close().unwrap();

        let params = Params::new().set("id", 1);
        assert!(matches!(db.execute("SELECT 1", &()), Err(Error::Closed)));
        assert!(matches!(db.insert("INSERT INTO t (id) VALUES (:id)", &params), Err(Error::Closed)));
        assert!(matches!(db.update("UPDATE t SET id = :id", &params), Err(Error::Closed)));
        assert!(matches!(db.delete("DELETE FROM t WHERE id = :id", &params), Err(Error::Closed)));
        // closed is reported before the SQL is even parsed
        assert!(matches!(db.execute("SELECT :", &()), Err(Error::Closed)));
    }

    #[test]
    fn test_open_missing_file_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            create_if_missing: false,
            ..Default::default()
        };
        let err = Database::open_with_config(dir.path().join("missing.db"), config)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Open);
        assert!(err.to_string().contains("missing.db"));
    }

    #[test]
    fn test_execute_reports_engine_code_and_sql() {
        let mut db = Database::open_in_memory().unwrap();
        let err = db.execute("CREATE TABLE", &()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execute);
        assert_eq!(err.sql(), Some("CREATE TABLE"));
        assert_eq!(err.code(), Some(1));
    }
}
