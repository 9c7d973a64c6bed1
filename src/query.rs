use sqlx::sqlite::{SqliteConnection, SqliteQueryResult, SqliteStatement};
use sqlx::{Executor, Statement};
use tracing::trace;

use crate::binder::bind_parameters;
use crate::error::EngineError;
use crate::parser::{BindParameter, NamedParameterParser, ParsedSql};
use crate::record::Parameters;

/// Where a statement is in its lifecycle. Release happens when the
/// [`Lifecycle`] guard drops, whatever stage it reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Parsed,
    Prepared,
    Bound,
    /// Rows fetched so far.
    Stepping(usize),
}

/// Which family of operation a statement belongs to; decides the error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Query,
    Mutate,
    Execute,
}

impl Operation {
    pub(crate) fn failure(self, err: EngineError) -> crate::Error {
        match self {
            Operation::Query => crate::Error::Query(err),
            Operation::Mutate => crate::Error::Mutate(err),
            Operation::Execute => crate::Error::Execute(err),
        }
    }

    pub(crate) fn engine_failure(self, err: &sqlx::Error, sql: &str) -> crate::Error {
        self.failure(EngineError::from_sqlx(err, sql))
    }
}

/// Tracks a statement from parse to release.
///
/// Every exit path of an operation (early return, consumer stop, error)
/// drops the guard, which logs the stage the statement reached.
pub(crate) struct Lifecycle<'a> {
    operation: Operation,
    sql: &'a str,
    stage: Stage,
}

impl<'a> Lifecycle<'a> {
    pub(crate) fn new(operation: Operation, sql: &'a str) -> Self {
        Self {
            operation,
            sql,
            stage: Stage::Parsed,
        }
    }

    pub(crate) fn operation(&self) -> Operation {
        self.operation
    }

    pub(crate) fn advance(&mut self, stage: Stage) {
        trace!(operation = ?self.operation, from = ?self.stage, to = ?stage, "statement stage");
        self.stage = stage;
    }

    pub(crate) fn step(&mut self) {
        self.stage = match self.stage {
            Stage::Stepping(rows) => Stage::Stepping(rows + 1),
            _ => Stage::Stepping(1),
        };
    }
}

impl Drop for Lifecycle<'_> {
    fn drop(&mut self) {
        let rows = match self.stage {
            Stage::Stepping(rows) => rows,
            _ => 0,
        };
        trace!(
            operation = ?self.operation,
            last_stage = ?self.stage,
            rows,
            sql = self.sql,
            "statement finalized"
        );
    }
}

/// Prepares the rewritten SQL, reporting failures against the caller's text.
pub(crate) async fn prepare<'q>(
    conn: &mut SqliteConnection,
    parsed: &'q ParsedSql,
    lifecycle: &mut Lifecycle<'_>,
) -> crate::Result<SqliteStatement<'q>> {
    let statement = conn
        .prepare(parsed.sql())
        .await
        .map_err(|e| lifecycle.operation().engine_failure(&e, parsed.template()))?;
    lifecycle.advance(Stage::Prepared);
    Ok(statement)
}

/// A statement with named placeholders that produces no mapped rows.
///
/// `PreparedQuery` parses the template once and can run any number of times
/// against a connection, each time taking its values from a parameter carrier.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::{Connection, SqliteConnection};
/// use sqlx_named_mapper::{Params, PreparedQuery};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
///
/// let query = PreparedQuery::new("INSERT INTO person (name, age) VALUES (:name, :age)")?;
/// let id = query
///     .insert(&mut conn, &Params::new().set("name", "Alice").set("age", 30))
///     .await?;
/// println!("Inserted person {}", id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    parsed: ParsedSql,
}

impl PreparedQuery {
    /// Creates a new `PreparedQuery` from an SQL template.
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder in the template is malformed.
    pub fn new(template: impl AsRef<str>) -> crate::Result<Self> {
        NamedParameterParser::new()?.parse(template.as_ref()).map(Self::from_parsed)
    }

    pub fn from_parsed(parsed: ParsedSql) -> Self {
        Self { parsed }
    }

    pub fn template(&self) -> &str {
        self.parsed.template()
    }

    /// The SQL handed to SQLite.
    pub fn sql(&self) -> &str {
        self.parsed.sql()
    }

    pub fn parameters(&self) -> &[BindParameter] {
        self.parsed.parameters()
    }

    async fn run<P>(
        &self,
        conn: &mut SqliteConnection,
        carrier: &P,
        operation: Operation,
    ) -> crate::Result<SqliteQueryResult>
    where
        P: Parameters + ?Sized,
    {
        let parsed = &self.parsed;
        let mut lifecycle = Lifecycle::new(operation, parsed.template());
        let statement = prepare(conn, parsed, &mut lifecycle).await?;

        if operation == Operation::Mutate && !statement.columns().is_empty() {
            return Err(operation.failure(EngineError::new(
                "statement produces result rows; use a fetch operation",
                parsed.template(),
            )));
        }

        let query = bind_parameters(statement.query(), parsed.parameters(), carrier, parsed.template())?;
        lifecycle.advance(Stage::Bound);

        let result = query
            .execute(&mut *conn)
            .await
            .map_err(|e| operation.engine_failure(&e, parsed.template()))?;
        lifecycle.advance(Stage::Stepping(0));
        Ok(result)
    }

    /// Runs the statement to completion, discarding any rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execute`](crate::Error::Execute) if SQLite rejects
    /// the statement, or [`Error::Bind`](crate::Error::Bind) if a placeholder
    /// cannot be bound.
    pub async fn execute<P>(&self, conn: &mut SqliteConnection, carrier: &P) -> crate::Result<SqliteQueryResult>
    where
        P: Parameters + ?Sized,
    {
        self.run(conn, carrier, Operation::Execute).await
    }

    /// Runs an INSERT and returns the row id SQLite assigned.
    pub async fn insert<P>(&self, conn: &mut SqliteConnection, carrier: &P) -> crate::Result<i64>
    where
        P: Parameters + ?Sized,
    {
        let result = self.run(conn, carrier, Operation::Mutate).await?;
        Ok(result.last_insert_rowid())
    }

    /// Runs an UPDATE and returns the number of rows changed.
    pub async fn update<P>(&self, conn: &mut SqliteConnection, carrier: &P) -> crate::Result<u64>
    where
        P: Parameters + ?Sized,
    {
        let result = self.run(conn, carrier, Operation::Mutate).await?;
        Ok(result.rows_affected())
    }

    /// Runs a DELETE and returns the number of rows removed.
    pub async fn delete<P>(&self, conn: &mut SqliteConnection, carrier: &P) -> crate::Result<u64>
    where
        P: Parameters + ?Sized,
    {
        let result = self.run(conn, carrier, Operation::Mutate).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepared_query_new() {
        let result = PreparedQuery::new("SELECT * FROM users WHERE id = :id");
        assert!(result.is_ok());
    }

    #[test]
    fn test_prepared_query_placeholder_order() {
        let query = PreparedQuery::new("SELECT * FROM users WHERE id = :id AND name = :name").unwrap();

        let names: Vec<&str> = query.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(query.sql(), "SELECT * FROM users WHERE id = ? AND name = ?");
        assert_eq!(query.template(), "SELECT * FROM users WHERE id = :id AND name = :name");
    }

    #[test]
    fn test_prepared_query_rejects_bare_sigil() {
        let err = PreparedQuery::new("UPDATE users SET name = : WHERE id = :id").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }

    #[test]
    fn test_lifecycle_counts_rows() {
        let mut lifecycle = Lifecycle::new(Operation::Query, "SELECT 1");
        assert_eq!(lifecycle.stage, Stage::Parsed);
        lifecycle.advance(Stage::Bound);
        lifecycle.step();
        lifecycle.step();
        assert_eq!(lifecycle.stage, Stage::Stepping(2));
    }

    #[test]
    fn test_operation_selects_error_kind() {
        let err = EngineError::new("boom", "SELECT 1");
        assert_eq!(Operation::Query.failure(err.clone()).kind(), crate::ErrorKind::Query);
        assert_eq!(Operation::Mutate.failure(err.clone()).kind(), crate::ErrorKind::Mutate);
        assert_eq!(Operation::Execute.failure(err).kind(), crate::ErrorKind::Execute);
    }
}
