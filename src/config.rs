//! Configuration for a SQLite database handle

use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;

/// How `BEGIN` acquires locks when a transaction starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionBehavior {
    /// Locks are taken on first read or write.
    #[default]
    Deferred,
    /// A write lock is taken immediately.
    Immediate,
    /// An exclusive lock is taken immediately.
    Exclusive,
}

impl TransactionBehavior {
    pub fn begin_sql(&self) -> &'static str {
        match self {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// Configuration for a [`Database`](crate::Database) handle
///
/// # Examples
///
/// ```
/// use sqlx_named_mapper::{DatabaseConfig, TransactionBehavior};
/// use std::time::Duration;
///
/// // Use defaults
/// let config = DatabaseConfig::default();
///
/// // Override just what you need
/// let config = DatabaseConfig {
///     busy_timeout: Duration::from_secs(1),
///     begin_behavior: TransactionBehavior::Immediate,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Create the database file if it does not exist.
    ///
    /// Default: true
    pub create_if_missing: bool,

    /// Open the database read-only.
    ///
    /// Default: false
    pub read_only: bool,

    /// How long SQLite waits on a locked database before failing with
    /// `SQLITE_BUSY`. This layer never retries on its own.
    ///
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Enforce foreign key constraints.
    ///
    /// Default: true
    pub foreign_keys: bool,

    /// Number of prepared statements kept cached on the connection.
    ///
    /// Default: 100
    pub statement_cache_capacity: usize,

    /// Lock behaviour of `BEGIN` for [`Database::transaction`](crate::Database::transaction).
    ///
    /// Default: [`TransactionBehavior::Deferred`]
    pub begin_behavior: TransactionBehavior,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
            statement_cache_capacity: 100,
            begin_behavior: TransactionBehavior::Deferred,
        }
    }
}

impl DatabaseConfig {
    pub(crate) fn apply(&self, options: SqliteConnectOptions) -> SqliteConnectOptions {
        options
            .create_if_missing(self.create_if_missing)
            .read_only(self.read_only)
            .busy_timeout(self.busy_timeout)
            .foreign_keys(self.foreign_keys)
            .statement_cache_capacity(self.statement_cache_capacity)
    }
}
