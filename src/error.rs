use std::fmt;

/// Error domain shared by every error this crate produces.
pub const ERROR_DOMAIN: &str = "sqlx_named_mapper";

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Open,
    Parse,
    Bind,
    Query,
    Mutate,
    Execute,
    Map,
    TooManyRows,
    TransactionState,
    ClosedHandle,
}

impl ErrorKind {
    /// Machine-readable name of the kind, e.g. `QUERY_ERROR`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Open => "OPEN_ERROR",
            ErrorKind::Parse => "PARSE_ERROR",
            ErrorKind::Bind => "BIND_ERROR",
            ErrorKind::Query => "QUERY_ERROR",
            ErrorKind::Mutate => "MUTATE_ERROR",
            ErrorKind::Execute => "EXECUTE_ERROR",
            ErrorKind::Map => "MAP_ERROR",
            ErrorKind::TooManyRows => "TOO_MANY_ROWS",
            ErrorKind::TransactionState => "TRANSACTION_STATE_ERROR",
            ErrorKind::ClosedHandle => "CLOSED_HANDLE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by SQLite while preparing or stepping a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// SQLite (extended) result code, when the failure came from the engine.
    pub code: Option<i32>,
    pub message: String,
    /// SQL text as written by the caller, before placeholder rewriting.
    pub sql: String,
}

impl EngineError {
    pub(crate) fn new(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            sql: sql.into(),
        }
    }

    pub(crate) fn from_sqlx(err: &sqlx::Error, sql: &str) -> Self {
        match err.as_database_error() {
            Some(db_err) => Self {
                code: db_err.code().and_then(|code| code.parse().ok()),
                message: db_err.message().to_owned(),
                sql: sql.to_owned(),
            },
            None => Self::new(err.to_string(), sql),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {}) [{}]", self.message, code, self.sql),
            None => write!(f, "{} [{}]", self.message, self.sql),
        }
    }
}

impl std::error::Error for EngineError {}

/// Error types for sqlx-named-mapper
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The database file could not be opened
    #[error("Failed to open database '{path}': {message}")]
    Open {
        path: String,
        code: Option<i32>,
        message: String,
    },

    /// The connection could not be shut down cleanly
    #[error("Failed to close database '{path}': {message}")]
    Close {
        path: String,
        code: Option<i32>,
        message: String,
    },

    /// A placeholder sigil was not followed by an identifier
    #[error("Malformed placeholder at byte {position}: {sql}")]
    Parse { position: usize, sql: String },

    /// The placeholder tokenizer could not be compiled
    #[error("Failed to compile placeholder pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A placeholder could not be resolved or encoded
    #[error("Cannot bind parameter '{name}': {reason} [{sql}]")]
    Bind {
        name: String,
        reason: String,
        sql: String,
    },

    /// A query failed to prepare or step
    #[error("Query failed: {0}")]
    Query(EngineError),

    /// An insert, update or delete failed
    #[error("Mutation failed: {0}")]
    Mutate(EngineError),

    /// A raw statement failed
    #[error("Execute failed: {0}")]
    Execute(EngineError),

    /// A column value could not be assigned to its property
    #[error("Cannot map column '{column}': {reason} [{sql}]")]
    Map {
        column: String,
        reason: String,
        sql: String,
    },

    /// A single-object query matched more than one row
    #[error("Query returned more than one row, expected 0 or 1 [{sql}]")]
    TooManyRows { sql: String },

    /// A transaction was started while another one is active
    #[error("Transaction state error: {0}")]
    TransactionState(String),

    /// The transaction failed and the rollback failed too
    #[error("Transaction failed: {transaction_error}; rollback also failed: {rollback_error}")]
    TransactionRollbackFailed {
        transaction_error: String,
        rollback_error: String,
    },

    /// The handle was used after `close`
    #[error("Database handle has been closed")]
    Closed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open { .. } => ErrorKind::Open,
            Error::Parse { .. } | Error::Pattern(_) => ErrorKind::Parse,
            Error::Bind { .. } => ErrorKind::Bind,
            Error::Query(_) => ErrorKind::Query,
            Error::Mutate(_) => ErrorKind::Mutate,
            Error::Execute(_) | Error::Close { .. } | Error::TransactionRollbackFailed { .. } => {
                ErrorKind::Execute
            }
            Error::Map { .. } => ErrorKind::Map,
            Error::TooManyRows { .. } => ErrorKind::TooManyRows,
            Error::TransactionState(_) => ErrorKind::TransactionState,
            Error::Closed => ErrorKind::ClosedHandle,
        }
    }

    /// SQLite result code, when the engine reported one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Open { code, .. } | Error::Close { code, .. } => *code,
            Error::Query(e) | Error::Mutate(e) | Error::Execute(e) => e.code,
            _ => None,
        }
    }

    /// The SQL text that failed, when the failure is tied to a statement.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Parse { sql, .. }
            | Error::Bind { sql, .. }
            | Error::Map { sql, .. }
            | Error::TooManyRows { sql } => Some(sql),
            Error::Query(e) | Error::Mutate(e) | Error::Execute(e) => Some(&e.sql),
            _ => None,
        }
    }

    /// Extract a structured error code from the error.
    ///
    /// Engine failures report `SQLITE_<code>`; everything else reports its kind.
    pub fn error_code(&self) -> String {
        match self.code() {
            Some(code) => format!("SQLITE_{}", code),
            None => self.kind().as_str().to_string(),
        }
    }

    pub fn domain(&self) -> &'static str {
        ERROR_DOMAIN
    }
}

/// Result type alias for sqlx-named-mapper operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display_with_code() {
        let err = EngineError {
            code: Some(19),
            message: "UNIQUE constraint failed: person.name".into(),
            sql: "INSERT INTO person (name) VALUES (:name)".into(),
        };
        let text = err.to_string();
        assert!(text.contains("code 19"));
        assert!(text.contains("INSERT INTO person"));
    }

    #[test]
    fn test_error_code_prefers_engine_code() {
        let err = Error::Mutate(EngineError {
            code: Some(2067),
            message: "UNIQUE constraint failed".into(),
            sql: "INSERT".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Mutate);
        assert_eq!(err.code(), Some(2067));
        assert_eq!(err.error_code(), "SQLITE_2067");
    }

    #[test]
    fn test_error_code_falls_back_to_kind() {
        let err = Error::TooManyRows {
            sql: "SELECT * FROM person".into(),
        };
        assert_eq!(err.error_code(), "TOO_MANY_ROWS");
        assert_eq!(err.sql(), Some("SELECT * FROM person"));
        assert_eq!(Error::Closed.error_code(), "CLOSED_HANDLE");
    }

    #[test]
    fn test_rollback_failure_reports_both_messages() {
        let err = Error::TransactionRollbackFailed {
            transaction_error: "constraint".into(),
            rollback_error: "busy".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Execute);
        assert!(err.to_string().contains("constraint"));
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn test_close_failure_has_no_sql() {
        let err = Error::Close {
            path: "app.db".into(),
            code: Some(5),
            message: "database is locked".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Execute);
        assert_eq!(err.sql(), None);
        assert_eq!(err.error_code(), "SQLITE_5");
        assert!(err.to_string().contains("app.db"));
    }

    #[test]
    fn test_non_database_sqlx_error_has_no_code() {
        let err = EngineError::from_sqlx(&sqlx::Error::RowNotFound, "SELECT 1");
        assert_eq!(err.code, None);
        assert_eq!(err.sql, "SELECT 1");
    }

    #[test]
    fn test_domain_is_constant() {
        assert_eq!(Error::Closed.domain(), ERROR_DOMAIN);
    }
}
