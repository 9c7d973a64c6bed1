//! Transaction scoping over a [`Database`] handle

use std::fmt;
use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::database::Database;
use crate::error::{Error, Result};

/// An open transaction on a [`Database`].
///
/// Dereferences to the handle, so every query and mutation method is
/// available and runs inside the transaction. Dropping it without calling
/// [`commit`](Transaction::commit) or [`rollback`](Transaction::rollback)
/// rolls back, including when a panic unwinds through it.
#[must_use = "if unused, the transaction is immediately rolled back"]
pub struct Transaction<'db> {
    db: &'db mut Database,
    finished: bool,
}

impl<'db> Transaction<'db> {
    fn begin(db: &'db mut Database) -> Result<Self> {
        if db.in_transaction {
            return Err(Error::TransactionState(format!(
                "a transaction is already active for database: {}",
                db.path
            )));
        }
        let begin = db.config.begin_behavior.begin_sql();
        db.control(begin)?;
        db.in_transaction = true;
        debug!("Transaction started for db: {}", db.path);
        Ok(Self { db, finished: false })
    }

    /// Commits the transaction.
    ///
    /// When COMMIT fails the transaction is rolled back and the commit error
    /// returned; if the rollback fails as well, both are reported in
    /// [`Error::TransactionRollbackFailed`].
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        let committed = self.db.control("COMMIT");
        let outcome = match committed {
            Ok(()) => {
                debug!("Transaction committed for db: {}", self.db.path);
                Ok(())
            }
            Err(commit_err) => match self.db.control("ROLLBACK") {
                Ok(()) => Err(commit_err),
                Err(rollback_err) => Err(Error::TransactionRollbackFailed {
                    transaction_error: commit_err.to_string(),
                    rollback_error: rollback_err.to_string(),
                }),
            },
        };
        self.db.in_transaction = false;
        outcome
    }

    /// Rolls the transaction back.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        let outcome = self.db.control("ROLLBACK");
        self.db.in_transaction = false;
        if outcome.is_ok() {
            debug!("Transaction rolled back for db: {}", self.db.path);
        }
        outcome
    }
}

impl Deref for Transaction<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        &*self.db
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        &mut *self.db
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!(
            "Dropping open transaction for db: {} (rolling back)",
            self.db.path
        );
        if let Err(e) = self.db.control("ROLLBACK") {
            warn!("Rollback on drop failed for db {}: {}", self.db.path, e);
        }
        self.db.in_transaction = false;
    }
}

impl Database {
    /// Starts a transaction that rolls back unless committed.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::TransactionState`] when a transaction is already
    /// active on this handle.
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        Transaction::begin(self)
    }

    /// Runs `work` inside one transaction.
    ///
    /// `work` returning `Ok(true)` commits and `Ok(false)` rolls back; both
    /// outcomes are returned as is. An error from `work` rolls back and is
    /// returned unchanged. A panic in `work` rolls back while unwinding.
    ///
    /// # Examples
    ///
    /// ```
    /// use sqlx_named_mapper::{Database, Params, Result};
    ///
    /// let mut db = Database::open_in_memory()?;
    /// db.execute("CREATE TABLE account (id INTEGER PRIMARY KEY, balance INTEGER NOT NULL)", &())?;
    /// db.execute("INSERT INTO account (id, balance) VALUES (1, 100), (2, 0)", &())?;
    ///
    /// let committed = db.transaction(|tx| -> Result<bool> {
    ///     let amount = Params::new().set("amount", 40).set("from", 1).set("to", 2);
    ///     tx.update("UPDATE account SET balance = balance - :amount WHERE id = :from", &amount)?;
    ///     tx.update("UPDATE account SET balance = balance + :amount WHERE id = :to", &amount)?;
    ///     Ok(true)
    /// })?;
    /// assert!(committed);
    /// # Ok::<(), sqlx_named_mapper::Error>(())
    /// ```
    pub fn transaction<F, E>(&mut self, work: F) -> std::result::Result<bool, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> std::result::Result<bool, E>,
        E: From<Error> + fmt::Display,
    {
        let mut tx = self.begin()?;
        match work(&mut tx) {
            Ok(true) => {
                tx.commit()?;
                Ok(true)
            }
            Ok(false) => {
                tx.rollback()?;
                Ok(false)
            }
            Err(e) => match tx.rollback() {
                Ok(()) => Err(e),
                Err(rollback_err) => Err(Error::TransactionRollbackFailed {
                    transaction_error: e.to_string(),
                    rollback_error: rollback_err.to_string(),
                }
                .into()),
            },
        }
    }
}
