//! Transaction error types and the failure classification used by
//! rollback rules.

use std::time::Duration;

use thiserror::Error;

use crate::resource::ResourceError;

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur while managing a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Propagation MANDATORY was requested but no transaction is active.
    #[error("no existing transaction found for propagation MANDATORY")]
    NoTransaction,

    /// The operation is not valid for the current transaction state.
    #[error("illegal transaction state: {0}")]
    IllegalState(String),

    /// An outer commit found the transaction marked rollback-only by an
    /// inner participant; the physical transaction has been rolled back.
    #[error("transaction rolled back because it was marked rollback-only by a participant")]
    UnexpectedRollback,

    /// The transaction exceeded its deadline and has been rolled back.
    #[error("transaction timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Backing resource failure.
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
}

impl TransactionError {
    /// Check if the failed unit of work is worth retrying from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransactionError::UnexpectedRollback | TransactionError::Timeout { .. }
        )
    }
}

/// Error returned by [`TransactionManager::execute`], separating manager
/// failures from failures raised by the unit of work itself.
///
/// [`TransactionManager::execute`]: crate::transaction::TransactionManager::execute
#[derive(Debug, Error)]
pub enum ExecuteError<E: Failure> {
    /// The manager failed to begin or resolve the transaction.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// The unit of work failed; the transaction was resolved according to
    /// the definition's rollback rules.
    #[error("unit of work failed: {0}")]
    Application(E),
}

/// Coarse classification of a unit-of-work failure, deciding the default
/// completion when no rollback rule names the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Unexpected failure; rolls back by default.
    Unchecked,
    /// Failure that is part of the operation's contract; commits by default.
    Checked,
}

/// A failure raised by a unit of work, as seen by rollback rules.
///
/// `kinds` names the failure from most specific to most general, so a rule
/// naming a broad kind matches every failure that lists it as an ancestor.
pub trait Failure: std::error::Error {
    /// Default classification when no rule matches.
    fn class(&self) -> FailureClass {
        FailureClass::Unchecked
    }

    /// Kind names, most specific first.
    fn kinds(&self) -> &[&'static str];
}
