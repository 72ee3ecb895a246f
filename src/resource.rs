//! Backing resource abstraction.
//!
//! The manager never talks to a database directly; it drives a
//! [`ResourceProvider`] that hands out [`Connection`] handles. A connection is
//! exclusively owned by the physical transaction that acquired it and is
//! returned to the provider when that transaction resolves.

use thiserror::Error;

use crate::transaction::IsolationLevel;

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors raised by the backing resource provider or its connections.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The provider could not hand out a connection.
    #[error("failed to acquire connection: {0}")]
    Acquisition(String),

    /// The physical commit against the backing store failed.
    #[error("physical commit failed: {0}")]
    Commit(String),

    /// The physical rollback against the backing store failed.
    #[error("physical rollback failed: {0}")]
    Rollback(String),

    /// A savepoint could not be created, released, or rolled back to.
    #[error("savepoint operation failed: {0}")]
    Savepoint(String),
}

/// Opaque handle to a savepoint created on a connection.
///
/// Savepoints are ordered: rolling back to one invalidates every savepoint
/// created after it on the same connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Savepoint(u64);

impl Savepoint {
    /// Create a savepoint handle with the given ordinal.
    pub fn new(ordinal: u64) -> Self {
        Self(ordinal)
    }

    /// The ordinal position of this savepoint on its connection.
    pub fn ordinal(&self) -> u64 {
        self.0
    }
}

/// A resource-level transaction handle.
///
/// Implementations wrap whatever the backing store calls a session or
/// connection. All methods are blocking.
pub trait Connection: Send {
    /// Commit the underlying resource transaction.
    fn commit_physical(&mut self) -> ResourceResult<()>;

    /// Roll back the underlying resource transaction.
    fn rollback_physical(&mut self) -> ResourceResult<()>;

    /// Create a savepoint at the current point in the transaction.
    fn create_savepoint(&mut self) -> ResourceResult<Savepoint>;

    /// Roll back all work performed after the given savepoint.
    fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> ResourceResult<()>;

    /// Release the given savepoint, keeping the work performed after it.
    fn release_savepoint(&mut self, savepoint: &Savepoint) -> ResourceResult<()>;
}

/// Source of connections for physical transactions.
///
/// Injected into the manager at construction. Thread-safe so one provider can
/// back many workers, each with its own execution context.
pub trait ResourceProvider: Send + Sync {
    /// Acquire a connection with a resource transaction already begun.
    fn acquire(
        &self,
        isolation: IsolationLevel,
        read_only: bool,
    ) -> ResourceResult<Box<dyn Connection>>;

    /// Return a connection to the provider after its transaction resolved.
    fn release(&self, connection: Box<dyn Connection>);

    /// Whether connections from this provider support savepoints.
    ///
    /// Checked once at manager construction; providers answering `false` get
    /// nested transaction requests degraded to plain joins.
    fn supports_savepoints(&self) -> bool {
        true
    }
}
