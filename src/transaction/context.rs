//! Physical transaction contexts and logical transaction handles.
//!
//! A [`TransactionContext`] is the physical transaction: it owns the backing
//! connection and is created once per execution context when the first
//! transactional call arrives. Every logical transaction opened while it is
//! active gets a [`TransactionStatus`] pointing at it; only the status that
//! created the context (`is_new_transaction`) resolves it physically.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ulid::Ulid;

use crate::resource::{Connection, Savepoint};
use crate::transaction::error::{TransactionError, TransactionResult};

/// Shared handle to a physical transaction context.
///
/// Single-owner discipline per execution context means the lock is never
/// contended; it exists so participant statuses can mark the owner's context
/// rollback-only.
pub type SharedContext = Arc<Mutex<TransactionContext>>;

/// Lifecycle state of a physical transaction.
///
/// `Active` may carry a rollback-only mark before the owning commit resolves
/// it; `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

/// A physical transaction: the one resource-level transaction actually
/// committed or rolled back against the backing store.
pub struct TransactionContext {
    /// Unique context ID.
    id: String,
    /// Exclusively-owned connection; taken when resources are released.
    connection: Option<Box<dyn Connection>>,
    state: TxState,
    /// Set by a participant rollback; resolved by the owner's commit.
    rollback_only: bool,
    /// Number of logical participants currently joined beyond the owner.
    depth: usize,
    /// Pending savepoints, in creation order.
    savepoints: Vec<Savepoint>,
    /// When the transaction started.
    started_at: chrono::DateTime<chrono::Utc>,
    begun: Instant,
    deadline: Option<Instant>,
}

impl TransactionContext {
    /// Create a context around a freshly acquired connection.
    pub(crate) fn new(connection: Box<dyn Connection>, timeout: Option<Duration>) -> Self {
        let begun = Instant::now();
        Self {
            id: Ulid::new().to_string().to_lowercase(),
            connection: Some(connection),
            state: TxState::Active,
            rollback_only: false,
            depth: 0,
            savepoints: Vec::new(),
            started_at: chrono::Utc::now(),
            begun,
            deadline: timeout.map(|t| begun + t),
        }
    }

    /// Get the context ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the lifecycle state.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Check whether a participant has forced eventual rollback.
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// When the transaction started.
    pub fn started_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at
    }

    /// Time elapsed since the physical transaction began.
    pub fn elapsed(&self) -> Duration {
        self.begun.elapsed()
    }

    pub(crate) fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub(crate) fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() > d)
    }

    /// Register another logical participant.
    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    /// A logical participant completed.
    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Number of logical participants currently joined beyond the owner.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Borrow the owned connection, failing if resources were released.
    pub(crate) fn connection(&mut self) -> TransactionResult<&mut dyn Connection> {
        match self.connection.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(TransactionError::IllegalState(format!(
                "transaction {} has already released its connection",
                self.id
            ))),
        }
    }

    /// Take the connection for return to the provider. Terminal.
    pub(crate) fn take_connection(&mut self) -> Option<Box<dyn Connection>> {
        self.connection.take()
    }

    pub(crate) fn push_savepoint(&mut self, savepoint: Savepoint) {
        self.savepoints.push(savepoint);
    }

    /// Drop the given savepoint and everything created after it.
    pub(crate) fn drop_savepoint(&mut self, savepoint: &Savepoint) {
        if let Some(pos) = self.savepoints.iter().position(|s| s == savepoint) {
            self.savepoints.truncate(pos);
        }
    }

    /// Number of savepoints created and not yet resolved.
    pub fn pending_savepoints(&self) -> usize {
        self.savepoints.len()
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TxState::Committed;
    }

    pub(crate) fn mark_rolled_back(&mut self) {
        self.state = TxState::RolledBack;
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("rollback_only", &self.rollback_only)
            .field("depth", &self.depth)
            .field("pending_savepoints", &self.savepoints.len())
            .finish()
    }
}

/// The per-worker execution context: holds the currently active physical
/// transaction, threaded explicitly through calls by the caller.
///
/// Never share one across workers; each concurrent call stack owns its own.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    current: Option<SharedContext>,
}

impl ExecutionContext {
    /// Create an execution context with no active transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a physical transaction is active in this context.
    pub fn in_transaction(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn current(&self) -> Option<SharedContext> {
        self.current.clone()
    }

    pub(crate) fn install(&mut self, context: SharedContext) {
        self.current = Some(context);
    }

    /// Detach the active context for suspension.
    pub(crate) fn take(&mut self) -> Option<SharedContext> {
        self.current.take()
    }

    pub(crate) fn clear(&mut self) {
        self.current = None;
    }
}

/// A logical transaction handle: one `begin`/`commit`-or-`rollback` pair
/// issued by application code.
///
/// Multiple statuses may share one physical context; exactly one of them has
/// `is_new_transaction` set and it alone drives the physical resolution.
pub struct TransactionStatus {
    pub(crate) context: Option<SharedContext>,
    is_new_transaction: bool,
    savepoint: Option<Savepoint>,
    completed: bool,
    /// Outer context to reinstall once this logical transaction completes.
    pub(crate) suspended: Option<SharedContext>,
}

impl TransactionStatus {
    /// Status for the logical transaction that created the physical one.
    pub(crate) fn new_transaction(
        context: SharedContext,
        suspended: Option<SharedContext>,
    ) -> Self {
        Self {
            context: Some(context),
            is_new_transaction: true,
            savepoint: None,
            completed: false,
            suspended,
        }
    }

    /// Status for a logical transaction joining an existing physical one.
    pub(crate) fn participant(context: SharedContext) -> Self {
        Self {
            context: Some(context),
            is_new_transaction: false,
            savepoint: None,
            completed: false,
            suspended: None,
        }
    }

    /// Status for a nested logical transaction backed by a savepoint.
    pub(crate) fn nested(context: SharedContext, savepoint: Savepoint) -> Self {
        Self {
            context: Some(context),
            is_new_transaction: false,
            savepoint: Some(savepoint),
            completed: false,
            suspended: None,
        }
    }

    /// Status for a call running without any transaction.
    pub(crate) fn none(suspended: Option<SharedContext>) -> Self {
        Self {
            context: None,
            is_new_transaction: false,
            savepoint: None,
            completed: false,
            suspended,
        }
    }

    /// True only if this logical call created the physical transaction.
    pub fn is_new_transaction(&self) -> bool {
        self.is_new_transaction
    }

    /// Whether commit or rollback has already been called on this status.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether this logical call runs inside a physical transaction at all.
    pub fn has_transaction(&self) -> bool {
        self.context.is_some()
    }

    /// Whether this logical transaction is backed by a savepoint.
    pub fn has_savepoint(&self) -> bool {
        self.savepoint.is_some()
    }

    pub(crate) fn savepoint(&self) -> Option<Savepoint> {
        self.savepoint
    }

    /// Force the owning physical transaction to eventually roll back,
    /// without raising an error here. No-op outside a transaction.
    pub fn set_rollback_only(&self) {
        if let Some(context) = &self.context {
            context.lock().set_rollback_only();
        }
    }

    /// Check the rollback-only mark on the owning physical transaction.
    pub fn is_rollback_only(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|c| c.lock().is_rollback_only())
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }
}

impl std::fmt::Debug for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStatus")
            .field("is_new_transaction", &self.is_new_transaction)
            .field("has_transaction", &self.has_transaction())
            .field("has_savepoint", &self.has_savepoint())
            .field("completed", &self.completed)
            .finish()
    }
}
