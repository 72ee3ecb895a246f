//! Transaction manager - maps logical transactions onto physical ones.
//!
//! The TransactionManager is the main entry point. It handles:
//! - Propagation: joining, suspending, or nesting against an active transaction
//! - Rollback-only resolution at the owning commit
//! - Savepoint lifecycle for nested transactions
//! - The exception-driven completion policy for `execute`

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::resource::{ResourceProvider, Savepoint};
use crate::transaction::context::{
    ExecutionContext, SharedContext, TransactionContext, TransactionStatus,
};
use crate::transaction::definition::{Propagation, TransactionDefinition};
use crate::transaction::error::{
    ExecuteError, Failure, TransactionError, TransactionResult,
};

/// Propagation-aware transaction manager.
///
/// Thread-safe: can be shared across workers via Clone (uses Arc internally);
/// each worker threads its own [`ExecutionContext`] through the calls.
#[derive(Clone)]
pub struct TransactionManager {
    provider: Arc<dyn ResourceProvider>,
    /// Capability checked once at construction; when false, `Nested`
    /// requests degrade to plain joins.
    savepoints_supported: bool,
}

impl TransactionManager {
    /// Create a manager around the given resource provider.
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        let savepoints_supported = provider.supports_savepoints();
        if !savepoints_supported {
            warn!("resource provider lacks savepoint support; NESTED degrades to REQUIRED");
        }
        Self {
            provider,
            savepoints_supported,
        }
    }

    /// Open a logical transaction according to the definition's propagation.
    ///
    /// Returns the status handle that must later be passed to exactly one of
    /// [`commit`](Self::commit) or [`rollback`](Self::rollback).
    pub fn begin(
        &self,
        ctx: &mut ExecutionContext,
        definition: &TransactionDefinition,
    ) -> TransactionResult<TransactionStatus> {
        if let Some(shared) = ctx.current() {
            return self.begin_in_existing(ctx, definition, shared);
        }

        match definition.propagation {
            Propagation::Mandatory => Err(TransactionError::NoTransaction),
            Propagation::Supports | Propagation::NotSupported | Propagation::Never => {
                debug!(
                    "no active transaction; proceeding non-transactionally ({:?})",
                    definition.propagation
                );
                Ok(TransactionStatus::none(None))
            }
            _ => self.start_new(ctx, definition, None),
        }
    }

    /// Resolve a logical transaction as successful.
    ///
    /// Only the status that created the physical transaction commits it; a
    /// participant commit is a depth decrement, and a savepoint commit is a
    /// savepoint release. A rollback-only mark left by a participant converts
    /// the owning commit into a rollback surfaced as
    /// [`TransactionError::UnexpectedRollback`].
    pub fn commit(
        &self,
        ctx: &mut ExecutionContext,
        status: &mut TransactionStatus,
    ) -> TransactionResult<()> {
        if status.is_completed() {
            return Err(TransactionError::IllegalState(
                "commit called on an already-completed transaction".to_string(),
            ));
        }
        status.mark_completed();

        let Some(shared) = status.context.clone() else {
            self.resume(ctx, status);
            return Ok(());
        };

        if let Some(savepoint) = status.savepoint() {
            return self.resolve_savepoint(&shared, &savepoint, false);
        }

        if !status.is_new_transaction() {
            let mut guard = shared.lock();
            guard.leave();
            debug!("participant committed; {} stays open", guard.id());
            return Ok(());
        }

        let result = self.resolve_owner_commit(&shared);
        ctx.clear();
        self.resume(ctx, status);
        result
    }

    /// Resolve a logical transaction as failed.
    ///
    /// The owner rolls the physical transaction back immediately; a
    /// participant only marks the shared context rollback-only, deferring the
    /// physical rollback to the owner's completion; a savepoint status rolls
    /// back to its savepoint, leaving the outer transaction untouched.
    pub fn rollback(
        &self,
        ctx: &mut ExecutionContext,
        status: &mut TransactionStatus,
    ) -> TransactionResult<()> {
        if status.is_completed() {
            return Err(TransactionError::IllegalState(
                "rollback called on an already-completed transaction".to_string(),
            ));
        }
        status.mark_completed();

        let Some(shared) = status.context.clone() else {
            self.resume(ctx, status);
            return Ok(());
        };

        if let Some(savepoint) = status.savepoint() {
            return self.resolve_savepoint(&shared, &savepoint, true);
        }

        if !status.is_new_transaction() {
            let mut guard = shared.lock();
            guard.set_rollback_only();
            guard.leave();
            debug!("participant requested rollback; {} marked rollback-only", guard.id());
            return Ok(());
        }

        let result = {
            let mut guard = shared.lock();
            self.finish_rollback(&mut guard)
        };
        ctx.clear();
        self.resume(ctx, status);
        result
    }

    /// Run a unit of work in a transaction opened per the definition.
    ///
    /// On success the transaction commits. On failure the definition's
    /// rollback rules decide the completion: unchecked failures roll back by
    /// default, checked failures commit unless a rule names their kind. The
    /// work failure is surfaced either way, unless resolving the transaction
    /// itself fails.
    pub fn execute<T, E, F>(
        &self,
        ctx: &mut ExecutionContext,
        definition: &TransactionDefinition,
        work: F,
    ) -> Result<T, ExecuteError<E>>
    where
        E: Failure,
        F: FnOnce(&mut ExecutionContext) -> Result<T, E>,
    {
        let mut status = self.begin(ctx, definition)?;

        match work(ctx) {
            Ok(value) => {
                self.commit(ctx, &mut status)?;
                Ok(value)
            }
            Err(failure) => {
                if definition.rollback_rules.should_rollback(&failure) {
                    debug!("unit of work failed ({}); rolling back", failure);
                    self.rollback(ctx, &mut status)?;
                } else {
                    debug!("unit of work failed ({}); committing per rollback rules", failure);
                    self.commit(ctx, &mut status)?;
                }
                Err(ExecuteError::Application(failure))
            }
        }
    }

    /// Open a logical transaction while another physical one is active.
    fn begin_in_existing(
        &self,
        ctx: &mut ExecutionContext,
        definition: &TransactionDefinition,
        shared: SharedContext,
    ) -> TransactionResult<TransactionStatus> {
        match definition.propagation {
            Propagation::Required | Propagation::Supports | Propagation::Mandatory => {
                let mut guard = shared.lock();
                guard.enter();
                debug!("joining transaction {} at depth {}", guard.id(), guard.depth());
                drop(guard);
                Ok(TransactionStatus::participant(shared))
            }
            Propagation::RequiresNew => {
                let suspended = ctx.take();
                debug!("suspending active transaction for REQUIRES_NEW");
                self.start_new(ctx, definition, suspended)
            }
            Propagation::Nested if self.savepoints_supported => {
                let savepoint = {
                    let mut guard = shared.lock();
                    let savepoint = guard.connection()?.create_savepoint()?;
                    guard.push_savepoint(savepoint);
                    savepoint
                };
                debug!("created savepoint {} for nested transaction", savepoint.ordinal());
                Ok(TransactionStatus::nested(shared, savepoint))
            }
            Propagation::Nested => {
                // Degraded at configuration time.
                shared.lock().enter();
                Ok(TransactionStatus::participant(shared))
            }
            Propagation::NotSupported => {
                let suspended = ctx.take();
                debug!("suspending active transaction for NOT_SUPPORTED");
                Ok(TransactionStatus::none(suspended))
            }
            Propagation::Never => Err(TransactionError::IllegalState(
                "existing transaction found for propagation NEVER".to_string(),
            )),
        }
    }

    /// Start a physical transaction and install it in the execution context.
    fn start_new(
        &self,
        ctx: &mut ExecutionContext,
        definition: &TransactionDefinition,
        suspended: Option<SharedContext>,
    ) -> TransactionResult<TransactionStatus> {
        let connection = self
            .provider
            .acquire(definition.isolation, definition.read_only)?;
        let context = TransactionContext::new(connection, definition.timeout);
        debug!(
            "started physical transaction {} ({}, read_only={})",
            context.id(),
            definition.isolation,
            definition.read_only
        );
        let shared: SharedContext = Arc::new(Mutex::new(context));
        ctx.install(shared.clone());
        Ok(TransactionStatus::new_transaction(shared, suspended))
    }

    /// Resolve a savepoint-backed completion.
    ///
    /// On a resource failure the surrounding physical transaction is marked
    /// rollback-only before the error surfaces: nested work left in an
    /// unknown state must never reach the owner's commit.
    fn resolve_savepoint(
        &self,
        shared: &SharedContext,
        savepoint: &Savepoint,
        roll_back: bool,
    ) -> TransactionResult<()> {
        let mut guard = shared.lock();
        let result = (|| -> TransactionResult<()> {
            let conn = guard.connection()?;
            if roll_back {
                conn.rollback_to_savepoint(savepoint)?;
            }
            conn.release_savepoint(savepoint)?;
            Ok(())
        })();
        guard.drop_savepoint(savepoint);
        match result {
            Ok(()) => {
                if roll_back {
                    debug!(
                        "rolled back to savepoint {} on {}",
                        savepoint.ordinal(),
                        guard.id()
                    );
                } else {
                    debug!(
                        "released savepoint {} on {}",
                        savepoint.ordinal(),
                        guard.id()
                    );
                }
                Ok(())
            }
            Err(e) => {
                warn!(
                    "savepoint {} failed to resolve on {}; marking rollback-only",
                    savepoint.ordinal(),
                    guard.id()
                );
                guard.set_rollback_only();
                Err(e)
            }
        }
    }

    /// Physically resolve an owning commit.
    fn resolve_owner_commit(&self, shared: &SharedContext) -> TransactionResult<()> {
        let mut context = shared.lock();

        if context.is_rollback_only() {
            warn!(
                "commit on {} converted to rollback (marked rollback-only)",
                context.id()
            );
            self.finish_rollback(&mut context)?;
            return Err(TransactionError::UnexpectedRollback);
        }

        if context.deadline_exceeded() {
            let elapsed = context.elapsed();
            warn!("transaction {} exceeded its deadline; rolling back", context.id());
            self.finish_rollback(&mut context)?;
            return Err(TransactionError::Timeout { elapsed });
        }

        match context.connection()?.commit_physical() {
            Ok(()) => {
                context.mark_committed();
                debug!("physically committed {}", context.id());
                self.release_connection(&mut context);
                Ok(())
            }
            Err(e) => {
                // A failed commit never leaves the context active; the
                // commit failure is what the caller sees.
                if let Ok(conn) = context.connection() {
                    if let Err(rollback_err) = conn.rollback_physical() {
                        warn!("rollback after failed commit also failed: {}", rollback_err);
                    }
                }
                context.mark_rolled_back();
                self.release_connection(&mut context);
                Err(TransactionError::Resource(e))
            }
        }
    }

    /// Physically roll back and release, marking the context terminal even
    /// when the resource call fails.
    fn finish_rollback(&self, context: &mut TransactionContext) -> TransactionResult<()> {
        let result = context.connection()?.rollback_physical();
        context.mark_rolled_back();
        debug!("physically rolled back {}", context.id());
        self.release_connection(context);
        result.map_err(TransactionError::from)
    }

    fn release_connection(&self, context: &mut TransactionContext) {
        if let Some(connection) = context.take_connection() {
            self.provider.release(connection);
        }
    }

    /// Reinstall a context suspended by REQUIRES_NEW or NOT_SUPPORTED.
    fn resume(&self, ctx: &mut ExecutionContext, status: &mut TransactionStatus) {
        if let Some(outer) = status.suspended.take() {
            debug!("resuming suspended transaction");
            ctx.install(outer);
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("savepoints_supported", &self.savepoints_supported)
            .finish()
    }
}
