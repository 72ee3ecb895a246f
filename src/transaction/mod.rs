//! Propagation-aware transaction management.
//!
//! Each logical transaction (one `begin`/`commit`-or-`rollback` pair) is
//! mapped onto either a new physical transaction or a participant in an
//! already-open one, according to the definition's propagation behavior.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionManager                        │
//! │   (propagation, rollback-only resolution, savepoints)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ Transaction │       │ Transaction │       │  Execution  │
//!  │   Status    │──────▶│   Context   │◀──────│   Context   │
//!  │  (logical)  │       │ (physical)  │       │ (per worker)│
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use txflow::transaction::{
//!     ExecutionContext, Propagation, TransactionDefinition, TransactionManager,
//! };
//!
//! let manager = TransactionManager::new(provider);
//! let mut ctx = ExecutionContext::new();
//!
//! // Begin a transaction
//! let mut status = manager.begin(&mut ctx, &TransactionDefinition::new())?;
//! assert!(status.is_new_transaction());
//!
//! // A nested call with the same definition joins it
//! let mut inner = manager.begin(&mut ctx, &TransactionDefinition::new())?;
//! manager.commit(&mut ctx, &mut inner)?; // no physical effect
//!
//! // Only the outermost commit touches the resource
//! manager.commit(&mut ctx, &mut status)?;
//! ```

mod context;
mod definition;
mod error;
mod isolation;
mod manager;

#[cfg(test)]
pub(crate) mod support;

pub use context::{ExecutionContext, TransactionContext, TransactionStatus, TxState};
pub use definition::{Propagation, RollbackRules, TransactionDefinition};
pub use error::{
    ExecuteError, Failure, FailureClass, TransactionError, TransactionResult,
};
pub use isolation::IsolationLevel;
pub use manager::TransactionManager;
