//! txflow - A Propagation-Aware Transaction Manager
//!
//! This crate maps logical transactions issued by application code onto
//! physical transactions against a backing resource: nested calls with
//! propagation `Required` share one physical transaction, `RequiresNew`
//! suspends and starts a fresh one, and `Nested` runs inside a savepoint.
//! A participant rollback marks the shared transaction rollback-only; the
//! owning commit then rolls back and surfaces `UnexpectedRollback`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use txflow::transaction::{ExecutionContext, TransactionDefinition, TransactionManager};
//!
//! # fn provider() -> Arc<dyn txflow::resource::ResourceProvider> { unimplemented!() }
//! let manager = TransactionManager::new(provider());
//! let mut ctx = ExecutionContext::new();
//! let mut status = manager.begin(&mut ctx, &TransactionDefinition::new()).unwrap();
//! manager.commit(&mut ctx, &mut status).unwrap();
//! ```

pub mod resource;
pub mod transaction;
