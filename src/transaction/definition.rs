//! Transaction definitions: propagation behavior and rollback rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transaction::error::{Failure, FailureClass};
use crate::transaction::isolation::IsolationLevel;

/// Policy governing how a logical transaction relates to an already-active
/// physical transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Propagation {
    /// Join the active transaction, or start one if none is active.
    #[default]
    Required,

    /// Always start a new physical transaction, suspending any active one.
    RequiresNew,

    /// Run within a savepoint on the active transaction, or start one if
    /// none is active. Degrades to `Required` when the resource provider
    /// lacks savepoint support.
    Nested,

    /// Join the active transaction if present, else run non-transactionally.
    Supports,

    /// Suspend any active transaction and run non-transactionally.
    NotSupported,

    /// Run non-transactionally; fail if a transaction is active.
    Never,

    /// Join the active transaction; fail if none is active.
    Mandatory,
}

/// Named failure kinds that override the default completion policy.
///
/// Rules are matched against a failure's kind chain from most specific to
/// most general; the first kind named by either list decides. With no match,
/// the failure's [`FailureClass`] decides: unchecked rolls back, checked
/// commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRules {
    rollback_for: Vec<String>,
    commit_for: Vec<String>,
}

impl RollbackRules {
    /// Create an empty rule set (default policy only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Force rollback for failures matching the given kind.
    pub fn rollback_for(mut self, kind: &str) -> Self {
        self.rollback_for.push(kind.to_string());
        self
    }

    /// Force commit for failures matching the given kind.
    pub fn commit_for(mut self, kind: &str) -> Self {
        self.commit_for.push(kind.to_string());
        self
    }

    /// Decide whether the given failure rolls the transaction back.
    pub fn should_rollback<F>(&self, failure: &F) -> bool
    where
        F: Failure + ?Sized,
    {
        for kind in failure.kinds() {
            if self.rollback_for.iter().any(|k| k == kind) {
                return true;
            }
            if self.commit_for.iter().any(|k| k == kind) {
                return false;
            }
        }
        failure.class() == FailureClass::Unchecked
    }
}

/// Everything a caller specifies about a logical transaction request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionDefinition {
    /// How to relate to an already-active transaction.
    pub propagation: Propagation,
    /// Isolation level applied when a physical transaction is started.
    pub isolation: IsolationLevel,
    /// Hint passed to the resource provider; participants inherit the
    /// owner's setting.
    pub read_only: bool,
    /// Deadline measured from physical transaction start.
    pub timeout: Option<Duration>,
    /// Failure kinds overriding the default completion policy.
    pub rollback_rules: RollbackRules,
}

impl TransactionDefinition {
    /// A default definition: `Required`, default isolation, no timeout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_rollback_rules(mut self, rules: RollbackRules) -> Self {
        self.rollback_rules = rules;
        self
    }
}
