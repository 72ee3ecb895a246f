//! In-memory recording resource provider for tests.
//!
//! Records every physical effect in order so tests can assert exactly what
//! reached the backing store, and nothing else.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::resource::{Connection, ResourceError, ResourceProvider, ResourceResult, Savepoint};
use crate::transaction::error::{Failure, FailureClass};
use crate::transaction::isolation::IsolationLevel;

/// A physical effect observed at the resource layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhysicalEvent {
    Acquire,
    Commit,
    Rollback,
    SavepointCreated(u64),
    SavepointReleased(u64),
    SavepointRolledBack(u64),
    Release,
}

/// Provider whose connections log every physical call.
pub(crate) struct RecordingProvider {
    events: Arc<Mutex<Vec<PhysicalEvent>>>,
    savepoints_supported: bool,
    fail_commit: bool,
    fail_rollback: bool,
    fail_savepoint_resolve: bool,
}

impl RecordingProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Arc::new(Mutex::new(Vec::new())),
            savepoints_supported: true,
            fail_commit: false,
            fail_rollback: false,
            fail_savepoint_resolve: false,
        })
    }

    /// A provider that reports no savepoint capability.
    pub(crate) fn without_savepoints() -> Arc<Self> {
        Arc::new(Self {
            savepoints_supported: false,
            ..Self::detached()
        })
    }

    /// A provider whose connections fail every physical commit.
    pub(crate) fn failing_commit() -> Arc<Self> {
        Arc::new(Self {
            fail_commit: true,
            ..Self::detached()
        })
    }

    /// A provider whose connections fail commit and rollback both.
    pub(crate) fn failing_commit_and_rollback() -> Arc<Self> {
        Arc::new(Self {
            fail_commit: true,
            fail_rollback: true,
            ..Self::detached()
        })
    }

    /// A provider whose connections create savepoints fine but fail to
    /// release or roll back to them.
    pub(crate) fn failing_savepoint_resolve() -> Arc<Self> {
        Arc::new(Self {
            fail_savepoint_resolve: true,
            ..Self::detached()
        })
    }

    fn detached() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            savepoints_supported: true,
            fail_commit: false,
            fail_rollback: false,
            fail_savepoint_resolve: false,
        }
    }

    /// Snapshot of all physical effects so far, in order.
    pub(crate) fn events(&self) -> Vec<PhysicalEvent> {
        self.events.lock().clone()
    }

    /// Acquire without going through the trait object.
    pub(crate) fn acquire_raw(
        &self,
        isolation: IsolationLevel,
        read_only: bool,
    ) -> ResourceResult<Box<dyn Connection>> {
        let _ = (isolation, read_only);
        self.events.lock().push(PhysicalEvent::Acquire);
        Ok(Box::new(RecordingConnection {
            events: self.events.clone(),
            next_savepoint: 0,
            fail_commit: self.fail_commit,
            fail_rollback: self.fail_rollback,
            fail_savepoint_resolve: self.fail_savepoint_resolve,
        }))
    }
}

impl ResourceProvider for RecordingProvider {
    fn acquire(
        &self,
        isolation: IsolationLevel,
        read_only: bool,
    ) -> ResourceResult<Box<dyn Connection>> {
        self.acquire_raw(isolation, read_only)
    }

    fn release(&self, _connection: Box<dyn Connection>) {
        self.events.lock().push(PhysicalEvent::Release);
    }

    fn supports_savepoints(&self) -> bool {
        self.savepoints_supported
    }
}

struct RecordingConnection {
    events: Arc<Mutex<Vec<PhysicalEvent>>>,
    next_savepoint: u64,
    fail_commit: bool,
    fail_rollback: bool,
    fail_savepoint_resolve: bool,
}

impl Connection for RecordingConnection {
    fn commit_physical(&mut self) -> ResourceResult<()> {
        if self.fail_commit {
            return Err(ResourceError::Commit("injected commit failure".to_string()));
        }
        self.events.lock().push(PhysicalEvent::Commit);
        Ok(())
    }

    fn rollback_physical(&mut self) -> ResourceResult<()> {
        if self.fail_rollback {
            return Err(ResourceError::Rollback(
                "injected rollback failure".to_string(),
            ));
        }
        self.events.lock().push(PhysicalEvent::Rollback);
        Ok(())
    }

    fn create_savepoint(&mut self) -> ResourceResult<Savepoint> {
        self.next_savepoint += 1;
        self.events
            .lock()
            .push(PhysicalEvent::SavepointCreated(self.next_savepoint));
        Ok(Savepoint::new(self.next_savepoint))
    }

    fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> ResourceResult<()> {
        if self.fail_savepoint_resolve {
            return Err(ResourceError::Savepoint(
                "injected savepoint failure".to_string(),
            ));
        }
        self.events
            .lock()
            .push(PhysicalEvent::SavepointRolledBack(savepoint.ordinal()));
        Ok(())
    }

    fn release_savepoint(&mut self, savepoint: &Savepoint) -> ResourceResult<()> {
        if self.fail_savepoint_resolve {
            return Err(ResourceError::Savepoint(
                "injected savepoint failure".to_string(),
            ));
        }
        self.events
            .lock()
            .push(PhysicalEvent::SavepointReleased(savepoint.ordinal()));
        Ok(())
    }
}

/// Unit-of-work failure with an explicit class and kind chain.
#[derive(Debug, Error)]
#[error("{name}")]
pub(crate) struct WorkFailure {
    name: &'static str,
    class: FailureClass,
    kinds: Vec<&'static str>,
}

impl WorkFailure {
    pub(crate) fn unchecked(name: &'static str) -> Self {
        Self {
            name,
            class: FailureClass::Unchecked,
            kinds: vec![name],
        }
    }

    pub(crate) fn checked(name: &'static str) -> Self {
        Self {
            name,
            class: FailureClass::Checked,
            kinds: vec![name],
        }
    }

    pub(crate) fn checked_with_kinds(name: &'static str, kinds: &[&'static str]) -> Self {
        Self {
            name,
            class: FailureClass::Checked,
            kinds: kinds.to_vec(),
        }
    }
}

impl Failure for WorkFailure {
    fn class(&self) -> FailureClass {
        self.class
    }

    fn kinds(&self) -> &[&'static str] {
        &self.kinds
    }
}
