use std::sync::{Mutex, PoisonError};

use crate::command::{Command, CommandName, Reply};
use crate::error::StoreResult;
use crate::traits::CommandStore;

/// A store wrapper that logs every command before forwarding it.
///
/// Used to assert round-trip counts: one logged command is one round trip.
pub struct RecordingStore<S> {
    inner: S,
    log: Mutex<Vec<Command>>,
}

impl<S: CommandStore> RecordingStore<S> {
    /// Wrap `inner`, starting with an empty log.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Every command executed so far, oldest first.
    pub fn commands(&self) -> Vec<Command> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Names of the commands executed so far.
    pub fn command_names(&self) -> Vec<CommandName> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.name)
            .collect()
    }

    /// Number of commands executed since creation or the last reset.
    pub fn count(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Clear the log.
    pub fn reset(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl<S: CommandStore> CommandStore for RecordingStore<S> {
    fn execute(&self, command: &Command) -> StoreResult<Reply> {
        tracing::trace!(%command, "recording command");
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());
        self.inner.execute(command)
    }
}

impl<S> std::fmt::Debug for RecordingStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let recorded = self.log.lock().map(|log| log.len()).unwrap_or_default();
        f.debug_struct("RecordingStore")
            .field("recorded", &recorded)
            .finish()
    }
}
