//! Collaborators supplied by the host application.
//!
//! The core never spawns work or touches the file system. Anything slow is described as a
//! [`DeferredWork`] value and handed to a [`WorkScheduler`]; the host runs it later by passing
//! it back to [`Editor::run_deferred`](crate::Editor::run_deferred).

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// A unit of work the core asked to have run later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredWork {
    /// Regenerate the row headers for the current scroll window.
    UpdateHeaders,
    /// Retry a reload that failed because the file was unavailable.
    ConsiderReload,
}

/// Runs [`DeferredWork`] at a time of the host's choosing.
pub trait WorkScheduler {
    /// Queue `work`. Scheduling the same work twice before it runs may be coalesced.
    fn schedule(&mut self, work: DeferredWork);
}

/// Receives coarse notifications meant for tools that derive data from the buffer.
pub trait ToolNotifier {
    /// Start a batch. Notifications until the matching [`end_deferral`](Self::end_deferral)
    /// may be coalesced.
    fn begin_deferral(&mut self);

    /// End the batch started by [`begin_deferral`](Self::begin_deferral).
    fn end_deferral(&mut self);

    /// Bytes at or after `earliest` changed.
    fn data_changed(&mut self, earliest: usize);
}

/// Where reloads get their bytes from.
pub trait FileSource {
    /// Read the current contents of `name`.
    ///
    /// `Ok(None)` means the file has not changed since it was last loaded.
    fn load(&mut self, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Read the stored metadata for `name`, in the form written by
    /// [`MemoryModel::export_metadata`](crate::MemoryModel::export_metadata).
    ///
    /// Only asked after [`load`](Self::load) returned new contents. `Ok(None)` keeps the
    /// metadata already in memory.
    fn metadata(&mut self, _name: &str) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// A [`WorkScheduler`] that records what was scheduled, for hosts that poll.
#[derive(Debug, Default, Clone)]
pub struct QueueScheduler {
    queue: Vec<DeferredWork>,
}

impl QueueScheduler {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything scheduled so far, oldest first.
    pub fn drain(&mut self) -> Vec<DeferredWork> {
        std::mem::take(&mut self.queue)
    }

    /// Returns `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl WorkScheduler for QueueScheduler {
    fn schedule(&mut self, work: DeferredWork) {
        if !self.queue.contains(&work) {
            self.queue.push(work);
        }
    }
}

impl<S: WorkScheduler> WorkScheduler for Arc<Mutex<S>> {
    fn schedule(&mut self, work: DeferredWork) {
        // a panic while the queue was held leaves it intact
        let mut scheduler = self.lock().unwrap_or_else(PoisonError::into_inner);
        scheduler.schedule(work);
    }
}
