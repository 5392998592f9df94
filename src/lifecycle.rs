//! Ownership of temporary artifacts.
//!
//! Every artifact is registered here before it touches disk and removed
//! after its run. `cleanup_all` is wired to termination signals and panics
//! so nothing outlives the process.

use std::fs;
use std::io;
use std::panic;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::LifecycleError;
use crate::logger;
use crate::state::Artifact;

/// Exit status used when a termination signal interrupts a run.
pub const SIGNAL_EXIT_CODE: i32 = 130;

pub type Flush = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct ArtifactTracker {
    inner: Arc<Mutex<Vec<Artifact>>>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere must not stop cleanup.
    fn lock(&self) -> MutexGuard<'_, Vec<Artifact>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn track(&self, artifact: Artifact) {
        let mut tracked = self.lock();
        if !tracked.contains(&artifact) {
            tracked.push(artifact);
        }
    }

    /// Tracks `artifact` and runs `write` under the same lock, so a
    /// concurrent `cleanup_all` waits for the file to land and then removes
    /// it. A failed write leaves nothing behind.
    pub fn create(
        &self,
        artifact: &Artifact,
        write: impl FnOnce(&Path) -> io::Result<()>,
    ) -> io::Result<()> {
        let mut tracked = self.lock();
        if !tracked.contains(artifact) {
            tracked.push(artifact.clone());
        }

        let Err(e) = write(&artifact.path) else {
            return Ok(());
        };
        let removed = match fs::remove_file(&artifact.path) {
            Ok(()) => true,
            Err(r) => r.kind() == io::ErrorKind::NotFound,
        };
        if removed {
            tracked.retain(|a| a != artifact);
        }
        Err(e)
    }

    pub fn tracked(&self) -> Vec<Artifact> {
        self.lock().clone()
    }

    /// Removes the file and forgets it. A file that is already gone counts
    /// as removed; any other failure keeps it tracked for `cleanup_all`.
    pub fn cleanup(&self, artifact: &Artifact) -> bool {
        debug!(target: logger::RUNNER, path = %artifact.path.display(), "cleaning up temporary file");

        match fs::remove_file(&artifact.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(target: logger::RUNNER, path = %artifact.path.display(), "could not remove temporary file: {e}");
                return false;
            }
        }

        self.lock().retain(|a| a != artifact);
        true
    }

    /// Returns how many artifacts could not be removed.
    pub fn cleanup_all(&self) -> usize {
        let pending = self.tracked();
        pending.iter().filter(|a| !self.cleanup(a)).count()
    }

    pub fn flush_fn(&self) -> Flush {
        let tracker = self.clone();
        Arc::new(move || {
            tracker.cleanup_all();
        })
    }

    pub fn register_with(&self, hooks: &dyn TerminationHooks) -> Result<(), LifecycleError> {
        hooks.register(self.flush_fn())
    }

    /// Runs `cleanup_all` when dropped, including during unwinding.
    pub fn guard(&self) -> CleanupGuard {
        CleanupGuard {
            tracker: self.clone(),
        }
    }
}

pub struct CleanupGuard {
    tracker: ArtifactTracker,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let left = self.tracker.cleanup_all();
        if left > 0 {
            warn!(target: logger::RUNNER, left, "temporary files could not be removed");
        }
    }
}

/// Where the process-level "we are going away" callbacks come from.
pub trait TerminationHooks {
    fn register(&self, flush: Flush) -> Result<(), LifecycleError>;
}

/// SIGINT/SIGTERM/SIGHUP via `ctrlc`, plus a chained panic hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessHooks;

impl TerminationHooks for ProcessHooks {
    fn register(&self, flush: Flush) -> Result<(), LifecycleError> {
        let on_panic = Arc::clone(&flush);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            on_panic();
            previous(info);
        }));

        ctrlc::set_handler(move || {
            flush();
            std::process::exit(SIGNAL_EXIT_CODE);
        })?;

        Ok(())
    }
}
