//! Run context: cancellation and the environment adapters operate in
//!
//! The environment is built once by the composition root and shared
//! read-only for the whole run; nothing in it is mutated after startup.

use crate::fs::FileSystem;
use crate::runner::CommandRunner;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation signal
///
/// Cloning shares the signal. A [`child`](Self::child) token observes its
/// parent but can also be cancelled on its own, which is how a failed plan
/// stops its sibling checks without cancelling the whole run.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flags: Vec<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flags: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    /// Create a token cancelled by either itself or `self`
    pub fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        Self { flags }
    }

    /// Fire this token (and every child derived from it)
    pub fn cancel(&self) {
        if let Some(own) = self.flags.last() {
            own.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|f| f.load(Ordering::SeqCst))
    }

    /// Return `Err(Cancelled)` once the token has fired
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything an adapter needs from the outside world
#[derive(Clone)]
pub struct Env {
    /// Active platform identifier, e.g. "fedora" or "darwin"
    pub platform: String,
    pub runner: Arc<dyn CommandRunner>,
    pub fs: Arc<dyn FileSystem>,
    /// PATH handed to every spawned process
    pub path: String,
    /// Directory link sources are resolved against
    pub reference_dir: PathBuf,
    pub dry_run: bool,
}

impl Env {
    /// Build an environment with the PATH captured from this process
    pub fn new(
        platform: &str,
        runner: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
        reference_dir: PathBuf,
    ) -> Self {
        Self {
            platform: platform.to_string(),
            runner,
            fs,
            path: std::env::var("PATH").unwrap_or_default(),
            reference_dir,
            dry_run: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("platform", &self.platform)
            .field("reference_dir", &self.reference_dir)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}
