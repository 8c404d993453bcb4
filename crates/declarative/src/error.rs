//! Error types for the reconciliation engine
//!
//! Every failure a step can hit is wrapped with the step name before it
//! leaves the engine, so observers never have to guess which unit broke.

use std::path::PathBuf;
use thiserror::Error;

/// Which side of the install action a hook runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Before,
    After,
}

impl HookPhase {
    /// Label used in progress events
    pub fn label(self) -> &'static str {
        match self {
            Self::Before => "Running Pre-hooks",
            Self::After => "Running Post-hooks",
        }
    }
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Before => write!(f, "pre-hook"),
            Self::After => write!(f, "post-hook"),
        }
    }
}

/// Errors produced while planning or executing a manifest
#[derive(Debug, Error)]
pub enum Error {
    /// The instruction names an adapter nobody registered
    #[error("no manager found for {0}")]
    UnknownAdapter(String),

    /// The run's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// The external program could not be started at all
    #[error("failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program ran and exited unsuccessfully
    #[error("command exited with {status}: {command}")]
    CommandFailed { command: String, status: String },

    /// The instruction lacks a field its adapter needs
    #[error("{adapter} manager requires a '{field}' field")]
    MissingField {
        adapter: &'static str,
        field: &'static str,
    },

    /// A filesystem operation failed
    #[error("{action} failed for {}: {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The environment could not be resolved (home directory, reference dir)
    #[error("environment error: {0}")]
    Environment(String),

    /// Manifest could not be read
    #[error("could not read manifest {}: {source}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest could not be parsed
    #[error("invalid manifest {}: {message}", .path.display())]
    ManifestParse { path: PathBuf, message: String },

    /// A step's check or install action failed
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<Error>,
    },

    /// A step's before/after hook failed
    #[error("step '{step}' {phase} failed: {source}")]
    Hook {
        step: String,
        phase: HookPhase,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the name of the step it belongs to
    pub fn in_step(self, step: &str) -> Self {
        Self::Step {
            step: step.to_string(),
            source: Box::new(self),
        }
    }

    /// Wrap a hook failure with the step name and phase
    pub fn in_hook(self, step: &str, phase: HookPhase) -> Self {
        Self::Hook {
            step: step.to_string(),
            phase,
            source: Box::new(self),
        }
    }

    /// Whether this error (or anything it wraps) is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Step { source, .. } | Self::Hook { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Whether a failed existence query should count as "absent"
    ///
    /// A query that ran and exited non-zero, or whose binary is missing,
    /// is indistinguishable from the unit not being installed.
    pub fn is_absence(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::CommandFailed { .. })
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
