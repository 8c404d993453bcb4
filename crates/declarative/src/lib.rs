//! # Declarative
//!
//! A reconciliation engine for machine setup manifests.
//!
//! A [`Manifest`] declares stages of steps, each with per-platform
//! [`Instruction`]s. The [`Engine`] answers two questions per step: is it
//! already satisfied, and if not, how to make it so.
//!
//! ## Core Concepts
//!
//! - **Plan**: concurrent, read-only existence checks over a bounded pool
//! - **Execute**: strictly sequential remediation, stopping at the first failure
//! - **Adapter**: one backend (shell, dnf/apt/brew, cargo, symlink)
//! - **ProgressEvent**: the stream an observer renders while either phase runs
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{CancelToken, Engine, Env, Manifest, RealFs, Registry, SystemRunner};
//! use std::sync::{Arc, mpsc};
//!
//! let manifest = Manifest::from_path("packages.yaml".as_ref())?;
//! let env = Env::new("fedora", Arc::new(SystemRunner), Arc::new(RealFs), "..".into());
//! let engine = Engine::new(env, Registry::with_builtin());
//!
//! let cancel = CancelToken::new();
//! let (tx, rx) = mpsc::channel();
//! let planned = engine.plan(&manifest, &cancel, &tx)?;
//! drop(tx);
//! for event in rx {
//!     println!("{} {} {}", event.stage, event.step, event.status);
//! }
//!
//! let (tx, _rx) = mpsc::channel();
//! engine.execute(&planned, &cancel, &tx)?;
//! ```
//!
//! ## Strategy Traits
//!
//! Side effects go through injected strategies so a dry run is chosen once
//! at composition time:
//!
//! - [`CommandRunner`]: spawns external programs ([`SystemRunner`], [`DryRunRunner`])
//! - [`FileSystem`]: symlink operations ([`RealFs`], [`DryRunFs`])
//! - [`Adapter`]: per-backend check and install logic, looked up in a [`Registry`]

pub mod adapter;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fs;
pub mod manifest;
pub mod planner;
pub mod runner;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types at crate root
pub use adapter::{Adapter, Registry};
pub use context::{CancelToken, Env};
pub use engine::{DEFAULT_JOBS, Engine};
pub use error::{Error, HookPhase, Result};
pub use fs::{DryRunFs, FileSystem, RealFs};
pub use manifest::{DEFAULT_PLATFORM, Hooks, Instruction, Link, Manifest, ManifestFormat, Stage, Step};
pub use runner::{CommandRunner, DryRunRunner, LineCallback, SystemRunner};
pub use types::{PlannedStep, ProgressEvent, ProgressSender, Status, StepKey};
