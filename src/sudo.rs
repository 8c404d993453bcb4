//! Scoped sudo context
//!
//! Sudo is never requested for the entire process. Instead:
//! 1. Every check runs unprivileged
//! 2. The selected steps are inspected once before installing
//! 3. Sudo is acquired once for the whole batch
//! 4. Sudo is released as soon as the batch finishes

use anyhow::{Context, Result, bail};
use declarative::{Engine, PlannedStep};
use std::process::{Command, Stdio};

/// Scoped sudo context - invalidates the credential cache on drop
#[derive(Debug)]
pub struct SudoContext {
    _validated: (),
}

impl SudoContext {
    /// Acquire sudo privileges with a reason shown to user
    pub fn acquire(reason: &str) -> Result<Self> {
        eprintln!();
        eprintln!("  Sudo required: {reason}");
        eprintln!();

        // Validate sudo (will prompt for password)
        let status = Command::new("sudo")
            .arg("-v")
            .stdin(Stdio::inherit())
            .status()
            .context("Failed to execute sudo")?;

        if !status.success() {
            bail!("Failed to acquire sudo privileges");
        }

        log::info!("sudo credentials validated");
        Ok(Self { _validated: () })
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        // Invalidate sudo timestamp to release privileges
        if let Err(e) = Command::new("sudo").arg("-k").status() {
            log::debug!("sudo -k failed: {e}");
        }
    }
}

/// Acquire sudo once if any selected step needs it
///
/// Dry runs never prompt.
pub fn acquire_for(engine: &Engine, steps: &[PlannedStep]) -> Result<Option<SudoContext>> {
    if engine.env().dry_run {
        log::info!("dry run: not acquiring sudo");
        return Ok(None);
    }
    if !engine.requires_privilege(steps) {
        return Ok(None);
    }
    SudoContext::acquire("some selected steps install system packages or invoke sudo").map(Some)
}
