//! The reconciliation engine
//!
//! [`Engine::plan`] checks every applicable step concurrently and returns
//! the ones that are not yet satisfied. [`Engine::execute`] remediates a
//! selection of those steps strictly one at a time.

use crate::adapter::Registry;
use crate::context::Env;
use crate::types::PlannedStep;

/// Default number of concurrent existence checks
pub const DEFAULT_JOBS: usize = 5;

/// Plans and executes manifests against one environment
#[derive(Debug)]
pub struct Engine {
    pub(crate) env: Env,
    pub(crate) registry: Registry,
    pub(crate) jobs: usize,
}

impl Engine {
    pub fn new(env: Env, registry: Registry) -> Self {
        Self {
            env,
            registry,
            jobs: DEFAULT_JOBS,
        }
    }

    /// Cap on simultaneous existence checks during planning (at least 1)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Whether executing these steps needs privileges acquired up front
    ///
    /// True when an adapter declares it, or when an install command or hook
    /// mentions `sudo` anywhere, including inside `$(...)` or after `&&`.
    pub fn requires_privilege(&self, steps: &[PlannedStep]) -> bool {
        steps.iter().any(|step| {
            let instr = &step.instruction;
            let declared = self
                .registry
                .get(&instr.manager)
                .map(|adapter| adapter.requires_privilege(instr))
                .unwrap_or(false);
            let mentions_sudo = |cmd: &str| cmd.contains("sudo");

            declared
                || instr.install_command().is_some_and(mentions_sudo)
                || instr
                    .hooks
                    .before
                    .iter()
                    .chain(&instr.hooks.after)
                    .any(|cmd| mentions_sudo(cmd))
        })
    }
}
