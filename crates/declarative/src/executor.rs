//! Execute: sequential remediation of planned steps
//!
//! Package managers hold lock files while they mutate, so steps run one at
//! a time in the order given, and the first failure stops the run.

use crate::adapter::Invocation;
use crate::context::CancelToken;
use crate::engine::Engine;
use crate::error::{HookPhase, Result};
use crate::runner::LineCallback;
use crate::types::{PlannedStep, ProgressEvent, ProgressSender, Status, emit};

/// Position of a step within one execute call
#[derive(Clone, Copy)]
struct Counter {
    current: usize,
    total: usize,
}

impl Engine {
    /// Remediate `steps` in order, stopping at the first failure
    ///
    /// Outcomes are reported through `progress`; the return value only
    /// carries the error that ended the run.
    pub fn execute(
        &self,
        steps: &[PlannedStep],
        cancel: &CancelToken,
        progress: &ProgressSender,
    ) -> Result<()> {
        let total = steps.len();
        log::info!(
            "executing {total} steps{}",
            if self.env.dry_run { " (dry run)" } else { "" }
        );

        for (i, step) in steps.iter().enumerate() {
            cancel.check()?;
            let counter = Counter {
                current: i + 1,
                total,
            };

            if let Err(err) = self.execute_step(step, counter, cancel, progress) {
                log::error!("{}: {err}", step.key);
                emit(
                    progress,
                    event(step, counter, Status::Failed).with_error(&err),
                );
                return Err(err);
            }

            log::info!("{}: done", step.key);
            emit(progress, event(step, counter, Status::Done));
        }
        Ok(())
    }

    fn execute_step(
        &self,
        step: &PlannedStep,
        counter: Counter,
        cancel: &CancelToken,
        progress: &ProgressSender,
    ) -> Result<()> {
        let instruction = &step.instruction;
        let adapter = self
            .registry
            .get(&instruction.manager)
            .map_err(|e| e.in_step(step.name()))?;

        let notify = |line: &str| {
            emit(
                progress,
                event(step, counter, Status::Installing).with_details(line),
            );
        };

        self.run_hooks(step, counter, HookPhase::Before, cancel, progress, &notify)?;

        emit(
            progress,
            event(step, counter, Status::Installing).with_details(&instruction.manager),
        );
        adapter
            .install(&self.env, cancel, instruction, &notify)
            .map_err(|e| e.in_step(step.name()))?;

        self.run_hooks(step, counter, HookPhase::After, cancel, progress, &notify)
    }

    fn run_hooks(
        &self,
        step: &PlannedStep,
        counter: Counter,
        phase: HookPhase,
        cancel: &CancelToken,
        progress: &ProgressSender,
        notify: LineCallback<'_>,
    ) -> Result<()> {
        let hooks = match phase {
            HookPhase::Before => &step.instruction.hooks.before,
            HookPhase::After => &step.instruction.hooks.after,
        };
        if hooks.is_empty() {
            return Ok(());
        }

        emit(
            progress,
            event(step, counter, Status::Hook(phase))
                .with_details(format!("{} command(s)", hooks.len())),
        );
        for hook in hooks {
            log::debug!("{} {phase}: {hook}", step.key);
            Invocation::shell(hook)
                .run(&self.env, cancel, notify)
                .map_err(|e| e.in_hook(step.name(), phase))?;
        }
        Ok(())
    }
}

fn event(step: &PlannedStep, counter: Counter, status: Status) -> ProgressEvent {
    ProgressEvent::new(step.stage(), step.name(), status).with_counter(counter.current, counter.total)
}
