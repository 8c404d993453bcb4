//! Plan: concurrent, read-only existence checks

use crate::adapter::{Adapter, Invocation};
use crate::context::CancelToken;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::manifest::{Instruction, Manifest};
use crate::types::{PlannedStep, ProgressEvent, ProgressSender, Status, StepKey, emit};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// One step selected for the active platform
struct WorkItem {
    key: StepKey,
    instruction: Arc<Instruction>,
}

/// Flatten the manifest into the steps that apply to `platform`
///
/// Steps with neither a platform nor a default instruction are skipped and
/// take no index.
fn work_list(manifest: &Manifest, platform: &str) -> Vec<WorkItem> {
    manifest
        .stages
        .iter()
        .flat_map(|stage| stage.steps.iter().map(move |step| (stage, step)))
        .filter_map(|(stage, step)| {
            step.instruction_for(platform)
                .map(|instr| (stage.name.as_str(), step.name.as_str(), instr))
        })
        .enumerate()
        .map(|(index, (stage, step, instr))| WorkItem {
            key: StepKey {
                index,
                stage: stage.to_string(),
                step: step.to_string(),
            },
            instruction: Arc::new(instr.clone()),
        })
        .collect()
}

/// State shared by the check workers of one plan
struct Checks<'a> {
    work: &'a [WorkItem],
    /// Write-once result per work item
    slots: Vec<OnceLock<PlannedStep>>,
    next: AtomicUsize,
    failure: OnceLock<Error>,
    cancel: CancelToken,
    progress: &'a ProgressSender,
}

impl Engine {
    /// Check every applicable step and return those needing remediation
    ///
    /// Emits `Checking` then a terminal event per evaluated step. Output
    /// follows manifest order regardless of completion order. Any check
    /// error cancels the remaining checks and is returned.
    pub fn plan(
        &self,
        manifest: &Manifest,
        cancel: &CancelToken,
        progress: &ProgressSender,
    ) -> Result<Vec<PlannedStep>> {
        let work = work_list(manifest, &self.env.platform);
        log::info!(
            "planning {} of {} steps for {}",
            work.len(),
            manifest.step_count(),
            self.env.platform
        );
        if work.is_empty() {
            return Ok(Vec::new());
        }

        let checks = Checks {
            work: &work,
            slots: work.iter().map(|_| OnceLock::new()).collect(),
            next: AtomicUsize::new(0),
            failure: OnceLock::new(),
            cancel: cancel.child(),
            progress,
        };

        let workers = self.jobs.min(work.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("settle-check-{i}"))
            .build()
            .map_err(|e| Error::Environment(format!("failed to create thread pool: {e}")))?;

        pool.scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| self.check_worker(&checks));
            }
        });

        if let Some(err) = checks.failure.into_inner() {
            log::error!("plan aborted: {err}");
            return Err(err);
        }
        cancel.check()?;

        let planned: Vec<PlannedStep> = checks
            .slots
            .into_iter()
            .filter_map(OnceLock::into_inner)
            .collect();
        log::info!("{} steps need remediation", planned.len());
        Ok(planned)
    }

    /// Pull work items until the queue drains or the plan is cancelled
    fn check_worker(&self, checks: &Checks<'_>) {
        loop {
            if checks.cancel.is_cancelled() {
                return;
            }
            let index = checks.next.fetch_add(1, Ordering::SeqCst);
            let Some(item) = checks.work.get(index) else {
                return;
            };

            let event = |status| ProgressEvent::new(&item.key.stage, &item.key.step, status);
            emit(
                checks.progress,
                event(Status::Checking).with_details(&item.instruction.manager),
            );

            match self.check_item(item, &checks.cancel) {
                Ok(planned) => {
                    let found = planned.is_none();
                    if let Some(planned) = planned {
                        // Each index is claimed by exactly one worker
                        let _ = checks.slots[index].set(planned);
                    }
                    log::debug!("{}: found={found}", item.key);
                    emit(checks.progress, event(Status::Done).with_found(found));
                }
                Err(err) => {
                    let err = err.in_step(&item.key.step);
                    emit(checks.progress, event(Status::Failed).with_error(&err));
                    // Record before cancelling so siblings' cancellations lose the race
                    let _ = checks.failure.set(err);
                    checks.cancel.cancel();
                    return;
                }
            }
        }
    }

    /// `None` when the step is already satisfied
    fn check_item(&self, item: &WorkItem, cancel: &CancelToken) -> Result<Option<PlannedStep>> {
        let adapter = self.registry.get(&item.instruction.manager)?;
        if self.check_existence(adapter, &item.instruction, cancel)? {
            return Ok(None);
        }

        Ok(Some(PlannedStep {
            key: item.key.clone(),
            command: adapter.render_command(&self.env, &item.instruction),
            instruction: Arc::clone(&item.instruction),
        }))
    }

    /// Check command, then required binary, then the adapter itself
    fn check_existence(
        &self,
        adapter: &dyn Adapter,
        instruction: &Instruction,
        cancel: &CancelToken,
    ) -> Result<bool> {
        if let Some(check) = instruction.check_command() {
            return Invocation::shell(check).query(&self.env, cancel);
        }

        if let Some(binary) = instruction.required_binary() {
            cancel.check()?;
            let found = which::which_in(binary, Some(&self.env.path), &self.env.reference_dir);
            return Ok(found.is_ok());
        }

        adapter.exists(&self.env, cancel, instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Registry;
    use crate::testing::{FakeRunner, test_env};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    const MANIFEST: &str = r#"
stages:
  - name: core
    steps:
      - name: git
        instructions:
          default:
            manager: shell
            check: "check git"
            install: "install git"
      - name: ripgrep
        instructions:
          fedora:
            manager: dnf
            package: ripgrep
          darwin:
            manager: brew
            package: ripgrep
      - name: mas
        instructions:
          darwin:
            manager: brew
            package: mas
  - name: tools
    steps:
      - name: bat
        instructions:
          default:
            manager: cargo
            package: bat
      - name: fzf
        instructions:
          default:
            manager: shell
            check: "check fzf"
            install: "install fzf"
"#;

    fn engine(runner: &FakeRunner) -> Engine {
        Engine::new(test_env(runner.clone()), Registry::with_builtin())
    }

    fn names(steps: &[PlannedStep]) -> Vec<&str> {
        steps.iter().map(PlannedStep::name).collect()
    }

    fn plan(
        engine: &Engine,
        manifest: &Manifest,
        cancel: &CancelToken,
    ) -> (Result<Vec<PlannedStep>>, Vec<ProgressEvent>) {
        let (tx, rx) = mpsc::channel();
        let result = engine.plan(manifest, cancel, &tx);
        drop(tx);
        (result, rx.into_iter().collect())
    }

    fn shell_steps(count: usize) -> Manifest {
        let steps: String = (0..count)
            .map(|i| {
                format!(
                    "      - name: s{i}\n        instructions:\n          default:\n            manager: shell\n            check: \"check s{i}\"\n"
                )
            })
            .collect();
        Manifest::from_yaml_str(&format!("stages:\n  - name: many\n    steps:\n{steps}")).unwrap()
    }

    #[test]
    fn test_work_list_skips_steps_without_instruction() {
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
        let work = work_list(&manifest, "fedora");

        let keys: Vec<_> = work.iter().map(|w| (w.key.index, w.key.step.as_str())).collect();
        assert_eq!(
            keys,
            vec![(0, "git"), (1, "ripgrep"), (2, "bat"), (3, "fzf")]
        );
        assert_eq!(work[1].instruction.manager, "dnf");
        assert_eq!(work_list(&manifest, "darwin").len(), 5);
    }

    #[test]
    fn test_plan_preserves_manifest_order() {
        let runner = FakeRunner::new()
            .fail_when("check git")
            .fail_when("rpm -q ripgrep")
            .fail_when("check fzf")
            .with_delay(Duration::from_millis(5));
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();

        let (result, events) = plan(&engine(&runner), &manifest, &CancelToken::new());
        let steps = result.unwrap();

        // bat is absent from the empty `cargo install --list` output
        assert_eq!(names(&steps), vec!["git", "ripgrep", "bat", "fzf"]);
        assert_eq!(steps[1].command, "sudo dnf install -y ripgrep");
        assert_eq!(steps[0].command, "sh -c install git");
        assert!(steps.windows(2).all(|w| w[0].key.index < w[1].key.index));
        assert!(!events.iter().any(|e| e.step == "mas"));
    }

    #[test]
    fn test_satisfied_steps_are_not_planned() {
        let runner = FakeRunner::new()
            .fail_when("check fzf")
            .output_when("cargo install --list", "bat v0.24.0:\n    bat\n");
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();

        let (result, events) = plan(&engine(&runner), &manifest, &CancelToken::new());

        assert_eq!(names(&result.unwrap()), vec!["fzf"]);
        let found: Vec<_> = events
            .iter()
            .filter(|e| e.status == Status::Done)
            .map(|e| (e.step.as_str(), e.found))
            .collect();
        assert_eq!(found.len(), 4);
        assert!(found.contains(&("bat", true)));
        assert!(found.contains(&("fzf", false)));
    }

    #[test]
    fn test_each_step_checks_before_terminal_event() {
        let runner = FakeRunner::new().with_delay(Duration::from_millis(2));
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();

        let (result, events) = plan(&engine(&runner), &manifest, &CancelToken::new());
        result.unwrap();

        assert_eq!(events.len(), 8);
        for step in ["git", "ripgrep", "bat", "fzf"] {
            let statuses: Vec<_> = events
                .iter()
                .filter(|e| e.step == step)
                .map(|e| e.status)
                .collect();
            assert_eq!(statuses, vec![Status::Checking, Status::Done], "{step}");
        }
        let checking = events.iter().find(|e| e.step == "ripgrep").unwrap();
        assert_eq!(checking.details, "dnf");
    }

    #[test]
    fn test_plan_is_idempotent() {
        let runner = FakeRunner::new().fail_when("check");
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
        let engine = engine(&runner);

        let (first, _) = plan(&engine, &manifest, &CancelToken::new());
        let (second, _) = plan(&engine, &manifest, &CancelToken::new());
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_unknown_adapter_aborts_plan() {
        let manifest = Manifest::from_yaml_str(
            r#"
stages:
  - name: core
    steps:
      - name: httpie
        instructions:
          default:
            manager: pip
            package: httpie
"#,
        )
        .unwrap();

        let (result, events) = plan(&engine(&FakeRunner::new()), &manifest, &CancelToken::new());
        let err = result.unwrap_err();

        assert_eq!(err.to_string(), "step 'httpie' failed: no manager found for pip");
        let last = events.last().unwrap();
        assert_eq!(last.status, Status::Failed);
        assert_eq!(
            last.error.as_deref(),
            Some("step 'httpie' failed: no manager found for pip")
        );
    }

    #[test]
    fn test_adapter_error_stops_remaining_checks() {
        let mut manifest = shell_steps(6);
        manifest.stages[0].steps[1]
            .instructions
            .get_mut("default")
            .unwrap()
            .manager = "nope".into();
        let runner = FakeRunner::new();

        let (result, events) = plan(
            &engine(&runner).with_jobs(1),
            &manifest,
            &CancelToken::new(),
        );

        assert!(result.is_err());
        let checked: Vec<_> = events
            .iter()
            .filter(|e| e.status == Status::Checking)
            .map(|e| e.step.as_str())
            .collect();
        assert_eq!(checked, vec!["s0", "s1"]);
    }

    #[test]
    fn test_cancel_mid_plan_returns_promptly() {
        let runner = FakeRunner::new().block_when("check s1");
        let manifest = shell_steps(5);
        let engine = engine(&runner).with_jobs(1);
        let cancel = CancelToken::new();

        let trigger = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });

        let started = Instant::now();
        let (result, events) = plan(&engine, &manifest, &cancel);

        assert!(result.unwrap_err().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
        let checked: Vec<_> = events
            .iter()
            .filter(|e| e.status == Status::Checking)
            .map(|e| e.step.as_str())
            .collect();
        assert_eq!(checked, vec!["s0", "s1"]);
    }

    #[test]
    fn test_already_cancelled_plan_checks_nothing() {
        let runner = FakeRunner::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let (result, events) = plan(&engine(&runner), &shell_steps(3), &cancel);

        assert!(result.unwrap_err().is_cancelled());
        assert!(events.is_empty());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_pool_bounds_concurrent_checks() {
        let runner = FakeRunner::new().with_delay(Duration::from_millis(20));
        let manifest = shell_steps(12);

        let (result, _) = plan(&engine(&runner).with_jobs(3), &manifest, &CancelToken::new());

        assert!(result.unwrap().is_empty());
        assert_eq!(runner.calls().len(), 12);
        assert!(runner.max_in_flight() <= 3);
        assert!(runner.max_in_flight() > 1);
    }

    #[test]
    fn test_check_command_takes_precedence() {
        let manifest = Manifest::from_yaml_str(
            r#"
stages:
  - name: core
    steps:
      - name: jq
        instructions:
          default:
            manager: dnf
            check: "command -v jq"
            binary: settle-no-such-binary
            package: jq
"#,
        )
        .unwrap();
        let runner = FakeRunner::new();

        let (result, _) = plan(&engine(&runner), &manifest, &CancelToken::new());

        assert!(result.unwrap().is_empty());
        assert_eq!(runner.calls(), vec!["output: sh -c command -v jq"]);
    }

    #[test]
    fn test_missing_binary_skips_adapter_check() {
        let manifest = Manifest::from_yaml_str(
            r#"
stages:
  - name: core
    steps:
      - name: jq
        instructions:
          default:
            manager: dnf
            binary: settle-no-such-binary
            package: jq
"#,
        )
        .unwrap();
        let runner = FakeRunner::new();

        let (result, _) = plan(&engine(&runner), &manifest, &CancelToken::new());

        assert_eq!(names(&result.unwrap()), vec!["jq"]);
        assert!(runner.calls().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_binary_lookup_uses_engine_path() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("settle-fake-tool");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let manifest = Manifest::from_yaml_str(
            r#"
stages:
  - name: core
    steps:
      - name: tool
        instructions:
          default:
            manager: brew
            binary: settle-fake-tool
            package: tool
"#,
        )
        .unwrap();

        let runner = FakeRunner::new();
        let with_dir = Engine::new(
            test_env(runner.clone()).with_path(dir.path().to_string_lossy()),
            Registry::with_builtin(),
        );
        let (found, _) = plan(&with_dir, &manifest, &CancelToken::new());
        assert!(found.unwrap().is_empty());

        let (missing, _) = plan(&engine(&runner), &manifest, &CancelToken::new());
        assert_eq!(names(&missing.unwrap()), vec!["tool"]);
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::from_yaml_str("stages: []").unwrap();
        let (result, events) = plan(&engine(&FakeRunner::new()), &manifest, &CancelToken::new());
        assert!(result.unwrap().is_empty());
        assert!(events.is_empty());
    }
}
