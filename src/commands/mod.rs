//! Command implementations
//!
//! Both commands share a [`Session`]: the loaded manifest and an engine
//! wired with the real or dry-run strategies.

pub mod apply;
pub mod status;

use crate::cli::PlanArgs;
use crate::progress::{ExecuteView, Outcome, PlanTally, PlanView};
use crate::{paths, platform};
use anyhow::{Context, Result};
use declarative::{
    CancelToken, CommandRunner, DryRunFs, DryRunRunner, Engine, Env, FileSystem, Manifest,
    PlannedStep, RealFs, Registry, SystemRunner,
};
use std::path::PathBuf;
use std::sync::{Arc, mpsc};

/// Process exit status after an interrupt
pub const EXIT_INTERRUPTED: u8 = 130;

/// A loaded manifest and the engine that reconciles it
pub struct Session {
    pub engine: Engine,
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
}

impl Session {
    pub fn open(args: &PlanArgs, dry_run: bool) -> Result<Self> {
        let manifest = Manifest::from_path(&args.manifest)
            .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
        let platform = args.platform.clone().unwrap_or_else(platform::detect);
        let reference_dir = paths::reference_dir(args.root.as_deref())?;

        let (runner, fs): (Arc<dyn CommandRunner>, Arc<dyn FileSystem>) = if dry_run {
            (Arc::new(DryRunRunner::new()), Arc::new(DryRunFs))
        } else {
            (Arc::new(SystemRunner), Arc::new(RealFs))
        };

        let env = Env::new(&platform, runner, fs, reference_dir).with_dry_run(dry_run);
        log::info!(
            "session: manifest={} platform={} root={} dry_run={dry_run} jobs={}",
            args.manifest.display(),
            env.platform,
            env.reference_dir.display(),
            args.jobs
        );

        Ok(Self {
            engine: Engine::new(env, Registry::with_builtin()).with_jobs(args.jobs),
            manifest,
            manifest_path: args.manifest.clone(),
        })
    }

    pub fn platform(&self) -> &str {
        &self.engine.env().platform
    }

    /// Run Plan on a worker thread while rendering its events here
    pub fn plan(
        &self,
        cancel: &CancelToken,
    ) -> (declarative::Result<Vec<PlannedStep>>, PlanTally) {
        let mut view = PlanView::new(self.manifest.applicable_steps(self.platform()));
        let (tx, rx) = mpsc::channel();

        let result = std::thread::scope(|scope| {
            let worker = scope.spawn(move || self.engine.plan(&self.manifest, cancel, &tx));
            for event in rx {
                view.observe(&event);
            }
            worker.join()
        });

        let tally = view.finish();
        (result.unwrap_or_else(|_| Err(worker_panicked("plan"))), tally)
    }

    /// Run Execute on a worker thread while rendering its events here
    pub fn execute(
        &self,
        steps: &[PlannedStep],
        cancel: &CancelToken,
    ) -> (declarative::Result<()>, Vec<Outcome>) {
        let mut view = ExecuteView::new();
        let (tx, rx) = mpsc::channel();

        let result = std::thread::scope(|scope| {
            let worker = scope.spawn(move || self.engine.execute(steps, cancel, &tx));
            for event in rx {
                view.observe(&event);
            }
            worker.join()
        });

        (
            result.unwrap_or_else(|_| Err(worker_panicked("execute"))),
            view.finish(),
        )
    }
}

fn worker_panicked(phase: &str) -> declarative::Error {
    declarative::Error::Environment(format!("{phase} worker panicked"))
}
