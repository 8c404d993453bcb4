//! `settle status` - plan only, report what apply would install

use super::{EXIT_INTERRUPTED, Session};
use crate::cli::PlanArgs;
use crate::{Context, progress, ui};
use anyhow::Result;
use declarative::CancelToken;
use std::process::ExitCode;

pub fn run(ctx: &Context, args: &PlanArgs, cancel: &CancelToken) -> Result<ExitCode> {
    let session = Session::open(args, false)?;

    if !ctx.quiet {
        ui::header("System status");
        ui::kv("manifest", &session.manifest_path.display().to_string());
        ui::kv("platform", session.platform());
    }

    let (planned, tally) = session.plan(cancel);
    let planned = match planned {
        Ok(planned) => planned,
        Err(e) if e.is_cancelled() => {
            ui::warn("Interrupted while checking.");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(e) => {
            ui::error(&format!("Planning failed: {e}"));
            return Ok(ExitCode::FAILURE);
        }
    };

    if planned.is_empty() {
        ui::success(&format!("Everything is up to date ({} checked)", tally.found));
    } else {
        ui::info(&format!(
            "{} installed, {} pending:",
            tally.found, tally.missing
        ));
        progress::print_planned(&planned);
        ui::dim("Run `settle apply` to install them.");
    }

    Ok(ExitCode::SUCCESS)
}
