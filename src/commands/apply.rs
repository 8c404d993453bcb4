//! `settle apply` - plan, select, and install

use super::{EXIT_INTERRUPTED, Session};
use crate::cli::ApplyArgs;
use crate::progress::{self, Outcome};
use crate::{Context, sudo, ui};
use anyhow::{Context as _, Result};
use colored::Colorize;
use declarative::{CancelToken, PlannedStep};
use dialoguer::MultiSelect;
use std::process::ExitCode;

/// Longest install command shown in the selection list
const LABEL_COMMAND_WIDTH: usize = 40;

pub fn run(ctx: &Context, args: &ApplyArgs, cancel: &CancelToken) -> Result<ExitCode> {
    let session = Session::open(&args.plan, args.dry_run)?;

    if !ctx.quiet {
        ui::header("Analyzing system state");
        ui::kv("manifest", &session.manifest_path.display().to_string());
        ui::kv("platform", session.platform());
        if args.dry_run {
            ui::kv("mode", "dry run");
        }
    }

    let (planned, tally) = session.plan(cancel);
    let planned = match planned {
        Ok(planned) => planned,
        Err(e) if e.is_cancelled() => {
            ui::warn("Interrupted while checking; nothing was changed.");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        Err(e) => {
            ui::error(&format!("Planning failed: {e}"));
            return Ok(ExitCode::FAILURE);
        }
    };

    if planned.is_empty() {
        ui::success(&format!("Everything is up to date ({} checked)", tally.found));
        return Ok(ExitCode::SUCCESS);
    }
    ui::info(&format!(
        "{} of {} steps need changes",
        tally.missing,
        tally.found + tally.missing
    ));

    let selected = if args.yes {
        planned
    } else {
        match select(&planned)? {
            Some(selected) => selected,
            None => {
                ui::info("Cancelled.");
                return Ok(ExitCode::SUCCESS);
            }
        }
    };

    if selected.is_empty() {
        ui::info("No steps selected.");
        return Ok(ExitCode::SUCCESS);
    }

    let _sudo = sudo::acquire_for(&session.engine, &selected)?;

    ui::header(if args.dry_run {
        "Installing packages (dry run)"
    } else {
        "Installing packages"
    });
    let (result, outcomes) = session.execute(&selected, cancel);

    let error = result.as_ref().err().map(ToString::to_string);
    progress::print_summary(&outcomes, error.as_deref());
    if let Some(path) = &ctx.log_file {
        ui::dim(&format!("Log: {}", path.display()));
    }

    Ok(ExitCode::from(exit_status(&result, &outcomes)))
}

fn exit_status(result: &declarative::Result<()>, outcomes: &[Outcome]) -> u8 {
    match result {
        Err(e) if e.is_cancelled() => EXIT_INTERRUPTED,
        Err(_) => 1,
        Ok(()) if outcomes.iter().all(Outcome::succeeded) => 0,
        Ok(()) => 1,
    }
}

/// Let the user pick which planned steps to run (all preselected)
///
/// `None` when the prompt was dismissed.
fn select(planned: &[PlannedStep]) -> Result<Option<Vec<PlannedStep>>> {
    let labels: Vec<String> = planned.iter().map(selection_label).collect();
    let defaults = vec![true; labels.len()];

    let chosen = MultiSelect::new()
        .with_prompt("Proposed changes (space to toggle, enter to confirm)")
        .items(&labels)
        .defaults(&defaults)
        .interact_opt()
        .context("Failed to read selection")?;

    Ok(chosen.map(|indices| {
        indices
            .into_iter()
            .filter_map(|i| planned.get(i).cloned())
            .collect()
    }))
}

/// `[STAGE] name [+pre/+post] | command`
fn selection_label(step: &PlannedStep) -> String {
    let hooks = &step.instruction.hooks;
    let mut parts = Vec::new();
    if !hooks.before.is_empty() {
        parts.push("+pre");
    }
    if !hooks.after.is_empty() {
        parts.push("+post");
    }
    let hook_tip = if parts.is_empty() {
        String::new()
    } else {
        format!(" {}", format!("[{}]", parts.join("/")).yellow())
    };

    format!(
        "{} {:<15}{} {}",
        format!("[{}]", step.stage().to_uppercase()).dimmed(),
        step.name(),
        hook_tip,
        format!("| {}", ui::truncate(&step.command, LABEL_COMMAND_WIDTH)).dimmed()
    )
}
