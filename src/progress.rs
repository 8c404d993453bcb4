//! Terminal rendering of engine progress events
//!
//! The engine reports through a channel; these views consume it on the
//! main thread and draw with indicatif.

use crate::ui;
use colored::Colorize;
use declarative::{PlannedStep, ProgressEvent, Status};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// Widest streamed output line shown next to the spinner
const LINE_WIDTH: usize = 60;

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {prefix:.blue.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Counts from a finished plan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlanTally {
    pub found: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Progress bar over the existence checks
pub struct PlanView {
    bar: ProgressBar,
    tally: PlanTally,
}

impl PlanView {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(bar_style());
        bar.enable_steady_tick(TICK);
        Self {
            bar,
            tally: PlanTally::default(),
        }
    }

    pub fn observe(&mut self, event: &ProgressEvent) {
        match event.status {
            Status::Checking => {}
            Status::Done => {
                if event.found {
                    self.tally.found += 1;
                } else {
                    self.tally.missing += 1;
                }
                self.bar.inc(1);
            }
            Status::Failed => {
                self.tally.failed += 1;
                self.bar.inc(1);
                let error = event.error.as_deref().unwrap_or("unknown error");
                self.bar
                    .suspend(|| println!("  {} {} ({})", "✗".red(), event.step, error));
            }
            Status::Installing | Status::Hook(_) => return,
        }
        self.bar.set_message(format!(
            "{} installed, {} missing · {}",
            self.tally.found, self.tally.missing, event.step
        ));
    }

    pub fn finish(self) -> PlanTally {
        self.bar.finish_and_clear();
        self.tally
    }
}

/// Final state of one executed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub stage: String,
    pub step: String,
    pub error: Option<String>,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Spinner over the sequential installs, recording each step's outcome
pub struct ExecuteView {
    spinner: ProgressBar,
    outcomes: Vec<Outcome>,
}

impl ExecuteView {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(TICK);
        Self {
            spinner,
            outcomes: Vec::new(),
        }
    }

    pub fn observe(&mut self, event: &ProgressEvent) {
        match event.status {
            Status::Installing | Status::Hook(_) => {
                self.spinner
                    .set_prefix(format!("[{}/{}]", event.current, event.total));
                let detail = match event.status {
                    Status::Hook(phase) => phase.label().to_string(),
                    _ => ui::truncate(&event.details, LINE_WIDTH),
                };
                self.spinner
                    .set_message(format!("{} {}", event.step.bold(), detail.dimmed()));
            }
            Status::Done | Status::Failed => {
                let outcome = Outcome {
                    stage: event.stage.clone(),
                    step: event.step.clone(),
                    error: event.error.clone(),
                };
                let mark = if outcome.succeeded() {
                    "✓".green()
                } else {
                    "✗".red()
                };
                self.spinner.suspend(|| println!("  {} {}", mark, event.step));
                self.outcomes.push(outcome);
            }
            Status::Checking => {}
        }
    }

    pub fn finish(self) -> Vec<Outcome> {
        self.spinner.finish_and_clear();
        self.outcomes
    }
}

impl Default for ExecuteView {
    fn default() -> Self {
        Self::new()
    }
}

/// One line per planned step: `[STAGE] name | command`
pub fn print_planned(steps: &[PlannedStep]) {
    for step in steps {
        println!(
            "  {} {:<15} {}",
            format!("[{}]", step.stage().to_uppercase()).dimmed(),
            step.name(),
            format!("| {}", step.command).dimmed()
        );
    }
}

/// Print the per-step summary of an execute run
pub fn print_summary(outcomes: &[Outcome], error: Option<&str>) {
    ui::header("Installation Summary");
    for outcome in outcomes {
        match &outcome.error {
            None => println!("  {} {}", "✓".green(), outcome.step),
            Some(err) => println!("  {} {:<15} {}", "✗".red(), outcome.step, err.dimmed()),
        }
    }

    println!();
    if error.is_none() && outcomes.iter().all(Outcome::succeeded) {
        ui::success("System configuration complete!");
    } else {
        ui::error("Installation encountered errors");
    }
}
