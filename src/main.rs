mod cli;
mod commands;
mod interrupt;
mod paths;
mod platform;
mod progress;
mod sudo;
mod ui;

use anyhow::{Context as _, Result};
use clap::CommandFactory;
use clap_complete::generate;
use cli::{Cli, Command};
use declarative::CancelToken;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Where this run's log is written, when a log file could be opened
    pub log_file: Option<PathBuf>,
}

fn log_level(verbose: u8, quiet: bool) -> log::LevelFilter {
    if quiet {
        return log::LevelFilter::Error;
    }
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn open_log_file() -> Result<(PathBuf, std::fs::File)> {
    let dir = paths::log_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let path = paths::log_file(&dir, chrono::Local::now());
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok((path, file))
}

/// Send the log to a per-run file, or stderr if that is not possible
///
/// Command output and dry-run records are always kept at info so the file
/// doubles as a transcript of the run.
fn init_logging(verbose: u8, quiet: bool) -> Option<PathBuf> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log_level(verbose, quiet))
        .filter_module("settle::output", log::LevelFilter::Info)
        .filter_module("settle::dry_run", log::LevelFilter::Info);

    match open_log_file() {
        Ok((path, file)) => {
            builder
                .target(env_logger::Target::Pipe(Box::new(file)))
                .write_style(env_logger::WriteStyle::Never)
                .format_timestamp_millis()
                .init();
            Some(path)
        }
        Err(e) => {
            ui::warn(&format!("Logging to stderr: {e:#}"));
            builder.format_timestamp(None).init();
            None
        }
    }
}

fn run(cli: Cli, ctx: &Context, cancel: &CancelToken) -> Result<ExitCode> {
    match cli.command {
        None => commands::apply::run(ctx, &cli.apply, cancel),
        Some(Command::Apply(args)) => commands::apply::run(ctx, &args, cancel),
        Some(Command::Status(args)) => commands::status::run(ctx, &args, cancel),
        Some(Command::Completions { shell }) => {
            generate(shell, &mut Cli::command(), "settle", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_checked();

    let log_file = match cli.command {
        Some(Command::Completions { .. }) => None,
        _ => init_logging(cli.verbose, cli.quiet),
    };
    let ctx = Context {
        quiet: cli.quiet,
        log_file,
    };

    let cancel = CancelToken::new();
    interrupt::install(&cancel);

    match run(cli, &ctx, &cancel) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0, false), log::LevelFilter::Warn);
        assert_eq!(log_level(1, false), log::LevelFilter::Info);
        assert_eq!(log_level(2, false), log::LevelFilter::Debug);
        assert_eq!(log_level(7, false), log::LevelFilter::Trace);
        assert_eq!(log_level(3, true), log::LevelFilter::Error);
    }
}
