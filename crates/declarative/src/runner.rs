//! Command runner strategies
//!
//! Every external program the engine touches goes through a
//! [`CommandRunner`]. The real runner spawns processes with an explicit
//! PATH; the dry-run runner only records what it would have run.

use crate::context::CancelToken;
use crate::error::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::Duration;

/// Callback receiving each line a command prints
pub type LineCallback<'a> = &'a (dyn Fn(&str) + Sync);

/// Log target for captured subprocess output
pub const OUTPUT_LOG_TARGET: &str = "settle::output";

/// Log target for dry-run intent
pub const DRY_RUN_LOG_TARGET: &str = "settle::dry_run";

/// How often a waiting runner re-checks cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Executes external programs on behalf of adapters and hooks
pub trait CommandRunner: Send + Sync {
    /// Run interactively: stdin is inherited, combined output is logged and
    /// streamed line by line to `on_line`
    fn run(
        &self,
        cancel: &CancelToken,
        program: &str,
        args: &[&str],
        path: &str,
        on_line: Option<LineCallback<'_>>,
    ) -> Result<()>;

    /// Run silently and return trimmed stdout
    fn output(&self, cancel: &CancelToken, program: &str, args: &[&str], path: &str)
    -> Result<String>;
}

/// Render a program and its arguments as one display line
pub fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Runner that spawns real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    /// Build a command inheriting the ambient environment except PATH
    fn command(program: &str, args: &[&str], path: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args).env_remove("PATH");
        if !path.is_empty() {
            cmd.env("PATH", path);
        }
        cmd
    }

    fn spawn(mut cmd: Command, rendered: &str) -> Result<Child> {
        cmd.spawn().map_err(|source| Error::Spawn {
            command: rendered.to_string(),
            source,
        })
    }
}

/// Wait for a child while watching the cancellation token
///
/// On cancellation the child is killed and reaped before returning.
fn wait_with_cancel(child: &mut Child, cancel: &CancelToken) -> Result<ExitStatus> {
    loop {
        if cancel.is_cancelled() {
            if let Err(e) = child.kill() {
                log::debug!("kill after cancellation failed: {e}");
            }
            let _ = child.wait();
            return Err(Error::Cancelled);
        }

        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(Error::Environment(format!("failed to wait for child: {e}")));
            }
        }
    }
}

fn check_status(status: ExitStatus, rendered: &str) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(Error::CommandFailed {
            command: rendered.to_string(),
            status: status.to_string(),
        })
    }
}

/// Forward each line of a pipe to the log and the callback
fn pump_lines(pipe: impl Read, on_line: Option<LineCallback<'_>>) {
    for line in BufReader::new(pipe).lines() {
        match line {
            Ok(line) => {
                log::info!(target: OUTPUT_LOG_TARGET, "{line}");
                if let Some(callback) = on_line {
                    callback(&line);
                }
            }
            Err(e) => {
                log::debug!("stopped reading command output: {e}");
                break;
            }
        }
    }
}

fn read_all(pipe: Option<impl Read>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe
        && let Err(e) = pipe.read_to_string(&mut buf)
    {
        log::debug!("failed to read command output: {e}");
    }
    buf
}

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        cancel: &CancelToken,
        program: &str,
        args: &[&str],
        path: &str,
        on_line: Option<LineCallback<'_>>,
    ) -> Result<()> {
        cancel.check()?;
        let rendered = render_command(program, args);
        log::info!("run: {rendered}");

        let mut cmd = Self::command(program, args, path);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = Self::spawn(cmd, &rendered)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let status = std::thread::scope(|scope| {
            if let Some(out) = stdout {
                scope.spawn(move || pump_lines(out, on_line));
            }
            if let Some(err) = stderr {
                scope.spawn(move || pump_lines(err, on_line));
            }
            wait_with_cancel(&mut child, cancel)
        })?;

        check_status(status, &rendered)
    }

    fn output(
        &self,
        cancel: &CancelToken,
        program: &str,
        args: &[&str],
        path: &str,
    ) -> Result<String> {
        cancel.check()?;
        let rendered = render_command(program, args);
        log::debug!("output: {rendered}");

        let mut cmd = Self::command(program, args, path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = Self::spawn(cmd, &rendered)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, out, err) = std::thread::scope(|scope| {
            let out = scope.spawn(move || read_all(stdout));
            let err = scope.spawn(move || read_all(stderr));
            let status = wait_with_cancel(&mut child, cancel);
            (
                status,
                out.join().unwrap_or_default(),
                err.join().unwrap_or_default(),
            )
        });

        let status = status?;
        if !status.success() && !err.trim().is_empty() {
            log::debug!("{rendered}: {}", err.trim());
        }
        check_status(status, &rendered)?;
        Ok(out.trim().to_string())
    }
}

/// Runner that records commands instead of running them
///
/// Both modes log the rendered command line and succeed without spawning
/// anything; `output` returns empty stdout.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    recorded: Mutex<Vec<String>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, cancel: &CancelToken, program: &str, args: &[&str]) -> Result<()> {
        cancel.check()?;
        let rendered = render_command(program, args);
        log::info!(target: DRY_RUN_LOG_TARGET, "[CMD] {rendered}");
        match self.recorded.lock() {
            Ok(mut locked) => locked.push(rendered),
            Err(poisoned) => poisoned.into_inner().push(rendered),
        }
        Ok(())
    }

    /// Command lines that would have been run, in order
    pub fn recorded(&self) -> Vec<String> {
        match self.recorded.lock() {
            Ok(locked) => locked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl CommandRunner for DryRunRunner {
    fn run(
        &self,
        cancel: &CancelToken,
        program: &str,
        args: &[&str],
        _path: &str,
        _on_line: Option<LineCallback<'_>>,
    ) -> Result<()> {
        self.record(cancel, program, args)
    }

    fn output(
        &self,
        cancel: &CancelToken,
        program: &str,
        args: &[&str],
        _path: &str,
    ) -> Result<String> {
        self.record(cancel, program, args)?;
        Ok(String::new())
    }
}
