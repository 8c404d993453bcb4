//! Scripted command runner for unit tests

use crate::context::{CancelToken, Env};
use crate::error::{Error, Result};
use crate::fs::RealFs;
use crate::runner::{CommandRunner, LineCallback, render_command};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct State {
    calls: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
    outputs: Mutex<Vec<(String, String)>>,
    lines: Mutex<Vec<(String, Vec<String>)>>,
    blockers: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Runner whose results are scripted by substring match on the command line
#[derive(Clone, Default)]
pub(crate) struct FakeRunner {
    state: Arc<State>,
}

struct InFlight<'a>(&'a State);

impl<'a> InFlight<'a> {
    fn enter(state: &'a State) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` exit non-zero
    pub(crate) fn fail_when(self, pattern: &str) -> Self {
        self.state.failures.lock().unwrap().push(pattern.to_string());
        self
    }

    /// Commands containing `pattern` print `stdout`
    pub(crate) fn output_when(self, pattern: &str, stdout: &str) -> Self {
        self.state
            .outputs
            .lock()
            .unwrap()
            .push((pattern.to_string(), stdout.to_string()));
        self
    }

    /// Interactive commands containing `pattern` stream these lines
    pub(crate) fn lines_when(self, pattern: &str, lines: &[&str]) -> Self {
        self.state.lines.lock().unwrap().push((
            pattern.to_string(),
            lines.iter().map(ToString::to_string).collect(),
        ));
        self
    }

    /// Commands containing `pattern` hang until cancelled
    pub(crate) fn block_when(self, pattern: &str) -> Self {
        self.state.blockers.lock().unwrap().push(pattern.to_string());
        self
    }

    /// Every command takes at least this long
    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        *self.state.delay.lock().unwrap() = delay;
        self
    }

    /// Every command seen so far, prefixed with its mode
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Highest number of commands observed running at once
    pub(crate) fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    fn matches(list: &Mutex<Vec<String>>, rendered: &str) -> bool {
        list.lock().unwrap().iter().any(|p| rendered.contains(p.as_str()))
    }

    fn simulate(&self, cancel: &CancelToken, mode: &str, rendered: &str) -> Result<()> {
        cancel.check()?;
        self.state
            .calls
            .lock()
            .unwrap()
            .push(format!("{mode}: {rendered}"));
        let _guard = InFlight::enter(&self.state);

        if Self::matches(&self.state.blockers, rendered) {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            return Err(Error::Cancelled);
        }

        let delay = *self.state.delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if Self::matches(&self.state.failures, rendered) {
            return Err(Error::CommandFailed {
                command: rendered.to_string(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        cancel: &CancelToken,
        program: &str,
        args: &[&str],
        _path: &str,
        on_line: Option<LineCallback<'_>>,
    ) -> Result<()> {
        let rendered = render_command(program, args);
        self.simulate(cancel, "run", &rendered)?;

        if let Some(callback) = on_line {
            let scripted = self.state.lines.lock().unwrap().clone();
            for (pattern, lines) in scripted {
                if rendered.contains(pattern.as_str()) {
                    for line in &lines {
                        callback(line);
                    }
                }
            }
        }
        Ok(())
    }

    fn output(
        &self,
        cancel: &CancelToken,
        program: &str,
        args: &[&str],
        _path: &str,
    ) -> Result<String> {
        let rendered = render_command(program, args);
        self.simulate(cancel, "output", &rendered)?;

        let outputs = self.state.outputs.lock().unwrap();
        Ok(outputs
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }
}

/// Environment backed by a fake runner and the real filesystem
pub(crate) fn test_env(runner: FakeRunner) -> Env {
    Env::new(
        "fedora",
        Arc::new(runner),
        Arc::new(RealFs),
        "/nonexistent/settle-reference".into(),
    )
    .with_path("/usr/bin:/bin")
}
