//! Core types shared between the engine and its observers

use crate::error::HookPhase;
use crate::manifest::Instruction;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;

/// Status carried by a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Checking,
    Installing,
    Hook(HookPhase),
    Done,
    Failed,
}

impl Status {
    /// Whether this is the last event for its step
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => write!(f, "Checking"),
            Self::Installing => write!(f, "Installing"),
            Self::Hook(phase) => write!(f, "{}", phase.label()),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// One update from the engine to its observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: String,
    pub step: String,
    pub status: Status,
    /// Streamed output line or adapter name
    pub details: String,
    /// Only meaningful for plan terminal events
    pub found: bool,
    /// Only meaningful during execute (1-based)
    pub current: usize,
    pub total: usize,
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn new(stage: &str, step: &str, status: Status) -> Self {
        Self {
            stage: stage.to_string(),
            step: step.to_string(),
            status,
            details: String::new(),
            found: false,
            current: 0,
            total: 0,
            error: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_found(mut self, found: bool) -> Self {
        self.found = found;
        self
    }

    pub fn with_counter(mut self, current: usize, total: usize) -> Self {
        self.current = current;
        self.total = total;
        self
    }

    pub fn with_error(mut self, error: &impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Whether this is the last event for its step
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Sending half of a phase's progress channel
///
/// Observers own the receiver; the channel closes once the engine call
/// returns and the caller drops its sender.
pub type ProgressSender = Sender<ProgressEvent>;

/// Deliver an event, ignoring a hung-up observer
pub(crate) fn emit(progress: &ProgressSender, event: ProgressEvent) {
    if progress.send(event).is_err() {
        log::trace!("progress receiver dropped; event discarded");
    }
}

/// Stable identity of a step within one manifest
///
/// `index` is the step's position among the steps evaluated for the active
/// platform, which is unique within a run and independent of completion
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepKey {
    pub index: usize,
    pub stage: String,
    pub step: String,
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage, self.step)
    }
}

/// A step whose check failed and which needs remediation
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub key: StepKey,
    /// Human-readable rendering of what install would run
    pub command: String,
    /// Never mutated after planning
    pub instruction: Arc<Instruction>,
}

impl PlannedStep {
    pub fn stage(&self) -> &str {
        &self.key.stage
    }

    pub fn name(&self) -> &str {
        &self.key.step
    }
}

impl PartialEq for PlannedStep {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PlannedStep {}
