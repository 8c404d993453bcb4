//! Generic shell adapter: raw check and install commands

use super::{Adapter, CommandAdapter, Invocation, ids};
use crate::context::{CancelToken, Env};
use crate::error::{Error, Result};
use crate::manifest::Instruction;
use crate::runner::LineCallback;

/// Runs the instruction's own `check` and `install` scripts
#[derive(Debug, Clone, Copy)]
pub struct ShellAdapter {
    base: CommandAdapter,
}

fn install_args(instruction: &Instruction) -> Result<Invocation> {
    instruction
        .install_command()
        .map(Invocation::shell)
        .ok_or(Error::MissingField {
            adapter: ids::SHELL,
            field: "install",
        })
}

impl ShellAdapter {
    pub fn new() -> Self {
        Self {
            base: CommandAdapter::new(install_args),
        }
    }
}

impl Default for ShellAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for ShellAdapter {
    fn name(&self) -> &'static str {
        ids::SHELL
    }

    fn exists(&self, env: &Env, cancel: &CancelToken, instruction: &Instruction) -> Result<bool> {
        match instruction.check_command() {
            Some(check) => Invocation::shell(check).query(env, cancel),
            None => Ok(false),
        }
    }

    fn render_command(&self, _env: &Env, instruction: &Instruction) -> String {
        self.base.render_command(instruction)
    }

    fn install(
        &self,
        env: &Env,
        cancel: &CancelToken,
        instruction: &Instruction,
        on_line: LineCallback<'_>,
    ) -> Result<()> {
        self.base.install(env, cancel, instruction, on_line)
    }
}
