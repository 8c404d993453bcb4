//! Package-manager adapters
//!
//! Every backend (shell commands, OS package managers, language
//! toolchains, symlinks) answers the same four questions about an
//! [`Instruction`]:
//! - is it already satisfied? ([`Adapter::exists`], read-only)
//! - what would installing it run? ([`Adapter::render_command`], no side effects)
//! - make it so ([`Adapter::install`])
//! - does that need elevated privileges? ([`Adapter::requires_privilege`])

use crate::context::{CancelToken, Env};
use crate::error::{Error, Result};
use crate::manifest::Instruction;
use crate::runner::{LineCallback, render_command};
use std::collections::BTreeMap;

pub mod native;
pub mod shell;
pub mod symlink;
pub mod toolchain;

pub use native::NativePackage;
pub use shell::ShellAdapter;
pub use symlink::SymlinkAdapter;
pub use toolchain::CargoAdapter;

/// Identifiers of the built-in adapters
pub mod ids {
    pub const SHELL: &str = "shell";
    pub const DNF: &str = "dnf";
    pub const APT: &str = "apt";
    pub const BREW: &str = "brew";
    pub const CARGO: &str = "cargo";
    pub const SYMLINK: &str = "symlink";
}

/// Strategy for checking and installing one kind of unit
pub trait Adapter: Send + Sync {
    /// Adapter identifier as used in manifests
    fn name(&self) -> &'static str;

    /// Whether the unit is already present; must not mutate anything
    fn exists(&self, env: &Env, cancel: &CancelToken, instruction: &Instruction) -> Result<bool>;

    /// What `install` would run, for display before any mutation
    fn render_command(&self, env: &Env, instruction: &Instruction) -> String;

    /// Perform the mutation, streaming output lines to `on_line`
    fn install(
        &self,
        env: &Env,
        cancel: &CancelToken,
        instruction: &Instruction,
        on_line: LineCallback<'_>,
    ) -> Result<()>;

    /// Whether installing needs privileges acquired up front
    fn requires_privilege(&self, _instruction: &Instruction) -> bool {
        false
    }
}

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// A `sh -c <script>` invocation
    pub fn shell(script: &str) -> Self {
        Self::new("sh", &["-c", script])
    }

    pub fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }

    pub fn render(&self) -> String {
        render_command(&self.program, &self.arg_refs())
    }

    /// Run interactively through the environment's runner
    pub fn run(&self, env: &Env, cancel: &CancelToken, on_line: LineCallback<'_>) -> Result<()> {
        env.runner
            .run(cancel, &self.program, &self.arg_refs(), &env.path, Some(on_line))
    }

    /// Run as a read-only check: success means present
    pub fn query(&self, env: &Env, cancel: &CancelToken) -> Result<bool> {
        query_result(
            env.runner
                .output(cancel, &self.program, &self.arg_refs(), &env.path)
                .map(|_| ()),
        )
    }
}

/// Map a query's outcome to presence
///
/// A query that failed to run or exited non-zero reads as "absent";
/// cancellation and other errors propagate.
pub fn query_result(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_absence() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Builds the install invocation for an instruction
pub type InstallArgs = fn(&Instruction) -> Result<Invocation>;

/// Shared install/render logic for adapters that shell out
#[derive(Clone, Copy)]
pub struct CommandAdapter {
    install_args: InstallArgs,
}

impl CommandAdapter {
    pub fn new(install_args: InstallArgs) -> Self {
        Self { install_args }
    }

    pub fn invocation(&self, instruction: &Instruction) -> Result<Invocation> {
        (self.install_args)(instruction)
    }

    pub fn render_command(&self, instruction: &Instruction) -> String {
        match self.invocation(instruction) {
            Ok(invocation) => invocation.render(),
            Err(e) => format!("<{e}>"),
        }
    }

    pub fn install(
        &self,
        env: &Env,
        cancel: &CancelToken,
        instruction: &Instruction,
        on_line: LineCallback<'_>,
    ) -> Result<()> {
        self.invocation(instruction)?.run(env, cancel, on_line)
    }
}

impl std::fmt::Debug for CommandAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandAdapter").finish_non_exhaustive()
    }
}

/// Adapters by identifier, built once at startup
#[derive(Default)]
pub struct Registry {
    adapters: BTreeMap<String, Box<dyn Adapter>>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in adapter
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ids::SHELL, ShellAdapter::new());
        registry.register(ids::DNF, NativePackage::dnf());
        registry.register(ids::APT, NativePackage::apt());
        registry.register(ids::BREW, NativePackage::brew());
        registry.register(ids::CARGO, CargoAdapter::new());
        registry.register(ids::SYMLINK, SymlinkAdapter::new());
        registry
    }

    /// Register (or replace) the adapter for an identifier
    pub fn register(&mut self, id: &str, adapter: impl Adapter + 'static) {
        self.adapters.insert(id.to_string(), Box::new(adapter));
    }

    /// Look up an adapter, failing for unknown identifiers
    pub fn get(&self, id: &str) -> Result<&dyn Adapter> {
        self.adapters
            .get(id)
            .map(|adapter| &**adapter)
            .ok_or_else(|| Error::UnknownAdapter(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adapters.contains_key(id)
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}
