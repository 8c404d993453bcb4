//! OS package managers: dnf, apt, brew

use super::{Adapter, CommandAdapter, Invocation, ids};
use crate::context::{CancelToken, Env};
use crate::error::{Error, Result};
use crate::manifest::Instruction;
use crate::runner::LineCallback;

/// Builds the read-only "is it installed" query for a package
type QueryArgs = fn(&str) -> Invocation;

/// A system package manager addressed by package name
#[derive(Debug, Clone, Copy)]
pub struct NativePackage {
    name: &'static str,
    base: CommandAdapter,
    query: QueryArgs,
    privileged: bool,
}

fn package<'a>(adapter: &'static str, instruction: &'a Instruction) -> Result<&'a str> {
    instruction.package_name().ok_or(Error::MissingField {
        adapter,
        field: "package",
    })
}

impl NativePackage {
    /// Fedora and friends: `rpm -q` / `sudo dnf install -y`
    pub fn dnf() -> Self {
        Self {
            name: ids::DNF,
            base: CommandAdapter::new(|instr| {
                let pkg = package(ids::DNF, instr)?;
                Ok(Invocation::new("sudo", &["dnf", "install", "-y", pkg]))
            }),
            query: |pkg| Invocation::new("rpm", &["-q", pkg]),
            privileged: true,
        }
    }

    /// Debian and friends: `dpkg -s` / `sudo apt-get install -y`
    pub fn apt() -> Self {
        Self {
            name: ids::APT,
            base: CommandAdapter::new(|instr| {
                let pkg = package(ids::APT, instr)?;
                Ok(Invocation::new("sudo", &["apt-get", "install", "-y", pkg]))
            }),
            query: |pkg| Invocation::new("dpkg", &["-s", pkg]),
            privileged: true,
        }
    }

    /// Homebrew: `brew list` / `brew install`
    pub fn brew() -> Self {
        Self {
            name: ids::BREW,
            base: CommandAdapter::new(|instr| {
                let pkg = package(ids::BREW, instr)?;
                Ok(Invocation::new("brew", &["install", pkg]))
            }),
            query: |pkg| Invocation::new("brew", &["list", pkg]),
            privileged: false,
        }
    }
}

impl Adapter for NativePackage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn exists(&self, env: &Env, cancel: &CancelToken, instruction: &Instruction) -> Result<bool> {
        match instruction.package_name() {
            Some(pkg) => (self.query)(pkg).query(env, cancel),
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

    fn requires_privilege(&self, _instruction: &Instruction) -> bool {
        self.privileged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, test_env};

    #[test]
    fn test_render_commands() {
        let env = test_env(FakeRunner::new());
        let instr = Instruction::new("dnf").with_package("ripgrep");

        assert_eq!(
            NativePackage::dnf().render_command(&env, &instr),
            "sudo dnf install -y ripgrep"
        );
        assert_eq!(
            NativePackage::apt().render_command(&env, &instr),
            "sudo apt-get install -y ripgrep"
        );
        assert_eq!(
            NativePackage::brew().render_command(&env, &instr),
            "brew install ripgrep"
        );
    }

    #[test]
    fn test_exists_queries_package_database() {
        let runner = FakeRunner::new().fail_when("rpm -q fd-find");
        let env = test_env(runner.clone());
        let dnf = NativePackage::dnf();
        let cancel = CancelToken::new();

        assert!(
            dnf.exists(&env, &cancel, &Instruction::new("dnf").with_package("ripgrep"))
                .unwrap()
        );
        assert!(
            !dnf.exists(&env, &cancel, &Instruction::new("dnf").with_package("fd-find"))
                .unwrap()
        );
        assert_eq!(
            runner.calls(),
            vec!["output: rpm -q ripgrep", "output: rpm -q fd-find"]
        );
    }

    #[test]
    fn test_missing_package() {
        let runner = FakeRunner::new();
        let env = test_env(runner.clone());
        let apt = NativePackage::apt();
        let instr = Instruction::new("apt");

        assert!(!apt.exists(&env, &CancelToken::new(), &instr).unwrap());
        let err = apt
            .install(&env, &CancelToken::new(), &instr, &|_| {})
            .unwrap_err();
        assert_eq!(err.to_string(), "apt manager requires a 'package' field");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_install_streams_output() {
        let runner = FakeRunner::new().lines_when("brew install jq", &["==> Pouring jq"]);
        let env = test_env(runner.clone());
        let seen = std::sync::Mutex::new(Vec::new());

        NativePackage::brew()
            .install(
                &env,
                &CancelToken::new(),
                &Instruction::new("brew").with_package("jq"),
                &|line| seen.lock().unwrap().push(line.to_string()),
            )
            .unwrap();

        assert_eq!(seen.into_inner().unwrap(), vec!["==> Pouring jq"]);
        assert_eq!(runner.calls(), vec!["run: brew install jq"]);
    }

    #[test]
    fn test_privilege() {
        let instr = Instruction::new("x").with_package("y");
        assert!(NativePackage::dnf().requires_privilege(&instr));
        assert!(NativePackage::apt().requires_privilege(&instr));
        assert!(!NativePackage::brew().requires_privilege(&instr));
    }
}
