//! Language toolchain installers

use super::{Adapter, CommandAdapter, Invocation, ids};
use crate::context::{CancelToken, Env};
use crate::error::{Error, Result};
use crate::manifest::Instruction;
use crate::runner::LineCallback;

/// `cargo install` crates, checked against `cargo install --list`
#[derive(Debug, Clone, Copy)]
pub struct CargoAdapter {
    base: CommandAdapter,
}

fn install_args(instruction: &Instruction) -> Result<Invocation> {
    let pkg = instruction.package_name().ok_or(Error::MissingField {
        adapter: ids::CARGO,
        field: "package",
    })?;
    Ok(Invocation::new("cargo", &["install", "--locked", pkg]))
}

/// Whether `cargo install --list` output mentions the crate
///
/// Installed crates appear as `name vX.Y.Z:`; the `name v` marker is
/// matched anywhere in the listing.
fn listed(list: &str, pkg: &str) -> bool {
    list.contains(&format!("{pkg} v"))
}

impl CargoAdapter {
    pub fn new() -> Self {
        Self {
            base: CommandAdapter::new(install_args),
        }
    }
}

impl Default for CargoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for CargoAdapter {
    fn name(&self) -> &'static str {
        ids::CARGO
    }

    fn exists(&self, env: &Env, cancel: &CancelToken, instruction: &Instruction) -> Result<bool> {
        let Some(pkg) = instruction.package_name() else {
            return Ok(false);
        };
        match env
            .runner
            .output(cancel, "cargo", &["install", "--list"], &env.path)
        {
            Ok(list) => Ok(listed(&list, pkg)),
            Err(e) if e.is_absence() => Ok(false),
            Err(e) => Err(e),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, test_env};

    const LIST: &str = "bat v0.24.0:\n    bat\nripgrep v14.1.0:\n    rg\n";

    #[test]
    fn test_listed_matches_name_and_version_marker() {
        assert!(listed(LIST, "ripgrep"));
        assert!(listed(LIST, "bat"));
        assert!(!listed(LIST, "rg"));
        assert!(!listed(LIST, "zoxide"));
    }

    #[test]
    fn test_listed_is_a_substring_match() {
        // The marker may appear anywhere, so a suffix of an installed name matches
        assert!(listed(LIST, "grep"));
        assert!(listed("  bat v0.24.0:", "bat"));
    }

    #[test]
    fn test_exists_reads_install_list() {
        let runner = FakeRunner::new().output_when("cargo install --list", LIST);
        let env = test_env(runner.clone());
        let cargo = CargoAdapter::new();
        let cancel = CancelToken::new();

        assert!(
            cargo
                .exists(&env, &cancel, &Instruction::new("cargo").with_package("bat"))
                .unwrap()
        );
        assert!(
            !cargo
                .exists(&env, &cancel, &Instruction::new("cargo").with_package("zoxide"))
                .unwrap()
        );
    }

    #[test]
    fn test_missing_cargo_reads_absent() {
        let env = test_env(FakeRunner::new().fail_when("cargo install --list"));
        let instr = Instruction::new("cargo").with_package("bat");
        assert!(!CargoAdapter::new().exists(&env, &CancelToken::new(), &instr).unwrap());
    }

    #[test]
    fn test_render_and_install() {
        let runner = FakeRunner::new();
        let env = test_env(runner.clone());
        let instr = Instruction::new("cargo").with_package("zoxide");

        assert_eq!(
            CargoAdapter::new().render_command(&env, &instr),
            "cargo install --locked zoxide"
        );
        CargoAdapter::new()
            .install(&env, &CancelToken::new(), &instr, &|_| {})
            .unwrap();
        assert_eq!(runner.calls(), vec!["run: cargo install --locked zoxide"]);
    }
}
