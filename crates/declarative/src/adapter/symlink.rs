//! Symlink adapter - native stow replacement
//!
//! Link sources are relative to the environment's reference directory.
//! Targets accept a leading `~` and environment variables.

use super::{Adapter, ids};
use crate::context::{CancelToken, Env};
use crate::error::{Error, Result};
use crate::manifest::{Instruction, Link};
use crate::runner::LineCallback;
use std::path::{Component, Path, PathBuf};

/// Number of source names shown before eliding a multi-link summary
const SUMMARY_NAMES: usize = 3;

#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkAdapter;

impl SymlinkAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn expand_target(env: &Env, target: &str) -> Result<PathBuf> {
    if target == "~" || target.starts_with("~/") {
        let home = env
            .fs
            .home_dir()
            .ok_or_else(|| Error::Environment("could not determine home directory".into()))?;
        return Ok(match target.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => home,
        });
    }

    // Unset variables expand to nothing
    let expanded = shellexpand::env_with_context_no_errors(target, |var| {
        Some(std::env::var(var).unwrap_or_default())
    });
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Absolute, cleaned source and target for a link
fn resolve(env: &Env, link: &Link) -> Result<(PathBuf, PathBuf)> {
    let source = clean_path(&env.reference_dir.join(&link.source));
    let target = clean_path(&expand_target(env, &link.target)?);
    Ok((source, target))
}

/// Whether `target` is a symlink whose cleaned destination is exactly `source`
fn points_at(env: &Env, source: &Path, target: &Path) -> bool {
    let Ok(meta) = env.fs.symlink_metadata(target) else {
        return false;
    };
    if !meta.file_type().is_symlink() {
        return false;
    }
    env.fs
        .read_link(target)
        .is_ok_and(|dest| clean_path(&dest) == source)
}

fn fs_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.to_path_buf();
    move |source| Error::Filesystem {
        action,
        path,
        source,
    }
}

impl Adapter for SymlinkAdapter {
    fn name(&self) -> &'static str {
        ids::SYMLINK
    }

    fn exists(&self, env: &Env, cancel: &CancelToken, instruction: &Instruction) -> Result<bool> {
        for link in &instruction.links {
            cancel.check()?;
            let (source, target) = resolve(env, link)?;
            if !points_at(env, &source, &target) {
                log::debug!("{} does not point at {}", target.display(), source.display());
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn render_command(&self, _env: &Env, instruction: &Instruction) -> String {
        if let [link] = instruction.links.as_slice() {
            return format!("ln -sf {} {}", link.source, link.target);
        }

        let mut names: Vec<String> = instruction
            .links
            .iter()
            .take(SUMMARY_NAMES)
            .map(|link| {
                Path::new(&link.source)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| link.source.clone())
            })
            .collect();
        if instruction.links.len() > SUMMARY_NAMES {
            names.push("...".to_string());
        }

        format!(
            "ln -sf [{}] ({} files)",
            names.join(", "),
            instruction.links.len()
        )
    }

    fn install(
        &self,
        env: &Env,
        cancel: &CancelToken,
        instruction: &Instruction,
        on_line: LineCallback<'_>,
    ) -> Result<()> {
        for link in &instruction.links {
            cancel.check()?;
            let (source, target) = resolve(env, link)?;

            if let Some(parent) = target.parent() {
                env.fs
                    .create_dir_all(parent)
                    .map_err(fs_error("create directory", parent))?;
            }

            if env.fs.symlink_metadata(&target).is_ok() {
                env.fs
                    .remove(&target)
                    .map_err(fs_error("remove existing target", &target))?;
            }

            env.fs
                .symlink(&source, &target)
                .map_err(fs_error("create symlink", &target))?;

            on_line(&format!("{} -> {}", target.display(), source.display()));
        }
        Ok(())
    }
}
