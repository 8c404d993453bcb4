//! Centralized path resolution for settle
//!
//! # Environment Variables
//!
//! - `SETTLE_STATE_DIR` - Override state directory
//! - `SETTLE_LOG_DIR` - Override log directory
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `SETTLE_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/settle` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\settle`
//!    - macOS/Linux: `~/.local/state/settle`
//!
//! For log_dir():
//! 1. `SETTLE_LOG_DIR` environment variable
//! 2. `<state_dir>/logs`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "SETTLE_STATE_DIR";

/// Environment variable for log directory override
pub const ENV_LOG_DIR: &str = "SETTLE_LOG_DIR";

/// Get the settle state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("settle");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join("settle"));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("settle"))
}

/// Get the directory run logs are written to
pub fn log_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_LOG_DIR) {
        return Ok(expand(&dir));
    }
    Ok(state_dir()?.join("logs"))
}

/// Log file for a run started at `now`
pub fn log_file(dir: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    dir.join(format!("settle-{}.log", now.format("%Y%m%d-%H%M%S")))
}

/// Directory link sources are resolved against: `root`, or the parent of
/// the working directory
pub fn reference_dir(root: Option<&Path>) -> Result<PathBuf> {
    let base = match root {
        Some(root) => expand(&root.to_string_lossy()),
        None => {
            let cwd = std::env::current_dir().context("Could not read working directory")?;
            cwd.parent().map(Path::to_path_buf).unwrap_or(cwd)
        }
    };
    if base.is_absolute() {
        Ok(base)
    } else {
        let cwd = std::env::current_dir().context("Could not read working directory")?;
        Ok(cwd.join(base))
    }
}

/// Expand `~` and environment variables in a path
///
/// Unknown variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
