//! Manifest data model
//!
//! A manifest is an ordered list of stages, each an ordered list of steps.
//! Every step carries one [`Instruction`] per platform; at most one of them
//! is selected per run.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Platform key used when no exact platform match exists
pub const DEFAULT_PLATFORM: &str = "default";

/// The desired state of a machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// A named, ordered group of steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A unit of desired state with per-platform instructions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    /// Marks steps that change the shell environment (informational)
    #[serde(default)]
    pub env_update: bool,
    #[serde(default)]
    pub instructions: HashMap<String, Instruction>,
}

impl Step {
    /// Select the instruction for a platform, falling back to `default`
    pub fn instruction_for(&self, platform: &str) -> Option<&Instruction> {
        self.instructions
            .get(platform)
            .or_else(|| self.instructions.get(DEFAULT_PLATFORM))
    }
}

/// How to check for and install one unit on one platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Adapter identifier, e.g. "shell", "dnf", "symlink"
    pub manager: String,

    /// Raw shell command; exit status 0 means present
    #[serde(default, rename = "check", skip_serializing_if = "Option::is_none")]
    pub check_cmd: Option<String>,

    /// Executable to look up in PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,

    /// Raw shell command run by the shell adapter
    #[serde(default, rename = "install", skip_serializing_if = "Option::is_none")]
    pub install_cmd: Option<String>,

    /// Package identifier for package-manager adapters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default)]
    pub hooks: Hooks,
}

impl Instruction {
    /// Create an instruction for the given adapter
    pub fn new(manager: &str) -> Self {
        Self {
            manager: manager.to_string(),
            ..Default::default()
        }
    }

    pub fn with_check(mut self, cmd: &str) -> Self {
        self.check_cmd = Some(cmd.to_string());
        self
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = Some(binary.to_string());
        self
    }

    pub fn with_install(mut self, cmd: &str) -> Self {
        self.install_cmd = Some(cmd.to_string());
        self
    }

    pub fn with_package(mut self, package: &str) -> Self {
        self.package = Some(package.to_string());
        self
    }

    pub fn with_link(mut self, source: &str, target: &str) -> Self {
        self.links.push(Link {
            source: source.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn with_hooks(mut self, before: &[&str], after: &[&str]) -> Self {
        self.hooks = Hooks {
            before: before.iter().map(ToString::to_string).collect(),
            after: after.iter().map(ToString::to_string).collect(),
        };
        self
    }

    /// Non-empty check command, if any
    pub fn check_command(&self) -> Option<&str> {
        self.check_cmd.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Non-empty required binary, if any
    pub fn required_binary(&self) -> Option<&str> {
        self.binary.as_deref().filter(|b| !b.trim().is_empty())
    }

    /// Non-empty install command, if any
    pub fn install_command(&self) -> Option<&str> {
        self.install_cmd.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Non-empty package name, if any
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// A symlink from a manifest-relative source to a target path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
}

/// Shell commands run around a step's install action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

/// Manifest file formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Toml,
    Json,
}

impl ManifestFormat {
    /// Detect the format from a file extension (YAML when unknown)
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl Manifest {
    /// Load a manifest from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = match ManifestFormat::from_path(path) {
            ManifestFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
            ManifestFormat::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
            ManifestFormat::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
        };

        let manifest: Self = parsed.map_err(|message| Error::ManifestParse {
            path: path.to_path_buf(),
            message,
        })?;

        log::debug!(
            "Loaded manifest {} ({} stages, {} steps)",
            path.display(),
            manifest.stages.len(),
            manifest.step_count()
        );
        Ok(manifest)
    }

    /// Parse a YAML manifest from a string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ManifestParse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Total number of declared steps
    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|s| s.steps.len()).sum()
    }

    /// Number of steps that have an instruction for the platform
    pub fn applicable_steps(&self, platform: &str) -> usize {
        self.stages
            .iter()
            .flat_map(|s| &s.steps)
            .filter(|step| step.instruction_for(platform).is_some())
            .count()
    }
}
