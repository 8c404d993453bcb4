use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use clap_complete::Shell;
use std::ffi::OsString;
use std::path::PathBuf;

/// Ids of the top-level `apply` arguments
const APPLY_ARG_IDS: &[&str] = &["manifest", "root", "platform", "jobs", "dry_run", "yes"];

#[derive(Parser)]
#[command(name = "settle")]
#[command(version)]
#[command(about = "Reconcile installed software and dotfile symlinks against a manifest", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level of the run log
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments for `apply` when no subcommand is given
    #[command(flatten)]
    pub apply: ApplyArgs,
}

impl Cli {
    /// Parse the process arguments, exiting with usage on error
    pub fn parse_checked() -> Self {
        Self::try_parse_checked(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    /// Parse arguments, rejecting `apply` flags given before a subcommand
    ///
    /// Global flags (`-v`, `-q`) are accepted in either position.
    pub fn try_parse_checked<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut command = Self::command();
        let matches = command.try_get_matches_from_mut(args)?;

        if let Some((name, _)) = matches.subcommand()
            && let Some(id) = APPLY_ARG_IDS
                .iter()
                .find(|id| matches.value_source(id) == Some(ValueSource::CommandLine))
        {
            return Err(command.error(
                ErrorKind::ArgumentConflict,
                format!(
                    "'--{}' cannot be used before the '{name}' subcommand",
                    id.replace('_', "-")
                ),
            ));
        }

        Self::from_arg_matches(&matches).map_err(|e| e.format(&mut command))
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Check the manifest, pick steps, and install what is missing
    Apply(ApplyArgs),

    /// Show which steps would be installed, without changing anything
    Status(PlanArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Inputs shared by every command that plans a manifest
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Manifest file (.yaml, .yml, .toml or .json)
    #[arg(
        short,
        long,
        env = "SETTLE_MANIFEST",
        default_value = "../packages.yaml"
    )]
    pub manifest: PathBuf,

    /// Directory link sources are relative to [default: parent of cwd]
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Platform key to select instructions for [default: detected]
    #[arg(long)]
    pub platform: Option<String>,

    /// Number of concurrent existence checks
    #[arg(short, long, default_value_t = declarative::DEFAULT_JOBS)]
    pub jobs: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Log the commands that would run instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Install every planned step without asking
    #[arg(short, long)]
    pub yes: bool,
}
