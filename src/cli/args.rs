//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Use this project directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::{BuildMode, FailurePolicy};

/// amitree - Build machine images in inheritance order from a directory tree
#[derive(Parser, Debug)]
#[command(name = "amitree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if amitree was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Minimal output; only errors are logged
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the inheritance tree scanned from the project
    #[command(
        name = "tree",
        long_about = "Print the inheritance tree scanned from the project as JSON.\n\n\
            Directories become nested objects; each provisioners directory becomes \
            the sorted list of script versions it holds. Use this to check how \
            amitree reads your layout before planning a build.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Show the tree of the current project
    amitree tree

    # Show the tree of another project
    amitree --cwd ../base-images tree"
    )]
    Tree,

    /// Show the ordered build plan
    #[command(
        name = "plan",
        long_about = "Show the ordered build plan compiled from the project tree.\n\n\
            Every image appears after the image it is built from. The plan digest \
            changes whenever the set or order of steps changes.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Human-readable plan
    amitree plan

    # Machine-readable plan for scripting
    amitree plan --json"
    )]
    Plan {
        /// Output the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build every image whose source image exists
    #[command(
        name = "build",
        long_about = "Build every missing image whose source image is registered.\n\n\
            Images already present in the registry are skipped. After each build \
            the registry is queried again so later steps can build on the new \
            image. Steps whose source image is missing are reported, not built.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Build everything that can be built
    amitree build

    # See what would be built without invoking packer
    amitree build --dry-run

    # Keep going after a failed build, retrying blocked steps
    amitree build --on-failure continue --mode fixed-point

    # Report for CI
    amitree build --json > report.json"
    )]
    Build {
        /// Show what would be built without invoking the builder
        #[arg(long)]
        dry_run: bool,

        /// How to walk the plan (overrides config)
        #[arg(long, value_enum)]
        mode: Option<BuildModeArg>,

        /// What to do after a failed build (overrides config)
        #[arg(long, value_enum)]
        on_failure: Option<FailurePolicyArg>,

        /// Output the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List images currently in the registry
    #[command(
        name = "images",
        long_about = "List the images currently registered, by name.\n\n\
            This runs the same registry query the build command uses.",
        after_help = "\
WORKFLOW EXAMPLES:
    amitree images
    amitree images --json"
    )]
    Images {
        /// Output the images as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for amitree commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    amitree completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    amitree completion zsh >> ~/.zshrc

    # Fish
    amitree completion fish > ~/.config/fish/completions/amitree.fish

    # PowerShell
    amitree completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Build mode
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum BuildModeArg {
    /// One pass over the plan
    SinglePass,
    /// Repeat passes until nothing more can be built
    FixedPoint,
}

impl From<BuildModeArg> for BuildMode {
    fn from(arg: BuildModeArg) -> Self {
        match arg {
            BuildModeArg::SinglePass => BuildMode::SinglePass,
            BuildModeArg::FixedPoint => BuildMode::FixedPoint,
        }
    }
}

/// Failure policy
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum FailurePolicyArg {
    /// Stop at the first failed build
    Halt,
    /// Record the failure and keep going
    Continue,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(arg: FailurePolicyArg) -> Self {
        match arg {
            FailurePolicyArg::Halt => FailurePolicy::Halt,
            FailurePolicyArg::Continue => FailurePolicy::Continue,
        }
    }
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// List effective configuration values
    List,
    /// Show which config files are in use
    Path,
    /// Write a default amitree.toml into the project
    Init,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_build_overrides() {
        let cli = Cli::try_parse_from([
            "amitree",
            "build",
            "--dry-run",
            "--mode",
            "fixed-point",
            "--on-failure",
            "continue",
        ])
        .unwrap();

        match cli.command {
            Command::Build {
                dry_run,
                mode,
                on_failure,
                json,
            } => {
                assert!(dry_run);
                assert!(!json);
                assert_eq!(mode.map(BuildMode::from), Some(BuildMode::FixedPoint));
                assert_eq!(
                    on_failure.map(FailurePolicy::from),
                    Some(FailurePolicy::Continue)
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["amitree", "plan", "--cwd", "/tmp/x", "-q"]).unwrap();
        assert_eq!(cli.cwd, Some(PathBuf::from("/tmp/x")));
        assert!(cli.quiet);
    }

    #[test]
    fn debug_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["amitree", "--debug", "--quiet", "tree"]).is_err());
    }
}
