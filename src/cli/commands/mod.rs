//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads configuration for the project directory
//! 2. Calls the engine to scan, compile or build
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Commands that talk to the registry or builder (build, images) are async
//! because they wait on external processes. Their handlers create a tokio
//! runtime and `block_on` the async implementation.

mod build;
mod completion;
mod config_cmd;
mod images;
mod plan;
mod tree;

pub use build::build;
pub use completion::completion;
pub use config_cmd::{init as config_init, list as config_list, path as config_path};
pub use images::images;
pub use plan::plan;
pub use tree::tree;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::builder::packer::PackerBuilder;
use crate::cli::args::{Command, ConfigAction};
use crate::core::config::Config;
use crate::engine::Context;
use crate::registry::aws::AwsCliRegistry;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Tree => tree::tree(ctx),
        Command::Plan { json } => plan::plan(ctx, json),
        Command::Build {
            dry_run,
            mode,
            on_failure,
            json,
        } => build::build(
            ctx,
            build::BuildArgs {
                dry_run,
                mode: mode.map(Into::into),
                on_failure: on_failure.map(Into::into),
                json,
            },
        ),
        Command::Images { json } => images::images(ctx, json),
        Command::Config { action } => match action {
            ConfigAction::List => config_cmd::list(ctx),
            ConfigAction::Path => config_cmd::path(ctx),
            ConfigAction::Init => config_cmd::init(ctx),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Resolve the project directory and load its configuration.
pub(crate) fn load_project(ctx: &Context) -> Result<(PathBuf, Config)> {
    let project_dir = ctx
        .project_dir()
        .context("Failed to determine project directory")?;
    let config = Config::load(Some(&project_dir)).context("Failed to load config")?;
    Ok((project_dir, config))
}

/// The registry client described by the configuration.
pub(crate) fn registry_client(config: &Config) -> AwsCliRegistry {
    AwsCliRegistry::new(config.aws_binary())
        .with_owners(config.aws_owners())
        .with_region(config.aws_region().map(String::from))
        .with_profile(config.aws_profile().map(String::from))
}

/// The builder described by the configuration.
pub(crate) fn packer_builder(config: &Config, project_dir: &std::path::Path) -> PackerBuilder {
    PackerBuilder::new(
        config.packer_binary(),
        config.packer_template(),
        project_dir,
    )
    .with_vars(config.packer_vars())
}
