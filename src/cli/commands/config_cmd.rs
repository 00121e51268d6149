//! config command - Show or initialize configuration

use crate::core::config::{Config, LayoutConfig, ProjectConfig};
use crate::engine::Context;
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};

/// List effective configuration values.
pub fn list(ctx: &Context) -> Result<()> {
    let (_, config) = super::load_project(ctx)?;
    let naming = config.naming();

    println!("# Layout");
    println!("layout.root = {}", naming.root_label);
    println!("layout.scripts = {}", naming.scripts_label);
    println!("layout.extension = {}", naming.script_extension);
    println!("layout.version_separator = {}", naming.version_separator);
    println!("layout.node_separator = {}", naming.node_separator);
    println!(
        "layout.ignore = {}",
        naming.ignore.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    println!();
    println!("# Packer");
    println!("packer.binary = {}", config.packer_binary());
    println!("packer.template = {}", config.packer_template());
    for (key, value) in config.packer_vars() {
        println!("packer.vars.{} = {}", key, value);
    }

    println!();
    println!("# AWS");
    println!("aws.binary = {}", config.aws_binary());
    println!("aws.owners = {}", config.aws_owners().join(", "));
    println!("aws.region = {}", config.aws_region().unwrap_or("(not set)"));
    println!("aws.profile = {}", config.aws_profile().unwrap_or("(not set)"));

    println!();
    println!("# Build");
    println!("build.mode = {}", config.build_mode());
    println!("build.on_failure = {}", config.failure_policy());

    Ok(())
}

/// Show which config files are in use.
pub fn path(ctx: &Context) -> Result<()> {
    let (project_dir, config) = super::load_project(ctx)?;

    match config.global_config_loaded_from() {
        Some(path) => println!("global: {}", path.display()),
        None => println!(
            "global: (none, would be {})",
            Config::global_config_path()?.display()
        ),
    }
    match config.project_config_loaded_from() {
        Some(path) => println!("project: {}", path.display()),
        None => println!(
            "project: (none, would be {})",
            Config::project_config_path(&project_dir).display()
        ),
    }
    Ok(())
}

/// Write a project config spelling out the default layout.
pub fn init(ctx: &Context) -> Result<()> {
    let project_dir = ctx
        .project_dir()
        .context("Failed to determine project directory")?;
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let naming = crate::core::naming::NamingConvention::default();
    let config = ProjectConfig {
        layout: Some(LayoutConfig {
            root: Some(naming.root_label),
            scripts: Some(naming.scripts_label),
            extension: Some(naming.script_extension),
            version_separator: Some(naming.version_separator),
            node_separator: Some(naming.node_separator),
            ignore: Some(naming.ignore.into_iter().collect()),
        }),
        ..Default::default()
    };

    let path = Config::write_project(&project_dir, &config).context("Failed to write config")?;
    output::success(format!("Wrote {}", path.display()), verbosity);
    Ok(())
}
