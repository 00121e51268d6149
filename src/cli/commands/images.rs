//! images command - List registered images

use crate::engine::Context;
use crate::registry::ImageRegistryClient;
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};

/// List the images the registry reports, sorted by name.
pub fn images(ctx: &Context, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(images_async(ctx, json))
}

async fn images_async(ctx: &Context, json: bool) -> Result<()> {
    let (_, config) = super::load_project(ctx)?;
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let client = super::registry_client(&config);

    let images = client
        .fetch_images()
        .await
        .context("Failed to query image registry")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&images)?);
        return Ok(());
    }

    if images.is_empty() {
        output::print("No images found.", verbosity);
        return Ok(());
    }
    for (name, id) in images.iter() {
        println!("{}\t{}", id, name);
    }
    Ok(())
}
