// src/commands/fetch.rs

//! Fetch command - warm the source cache

use super::{kitchen, load_recipe};
use crate::cli::KitchenArgs;
use anyhow::{Context, Result};
use std::path::Path;

pub fn cmd_fetch(recipe_path: &Path, args: &KitchenArgs) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;
    let kitchen = kitchen(args);

    println!("Fetching sources for {} {}...", recipe.name(), recipe.pkg_version());
    let sources = kitchen
        .fetch(&recipe)
        .with_context(|| format!("Failed to fetch sources for {}", recipe.name()))?;

    println!("\n[COMPLETE] Fetched {} source file(s):", sources.len());
    for source in &sources {
        println!("  - {}", source.display());
    }

    if kitchen.sources_cached(&recipe)? {
        println!("\n[OK] All sources are cached. Ready for offline build.");
    }

    Ok(())
}
