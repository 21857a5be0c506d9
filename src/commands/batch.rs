// src/commands/batch.rs

//! Batch command - cook a set of recipes in dependency order

use super::{kitchen, load_recipe};
use crate::cli::KitchenArgs;
use anyhow::{Context, Result, bail};
use pantry::RecipeGraph;
use std::path::PathBuf;

pub fn cmd_batch(recipes: &[PathBuf], args: &KitchenArgs) -> Result<()> {
    let mut graph = RecipeGraph::new();
    for path in recipes {
        graph.insert(load_recipe(path)?)?;
    }

    let waves = graph.waves().context("Cannot order recipes")?;
    println!("Cooking {} recipe(s) in {} wave(s)", graph.len(), waves.len());
    for (number, wave) in waves.iter().enumerate() {
        let names: Vec<&str> = wave.iter().map(|r| r.name()).collect();
        println!("  {}. {}", number + 1, names.join(", "));
    }

    let report = kitchen(args).cook_batch(&graph)?;

    for result in &report.cooked {
        println!("[COMPLETE] {} {}", result.package, result.version);
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }
    for failure in &report.failed {
        eprintln!("[FAILED] {} at stage {}: {}", failure.package, failure.stage, failure.error);
    }
    for name in &report.skipped {
        eprintln!("[SKIPPED] {}", name);
    }

    if !report.is_success() {
        bail!(
            "{} failed, {} skipped",
            report.failed.len(),
            report.skipped.len()
        );
    }
    Ok(())
}
