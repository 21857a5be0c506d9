// src/commands/cook.rs

//! Cook command - build, install and test a package from a recipe

use super::{kitchen, load_recipe, overrides};
use crate::cli::{FeatureArgs, KitchenArgs};
use anyhow::Result;
use pantry::recipe::validate_recipe;
use std::path::Path;
use tracing::info;

/// Cook a package from a recipe
///
/// Exits non-zero with the failing stage and reason on stderr when the cook
/// ends in the failed state.
pub fn cmd_cook(recipe_path: &Path, features: &FeatureArgs, args: &KitchenArgs) -> Result<()> {
    println!("Reading recipe: {}", recipe_path.display());
    let recipe = load_recipe(recipe_path)?;
    println!("Recipe: {} version {}", recipe.name(), recipe.pkg_version());

    for warning in validate_recipe(&recipe) {
        println!("Warning: {}", warning);
    }

    let kitchen = kitchen(args);
    let config = kitchen.config();
    println!("Cooking with {} parallel jobs...", config.jobs);
    if let Some(timeout) = config.step_timeout {
        println!("  - Step timeout: {}s", timeout.as_secs());
    }
    if kitchen.sources_cached(&recipe).unwrap_or(false) {
        println!("  - Sources already cached (offline build possible)");
    }

    match kitchen.cook(&recipe, &overrides(features)) {
        Ok(result) => {
            println!("\n[COMPLETE] Cooked: {} {}", result.package, result.version);
            println!("  Prefix: {}", result.prefix.display());
            println!("  Files: {}", result.installed_files.len());
            println!("  Tests passed: {}", result.tests_run);

            if !result.warnings.is_empty() {
                println!("\nBuild warnings:");
                for warning in &result.warnings {
                    println!("  - {}", warning);
                }
            }

            info!("Successfully cooked {} into {}", result.package, result.prefix.display());
            Ok(())
        }
        Err(failure) => {
            eprintln!("\n[FAILED] {} at stage {}", failure.package, failure.stage);
            eprintln!("{}", failure.error);
            if args.keep_builddir {
                eprintln!("\nBuild log:\n{}", failure.log);
            }
            Err(failure.into())
        }
    }
}
