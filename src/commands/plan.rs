// src/commands/plan.rs

//! Plan command - show what a cook would do

use super::{kitchen, load_recipe, overrides};
use crate::cli::{FeatureArgs, KitchenArgs};
use anyhow::{Context, Result};
use std::path::Path;

pub fn cmd_plan(
    recipe_path: &Path,
    json: bool,
    features: &FeatureArgs,
    args: &KitchenArgs,
) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;
    let plan = kitchen(args)
        .plan(&recipe, &overrides(features))
        .with_context(|| format!("Failed to resolve {}", recipe.name()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{} {}", plan.package, plan.version);
    println!("  Prefix: {}", plan.layout.prefix.display());
    println!("  Build dir: {}", plan.layout.build_dir.display());

    if !plan.dependencies.is_empty() {
        println!("\nDependencies:");
        for dep in &plan.dependencies {
            match &dep.min_version {
                Some(min) => println!("  {} ({}, >= {})", dep.name, dep.scope, min),
                None => println!("  {} ({})", dep.name, dep.scope),
            }
        }
    }

    println!("\nSources:");
    for item in plan.fetch_items() {
        println!("  {}", item.url);
        println!("    {}", item.checksum);
    }
    for skipped in &plan.skipped_patches {
        println!(
            "  (skipped patch #{}: {} requires {})",
            skipped.index, skipped.url, skipped.condition
        );
    }

    if !plan.feature_args.is_empty() {
        println!("\nFeatures: {}", plan.feature_args.join(" "));
    }

    let sections = [
        ("Install", &plan.install),
        ("Post-install", &plan.post_install),
    ];
    for (title, steps) in sections {
        if steps.is_empty() {
            continue;
        }
        println!("\n{}:", title);
        for (index, step) in steps.iter().enumerate() {
            println!("  {}. {}", index, step.command_line());
        }
    }

    if !plan.share.is_empty() {
        println!("\nShare:");
        for item in &plan.share {
            println!("  {} -> {}", item.from.display(), item.to.display());
        }
    }

    if !plan.tests.is_empty() {
        println!("\nTests:");
        for (index, test) in plan.tests.iter().enumerate() {
            println!("  {}. {}", index, test.invocation.command_line());
            if let Some(expected) = &test.expect_output {
                println!("     expect output: {:?}", expected);
            }
            for path in &test.expect_paths {
                println!("     expect path: {}", path.display());
            }
        }
    }

    Ok(())
}
