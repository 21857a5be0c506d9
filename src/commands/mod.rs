// src/commands/mod.rs
//! Command handlers for the pantry CLI

mod batch;
mod cook;
mod fetch;
mod plan;
mod validate;

pub use batch::cmd_batch;
pub use cook::cmd_cook;
pub use fetch::cmd_fetch;
pub use plan::cmd_plan;
pub use validate::cmd_validate;

use crate::cli::{FeatureArgs, KitchenArgs};
use anyhow::{Context, Result};
use pantry::recipe::{FeatureOverrides, Recipe, parse_recipe_file};
use pantry::{Kitchen, KitchenConfig};
use std::path::Path;
use std::time::Duration;

/// Build the kitchen configuration from command-line flags
pub(crate) fn kitchen_config(args: &KitchenArgs) -> KitchenConfig {
    let mut config = KitchenConfig {
        source_cache: args.source_cache.clone(),
        cellar: args.cellar.clone(),
        shared_prefix: args.shared_prefix.clone(),
        step_timeout: args.timeout.map(Duration::from_secs),
        keep_builddir: args.keep_builddir,
        check_dependencies: !args.no_deps,
        run_tests: !args.no_tests,
        ..KitchenConfig::default()
    };

    if let Some(root) = &args.build_root {
        config.build_root = root.clone();
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }

    config
}

pub(crate) fn kitchen(args: &KitchenArgs) -> Kitchen {
    Kitchen::new(kitchen_config(args))
}

pub(crate) fn overrides(args: &FeatureArgs) -> FeatureOverrides {
    FeatureOverrides::from_lists(&args.with, &args.without)
}

pub(crate) fn load_recipe(path: &Path) -> Result<Recipe> {
    parse_recipe_file(path).with_context(|| format!("Failed to parse recipe: {}", path.display()))
}
