// src/cli/mod.rs
//! CLI definitions for pantry
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(author = "Pantry Contributors")]
#[command(version)]
#[command(about = "Cook versioned package recipes into installed, tested builds", long_about = None)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Directory and tuning options shared by commands that touch the kitchen
#[derive(Args, Debug, Clone)]
pub struct KitchenArgs {
    /// Directory for verified downloads
    #[arg(long, default_value = "/var/cache/pantry/sources")]
    pub source_cache: PathBuf,

    /// Install prefix root; packages land in <cellar>/<name>/<version>
    #[arg(long, default_value = "/opt/pantry/cellar")]
    pub cellar: PathBuf,

    /// Shared prefix for opt links and shared data
    #[arg(long, default_value = "/opt/pantry")]
    pub shared_prefix: PathBuf,

    /// Parent directory for build trees (default: system temp dir)
    #[arg(long)]
    pub build_root: Option<PathBuf>,

    /// Number of parallel build jobs (default: number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<u32>,

    /// Kill any single step running longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Keep build directory after completion (for debugging)
    #[arg(long)]
    pub keep_builddir: bool,

    /// Do not probe the host for declared dependencies
    #[arg(long)]
    pub no_deps: bool,

    /// Skip the recipe's test steps
    #[arg(long)]
    pub no_tests: bool,
}

/// Feature flag overrides
#[derive(Args, Debug, Clone, Default)]
pub struct FeatureArgs {
    /// Enable a declared feature flag (repeatable)
    #[arg(long = "with", value_name = "FLAG")]
    pub with: Vec<String>,

    /// Disable a declared feature flag (repeatable)
    #[arg(long = "without", value_name = "FLAG")]
    pub without: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, install and test a package from a recipe
    Cook {
        /// Path to the recipe file
        recipe: PathBuf,

        #[command(flatten)]
        features: FeatureArgs,

        #[command(flatten)]
        kitchen: KitchenArgs,
    },

    /// Show the resolved build plan without running anything
    Plan {
        /// Path to the recipe file
        recipe: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        features: FeatureArgs,

        #[command(flatten)]
        kitchen: KitchenArgs,
    },

    /// Download and verify sources into the cache (for offline builds)
    Fetch {
        /// Path to the recipe file
        recipe: PathBuf,

        #[command(flatten)]
        kitchen: KitchenArgs,
    },

    /// Check a recipe for errors and warnings
    Validate {
        /// Recipe files to check
        #[arg(required = true)]
        recipes: Vec<PathBuf>,
    },

    /// Cook several recipes, dependencies first
    Batch {
        /// Recipe files in the set
        #[arg(required = true)]
        recipes: Vec<PathBuf>,

        #[command(flatten)]
        kitchen: KitchenArgs,
    },
}
