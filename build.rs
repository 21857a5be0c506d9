// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: recipe file
fn recipe_arg() -> Arg {
    Arg::new("recipe")
        .required(true)
        .value_name("RECIPE")
        .help("Path to the recipe file")
}

/// Kitchen directory and tuning arguments
fn kitchen_args() -> Vec<Arg> {
    vec![
        Arg::new("source_cache")
            .long("source-cache")
            .value_name("DIR")
            .default_value("/var/cache/pantry/sources")
            .help("Directory for verified downloads"),
        Arg::new("cellar")
            .long("cellar")
            .value_name("DIR")
            .default_value("/opt/pantry/cellar")
            .help("Install prefix root"),
        Arg::new("shared_prefix")
            .long("shared-prefix")
            .value_name("DIR")
            .default_value("/opt/pantry")
            .help("Shared prefix for opt links and shared data"),
        Arg::new("build_root")
            .long("build-root")
            .value_name("DIR")
            .help("Parent directory for build trees"),
        Arg::new("jobs")
            .short('j')
            .long("jobs")
            .value_name("N")
            .help("Number of parallel build jobs"),
        Arg::new("timeout")
            .long("timeout")
            .value_name("SECS")
            .help("Kill any single step running longer than this"),
        Arg::new("keep_builddir")
            .long("keep-builddir")
            .action(ArgAction::SetTrue)
            .help("Keep build directory after completion"),
        Arg::new("no_deps")
            .long("no-deps")
            .action(ArgAction::SetTrue)
            .help("Do not probe the host for declared dependencies"),
        Arg::new("no_tests")
            .long("no-tests")
            .action(ArgAction::SetTrue)
            .help("Skip the recipe's test steps"),
    ]
}

fn feature_args() -> Vec<Arg> {
    vec![
        Arg::new("with")
            .long("with")
            .value_name("FLAG")
            .action(ArgAction::Append)
            .help("Enable a declared feature flag"),
        Arg::new("without")
            .long("without")
            .value_name("FLAG")
            .action(ArgAction::Append)
            .help("Disable a declared feature flag"),
    ]
}

fn build_cli() -> Command {
    Command::new("pantry")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Pantry Contributors")
        .about("Cook versioned package recipes into installed, tested builds")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Verbose output (debug logging)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("cook")
                .about("Build, install and test a package from a recipe")
                .arg(recipe_arg())
                .args(feature_args())
                .args(kitchen_args()),
        )
        .subcommand(
            Command::new("plan")
                .about("Show the resolved build plan without running anything")
                .arg(recipe_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the plan as JSON"),
                )
                .args(feature_args())
                .args(kitchen_args()),
        )
        .subcommand(
            Command::new("fetch")
                .about("Download and verify sources into the cache")
                .arg(recipe_arg())
                .args(kitchen_args()),
        )
        .subcommand(
            Command::new("validate")
                .about("Check recipes for errors and warnings")
                .arg(
                    Arg::new("recipes")
                        .required(true)
                        .num_args(1..)
                        .help("Recipe files to check"),
                ),
        )
        .subcommand(
            Command::new("batch")
                .about("Cook several recipes, dependencies first")
                .arg(
                    Arg::new("recipes")
                        .required(true)
                        .num_args(1..)
                        .help("Recipe files in the set"),
                )
                .args(kitchen_args()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("pantry.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
