// src/commands/validate.rs

//! Validate command - parse recipes and report problems

use anyhow::{Result, bail};
use pantry::recipe::{parse_recipe_file, validate_recipe};
use std::path::PathBuf;

pub fn cmd_validate(recipes: &[PathBuf]) -> Result<()> {
    let mut failed = 0;

    for path in recipes {
        match parse_recipe_file(path) {
            Ok(recipe) => {
                let warnings = validate_recipe(&recipe);
                if warnings.is_empty() {
                    println!(
                        "[OK] {} ({} {})",
                        path.display(),
                        recipe.name(),
                        recipe.pkg_version()
                    );
                } else {
                    println!(
                        "[OK] {} ({} {}), {} warning(s)",
                        path.display(),
                        recipe.name(),
                        recipe.pkg_version(),
                        warnings.len()
                    );
                    for warning in &warnings {
                        println!("  - {}", warning);
                    }
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("[ERROR] {}: {}", path.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} recipe(s) failed validation", failed, recipes.len());
    }
    Ok(())
}
