// src/recipe/parser.rs

//! Recipe file parsing and validation

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::recipe::condition::HostCondition;
use crate::recipe::features::FeatureSet;
use crate::recipe::format::{RecipeManifest, StepSpec, TestSpec};
use crate::recipe::model::{Dependency, Patch, Recipe, Source, Step, TestStep};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::LazyLock;
use tracing::debug;

static VERSION_IN_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-_]v?(\d+(?:\.\d+)+)\.(?:tar(?:\.\w+)?|tgz|txz|tbz2|zip)$")
        .expect("static regex is valid")
});

/// Parse a recipe from a TOML string
///
/// Relative patch paths are left as written (resolved against the current
/// directory at fetch time).
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    let manifest: RecipeManifest = toml::from_str(content)?;
    build_recipe(manifest, None)
}

/// Parse a recipe from a file
///
/// Relative patch paths are resolved against the recipe's directory.
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::MalformedRecipe(format!("cannot read {}: {}", path.display(), e))
    })?;

    let manifest: RecipeManifest = toml::from_str(&content)
        .map_err(|e| Error::MalformedRecipe(format!("{}: {}", path.display(), e)))?;
    build_recipe(manifest, path.parent())
}

/// Check a recipe for gaps that do not prevent cooking
pub fn validate_recipe(recipe: &Recipe) -> Vec<String> {
    let mut warnings = Vec::new();

    if recipe.summary().is_none() {
        warnings.push("Missing package summary".to_string());
    }
    if recipe.license().is_none() {
        warnings.push("Missing package license".to_string());
    }
    if recipe.install_steps().is_empty() {
        warnings.push("No install steps specified".to_string());
    }
    if recipe.test_steps().is_empty() {
        warnings.push("No test steps specified".to_string());
    }
    for (index, test) in recipe.test_steps().iter().enumerate() {
        if test.expect_output.is_none() && test.expect_paths.is_empty() {
            warnings.push(format!("Test step #{} only checks the exit status", index));
        }
    }
    let uses_features = recipe
        .install_steps()
        .iter()
        .any(|s| s.args.iter().any(|a| a == "%(features)s"));
    if !recipe.features().declared().is_empty() && !uses_features {
        warnings.push(
            "Feature flags are declared but no install step uses %(features)s".to_string(),
        );
    }

    warnings
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::MalformedRecipe(format!("missing required field `{}`", field))),
    }
}

fn parse_checksum(value: &str, field: &str) -> Result<Hash> {
    Hash::parse_prefixed(value)
        .map_err(|e| Error::MalformedRecipe(format!("invalid `{}`: {}", field, e)))
}

/// Guess the version from an archive name like `libheif-1.19.7.tar.gz`
fn infer_version(url: &str) -> Option<String> {
    let filename = url.rsplit('/').next()?;
    VERSION_IN_FILENAME
        .captures(filename)
        .map(|caps| caps[1].to_string())
}

/// Expand name, version and custom variables in a recipe-level string
fn expand(
    template: &str,
    name: &str,
    version: &str,
    vars: &std::collections::BTreeMap<String, String>,
) -> String {
    let mut result = template.replace("%(name)s", name).replace("%(version)s", version);
    for (key, value) in vars {
        result = result.replace(&format!("%({})s", key), value);
    }
    result
}

fn convert_step(spec: StepSpec) -> Step {
    Step {
        tool: spec.tool,
        args: spec.args,
        workdir: spec.workdir,
        env: spec.env,
    }
}

fn convert_test(spec: TestSpec) -> TestStep {
    TestStep {
        step: Step {
            tool: spec.tool,
            args: spec.args,
            workdir: None,
            env: spec.env,
        },
        expect_output: spec.expect_output,
        expect_paths: spec.expect_paths,
    }
}

fn is_remote(url: &str) -> bool {
    url.contains("://")
}

/// Non-empty relative path with no `..` components
fn stays_inside(path: &str) -> bool {
    !path.trim().is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

pub(crate) fn build_recipe(manifest: RecipeManifest, base_dir: Option<&Path>) -> Result<Recipe> {
    let RecipeManifest {
        package,
        source,
        dependencies,
        features,
        patches,
        install,
        share,
        post_install,
        test,
        variables,
    } = manifest;

    let name = required(package.name, "package.name")?;
    let raw_url = required(source.url, "source.url")?;
    let checksum = required(source.checksum, "source.checksum")?;
    let checksum = parse_checksum(&checksum, "source.checksum")?;

    let version = match package.version.filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => infer_version(&raw_url).ok_or_else(|| {
            Error::MalformedRecipe(
                "missing `package.version` and none can be inferred from `source.url`".to_string(),
            )
        })?,
    };

    let url = expand(&raw_url, &name, &version, &variables);

    // Same name twice is fine; same name with two scopes is not
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut deps: Vec<Dependency> = Vec::with_capacity(dependencies.len());
    for spec in dependencies {
        if spec.name.trim().is_empty() {
            return Err(Error::MalformedRecipe("dependency with empty name".to_string()));
        }
        if let Some(&index) = seen.get(&spec.name) {
            let existing = &deps[index];
            if existing.scope != spec.scope {
                return Err(Error::DuplicateDependency {
                    name: spec.name,
                    first: existing.scope,
                    second: spec.scope,
                });
            }
            debug!("Dropping duplicate dependency {}", spec.name);
            continue;
        }
        seen.insert(spec.name.clone(), deps.len());
        deps.push(Dependency {
            name: spec.name,
            scope: spec.scope,
            min_version: spec.min_version,
            pkg_config: spec.pkg_config,
        });
    }

    let mut resolved_patches = Vec::with_capacity(patches.len());
    for (index, spec) in patches.into_iter().enumerate() {
        let field = format!("patches[{}].checksum", index);
        let checksum = parse_checksum(&required(spec.checksum, &field)?, &field)?;
        let condition = spec
            .condition
            .as_deref()
            .map(HostCondition::parse)
            .transpose()?;

        let mut patch_url = expand(&spec.url, &name, &version, &variables);
        if !is_remote(&patch_url)
            && let Some(base) = base_dir
            && Path::new(&patch_url).is_relative()
        {
            patch_url = base.join(&patch_url).to_string_lossy().into_owned();
        }

        resolved_patches.push(Patch {
            url: patch_url,
            checksum,
            strip: spec.strip,
            condition,
        });
    }

    for (index, file) in share.iter().enumerate() {
        if !stays_inside(file) {
            return Err(Error::MalformedRecipe(format!(
                "share[{}] must be a relative path inside the source tree: {:?}",
                index, file
            )));
        }
    }
    if let Some(dir) = &source.extract_dir
        && !stays_inside(dir)
    {
        return Err(Error::MalformedRecipe(format!(
            "source.extract_dir must be a relative path inside the archive: {:?}",
            dir
        )));
    }

    Ok(Recipe {
        name,
        version,
        revision: package.revision,
        summary: package.summary,
        license: package.license,
        homepage: package.homepage,
        source: Source {
            url,
            checksum,
            extract_dir: source.extract_dir,
        },
        dependencies: deps,
        features: FeatureSet::new(features.style, features.flags),
        patches: resolved_patches,
        install: install.into_iter().map(convert_step).collect(),
        share,
        post_install: post_install.into_iter().map(convert_step).collect(),
        tests: test.into_iter().map(convert_test).collect(),
        variables,
    })
}
