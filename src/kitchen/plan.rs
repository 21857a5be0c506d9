// src/kitchen/plan.rs

//! Build plan resolution
//!
//! Resolving a recipe is pure: given the same recipe, overrides and kitchen
//! configuration it always yields the same [`BuildPlan`]. Every `%(var)s`
//! placeholder is substituted here, feature flags are expanded into argument
//! tokens, and host-conditional patches are split into active and skipped.
//! Nothing is fetched or run.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::kitchen::config::KitchenConfig;
use crate::recipe::{DependencyScope, FeatureOverrides, Recipe, Step};
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Argument spliced with the whole feature vector
pub const FEATURES_PLACEHOLDER: &str = "%(features)s";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\(([A-Za-z_][A-Za-z0-9_]*)\)s").expect("static regex is valid")
});

/// Directories a cook works in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    /// Scratch directory for this recipe, removed after the cook
    pub build_dir: PathBuf,
    /// Extracted and patched source tree
    pub srcdir: PathBuf,
    /// Working directory for test steps
    pub testdir: PathBuf,
    /// Installation prefix, `cellar/<name>/<version>`
    pub prefix: PathBuf,
    pub bin: PathBuf,
    /// `prefix/share/<name>`
    pub pkgshare: PathBuf,
    pub shared: PathBuf,
    /// Holds `<name>` links to each cooked package's current prefix
    pub opt: PathBuf,
}

impl Layout {
    fn new(recipe: &Recipe, config: &KitchenConfig) -> Self {
        let version = recipe.pkg_version();
        let build_dir = config
            .build_root
            .join(format!("{}-{}", recipe.name(), version));
        let prefix = config.cellar.join(recipe.name()).join(&version);

        Self {
            srcdir: build_dir.join("source"),
            testdir: build_dir.join("test"),
            build_dir,
            bin: prefix.join("bin"),
            pkgshare: prefix.join("share").join(recipe.name()),
            prefix,
            shared: config.shared_prefix.clone(),
            opt: config.shared_prefix.join("opt"),
        }
    }
}

/// A downloadable resource and the digest it must hash to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchItem {
    pub url: String,
    pub checksum: Hash,
    /// File name used when the resource is written to disk
    pub filename: String,
}

impl FetchItem {
    fn new(url: &str, checksum: &Hash) -> Self {
        let filename = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("download")
            .to_string();
        Self {
            url: url.to_string(),
            checksum: checksum.clone(),
            filename,
        }
    }
}

/// A patch that will be applied, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPatch {
    /// Position in the recipe's patch list
    pub index: usize,
    pub resource: FetchItem,
    pub strip: u32,
}

/// A patch whose host condition does not hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPatch {
    pub index: usize,
    pub url: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDependency {
    pub name: String,
    pub scope: DependencyScope,
    pub min_version: Option<String>,
    pub pkg_config: String,
}

/// A fully substituted external command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    /// Human-readable command line for logs and errors
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A test command with its assertions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTest {
    pub invocation: Invocation,
    pub expect_output: Option<String>,
    pub expect_paths: Vec<PathBuf>,
}

/// A file copied from the source tree into pkgshare
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareItem {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Everything a cook will do, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub package: String,
    pub version: String,
    pub layout: Layout,
    pub dependencies: Vec<PlannedDependency>,
    pub source: FetchItem,
    pub extract_dir: Option<String>,
    pub patches: Vec<PlannedPatch>,
    pub skipped_patches: Vec<SkippedPatch>,
    /// Effective flag values after overrides
    pub features: BTreeMap<String, bool>,
    pub feature_args: Vec<String>,
    pub install: Vec<Invocation>,
    pub share: Vec<ShareItem>,
    pub post_install: Vec<Invocation>,
    pub tests: Vec<PlannedTest>,
}

impl BuildPlan {
    /// Source archive followed by active patches
    pub fn fetch_items(&self) -> Vec<&FetchItem> {
        std::iter::once(&self.source)
            .chain(self.patches.iter().map(|p| &p.resource))
            .collect()
    }
}

/// Resolve a recipe into a build plan
pub fn resolve(
    recipe: &Recipe,
    overrides: &FeatureOverrides,
    config: &KitchenConfig,
) -> Result<BuildPlan> {
    let features = recipe.effective_features(overrides)?;
    let feature_args = recipe.feature_args(overrides)?;
    let layout = Layout::new(recipe, config);
    let vars = variables(recipe, &layout, config)?;

    let mut patches = Vec::new();
    let mut skipped_patches = Vec::new();
    for (index, patch) in recipe.patches().iter().enumerate() {
        match &patch.condition {
            Some(condition) if !condition.holds(&config.host) => {
                skipped_patches.push(SkippedPatch {
                    index,
                    url: patch.url.clone(),
                    condition: condition.to_string(),
                });
            }
            _ => patches.push(PlannedPatch {
                index,
                resource: FetchItem::new(&patch.url, &patch.checksum),
                strip: patch.strip,
            }),
        }
    }

    let install = recipe
        .install_steps()
        .iter()
        .map(|step| invocation(step, &vars, Some(&feature_args), &layout.srcdir))
        .collect::<Result<Vec<_>>>()?;

    let post_install = recipe
        .post_install_steps()
        .iter()
        .map(|step| invocation(step, &vars, None, &layout.prefix))
        .collect::<Result<Vec<_>>>()?;

    let mut tests = Vec::with_capacity(recipe.test_steps().len());
    for test in recipe.test_steps() {
        let expect_paths = test
            .expect_paths
            .iter()
            .map(|p| Ok(layout.testdir.join(substitute(p, &vars)?)))
            .collect::<Result<Vec<_>>>()?;
        tests.push(PlannedTest {
            invocation: invocation(&test.step, &vars, None, &layout.testdir)?,
            expect_output: test
                .expect_output
                .as_deref()
                .map(|s| substitute(s, &vars))
                .transpose()?,
            expect_paths,
        });
    }

    let share = recipe
        .share_files()
        .iter()
        .map(|file| {
            let name = Path::new(file).file_name().map(PathBuf::from).unwrap_or_default();
            ShareItem {
                from: layout.srcdir.join(file),
                to: layout.pkgshare.join(name),
            }
        })
        .collect();

    let dependencies = recipe
        .dependencies()
        .iter()
        .map(|d| PlannedDependency {
            name: d.name.clone(),
            scope: d.scope,
            min_version: d.min_version.clone(),
            pkg_config: d.pkg_config_name().to_string(),
        })
        .collect();

    Ok(BuildPlan {
        package: recipe.name().to_string(),
        version: recipe.pkg_version(),
        dependencies,
        source: FetchItem::new(&recipe.source().url, &recipe.source().checksum),
        extract_dir: recipe.source().extract_dir.clone(),
        patches,
        skipped_patches,
        features,
        feature_args,
        install,
        share,
        post_install,
        tests,
        layout,
    })
}

/// Built-in variables plus the recipe's own
///
/// Recipe variables may refer to built-ins but cannot redefine them.
fn variables(
    recipe: &Recipe,
    layout: &Layout,
    config: &KitchenConfig,
) -> Result<BTreeMap<String, String>> {
    let path = |p: &Path| p.to_string_lossy().into_owned();

    let mut vars = BTreeMap::new();
    vars.insert("name".to_string(), recipe.name().to_string());
    vars.insert("version".to_string(), recipe.version().to_string());
    vars.insert("prefix".to_string(), path(&layout.prefix));
    vars.insert("bin".to_string(), path(&layout.bin));
    vars.insert("pkgshare".to_string(), path(&layout.pkgshare));
    vars.insert("srcdir".to_string(), path(&layout.srcdir));
    vars.insert("testdir".to_string(), path(&layout.testdir));
    vars.insert("shared".to_string(), path(&layout.shared));
    vars.insert("opt".to_string(), path(&layout.opt));
    vars.insert("jobs".to_string(), config.jobs.to_string());

    let mut custom = BTreeMap::new();
    for (key, value) in recipe.variables() {
        if vars.contains_key(key) || key == "features" {
            return Err(Error::MalformedRecipe(format!(
                "variable `{}` shadows a built-in",
                key
            )));
        }
        custom.insert(key.clone(), substitute(value, &vars)?);
    }
    vars.extend(custom);

    Ok(vars)
}

fn invocation(
    step: &Step,
    vars: &BTreeMap<String, String>,
    feature_args: Option<&[String]>,
    default_workdir: &Path,
) -> Result<Invocation> {
    let mut args = Vec::with_capacity(step.args.len());
    for arg in &step.args {
        match feature_args {
            Some(features) if arg == FEATURES_PLACEHOLDER => args.extend(features.iter().cloned()),
            _ => args.push(substitute(arg, vars)?),
        }
    }

    let workdir = match &step.workdir {
        Some(dir) => default_workdir.join(substitute(dir, vars)?),
        None => default_workdir.to_path_buf(),
    };

    let env = step
        .env
        .iter()
        .map(|(k, v)| Ok((k.clone(), substitute(v, vars)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(Invocation {
        program: substitute(&step.tool, vars)?,
        args,
        workdir,
        env,
    })
}

/// Replace every `%(var)s`; an unknown name is a recipe error
pub(crate) fn substitute(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut unknown: Option<String> = None;
    let expanded = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => {
                unknown.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });

    match unknown {
        Some(name) if name == "features" => Err(Error::MalformedRecipe(format!(
            "{} must be a whole install argument: {:?}",
            FEATURES_PLACEHOLDER, template
        ))),
        Some(name) => Err(Error::MalformedRecipe(format!(
            "unknown variable %({})s in {:?}",
            name, template
        ))),
        None => Ok(expanded.into_owned()),
    }
}
