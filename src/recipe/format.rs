// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML documents. This module holds the raw, as-written shape of
//! a manifest; [`crate::recipe::Recipe`] is the validated form the kitchen
//! consumes. Required fields are `Option` here so that a missing field can be
//! reported by name instead of as a generic deserialization error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A recipe document exactly as written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeManifest {
    /// Package metadata
    #[serde(default)]
    pub package: PackageSection,

    /// Source archive
    #[serde(default)]
    pub source: SourceSection,

    /// Build and runtime dependencies
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,

    /// Optional codec/module toggles
    #[serde(default)]
    pub features: FeatureSection,

    /// Patches, applied in listed order
    #[serde(default)]
    pub patches: Vec<PatchSpec>,

    /// Configure, build and install commands
    #[serde(default)]
    pub install: Vec<StepSpec>,

    /// Files from the source tree copied into the package share directory
    #[serde(default)]
    pub share: Vec<String>,

    /// Best-effort commands run after installation
    #[serde(default)]
    pub post_install: Vec<StepSpec>,

    /// Verification commands with expectations
    #[serde(default)]
    pub test: Vec<TestSpec>,

    /// Variables for `%(name)s` substitution
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// Package metadata section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    /// Package name (required)
    pub name: Option<String>,

    /// Package version; inferred from the source file name when absent
    pub version: Option<String>,

    /// Packaging revision for rebuilds of the same upstream version
    #[serde(default)]
    pub revision: u32,

    /// Short description
    pub summary: Option<String>,

    /// License identifier (SPDX)
    pub license: Option<String>,

    /// Homepage URL
    pub homepage: Option<String>,
}

/// Source archive section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    /// Archive URL (required); supports `%(version)s`
    pub url: Option<String>,

    /// Archive checksum, `sha256:...` or bare hex (required)
    pub checksum: Option<String>,

    /// Directory inside the archive holding the sources
    pub extract_dir: Option<String>,
}

/// Whether a dependency is needed only to build, or also at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    /// Needed while building only (compilers, cmake, pkgconf)
    #[serde(alias = "build-only")]
    Build,

    /// Linked or invoked by the installed package
    #[default]
    Runtime,
}

impl DependencyScope {
    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyScope::Build => "build",
            DependencyScope::Runtime => "runtime",
        }
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[[dependencies]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencySpec {
    /// Package or tool name
    pub name: String,

    /// Build-only or runtime (default: runtime)
    #[serde(default)]
    pub scope: DependencyScope,

    /// Minimum version reported by `<name> --version`
    #[serde(default)]
    pub min_version: Option<String>,

    /// pkg-config module name, when it differs from `name`
    #[serde(default)]
    pub pkg_config: Option<String>,
}

/// How a feature flag is rendered on the configure command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStyle {
    /// `-DNAME=ON` / `-DNAME=OFF`
    #[default]
    Cmake,

    /// `--enable-name` / `--disable-name`
    Autotools,

    /// `-Dname=enabled` / `-Dname=disabled`
    Meson,
}

/// `[features]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureSection {
    /// Rendering style for all flags of this recipe
    #[serde(default)]
    pub style: FlagStyle,

    /// Declared flags and their defaults
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

/// One `[[patches]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSpec {
    /// Patch URL, `file://` URL, or path relative to the recipe file
    pub url: String,

    /// Patch checksum (required)
    pub checksum: Option<String>,

    /// Leading path components to strip (default: 1)
    #[serde(default = "default_strip")]
    pub strip: u32,

    /// Host predicate, e.g. `musl` or `!macos`
    #[serde(default)]
    pub condition: Option<String>,
}

fn default_strip() -> u32 {
    1
}

/// One external command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    /// Program to run
    pub tool: String,

    /// Arguments, each subject to `%(name)s` substitution
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory relative to the source tree
    #[serde(default)]
    pub workdir: Option<String>,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// One `[[test]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    /// Program to run
    pub tool: String,

    /// Arguments, each subject to `%(name)s` substitution
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Text that must appear in the captured output
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Paths that must exist after the command ran
    #[serde(default)]
    pub expect_paths: Vec<String>,
}
