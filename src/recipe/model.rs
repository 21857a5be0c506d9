// src/recipe/model.rs

//! The validated, immutable recipe
//!
//! A [`Recipe`] is built once by the parser and never mutated afterwards;
//! every field is private and exposed read-only. Two releases of the same
//! package are two distinct values.

use crate::error::Result;
use crate::hash::Hash;
use crate::recipe::condition::HostCondition;
use crate::recipe::features::{FeatureOverrides, FeatureSet};
use crate::recipe::format::DependencyScope;
use std::collections::BTreeMap;

/// One versioned package-build descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) revision: u32,
    pub(crate) summary: Option<String>,
    pub(crate) license: Option<String>,
    pub(crate) homepage: Option<String>,
    pub(crate) source: Source,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) features: FeatureSet,
    pub(crate) patches: Vec<Patch>,
    pub(crate) install: Vec<Step>,
    pub(crate) share: Vec<String>,
    pub(crate) post_install: Vec<Step>,
    pub(crate) tests: Vec<TestStep>,
    pub(crate) variables: BTreeMap<String, String>,
}

/// The upstream source archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Archive URL with variables substituted
    pub url: String,
    /// Declared digest of the archive bytes
    pub checksum: Hash,
    /// Directory inside the archive holding the sources
    pub extract_dir: Option<String>,
}

impl Source {
    /// File name of the archive, taken from the URL
    pub fn filename(&self) -> &str {
        self.url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("source.tar.gz")
    }
}

/// A named dependency with its scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub scope: DependencyScope,
    pub min_version: Option<String>,
    pub pkg_config: Option<String>,
}

impl Dependency {
    /// Name to ask pkg-config about
    pub fn pkg_config_name(&self) -> &str {
        self.pkg_config.as_deref().unwrap_or(&self.name)
    }
}

/// A patch applied to the extracted tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Remote URL, `file://` URL, or resolved local path
    pub url: String,
    pub checksum: Hash,
    pub strip: u32,
    pub condition: Option<HostCondition>,
}

/// One external command, before variable substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub tool: String,
    pub args: Vec<String>,
    pub workdir: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// Human-readable command line
    pub fn command_line(&self) -> String {
        std::iter::once(self.tool.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A test command and what it must produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStep {
    pub step: Step,
    pub expect_output: Option<String>,
    pub expect_paths: Vec<String>,
}

impl Recipe {
    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upstream version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Packaging revision
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Version including the revision suffix, e.g. `1.19.7_10`
    pub fn pkg_version(&self) -> String {
        if self.revision == 0 {
            self.version.clone()
        } else {
            format!("{}_{}", self.version, self.revision)
        }
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Deduplicated dependency set, in declaration order
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Dependencies needed by the installed package
    ///
    /// Build-only entries are excluded.
    pub fn runtime_dependencies(&self) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.scope == DependencyScope::Runtime)
            .collect()
    }

    /// Dependencies needed only while building
    pub fn build_dependencies(&self) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.scope == DependencyScope::Build)
            .collect()
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Declared flags merged with overrides; undeclared names stay off
    pub fn effective_features(
        &self,
        overrides: &FeatureOverrides,
    ) -> Result<BTreeMap<String, bool>> {
        self.features.effective(overrides)
    }

    /// Whether a flag is on after applying overrides
    pub fn flag_enabled(&self, name: &str, overrides: &FeatureOverrides) -> bool {
        match self.features.declared().get(name) {
            Some(default) => overrides.get(name).unwrap_or(*default),
            None => false,
        }
    }

    /// Configure arguments produced by the feature flags
    pub fn feature_args(&self, overrides: &FeatureOverrides) -> Result<Vec<String>> {
        self.features.args(overrides)
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn install_steps(&self) -> &[Step] {
        &self.install
    }

    /// Files copied from the source tree into the share directory
    pub fn share_files(&self) -> &[String] {
        &self.share
    }

    pub fn post_install_steps(&self) -> &[Step] {
        &self.post_install
    }

    pub fn test_steps(&self) -> &[TestStep] {
        &self.tests
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }
}
