// src/recipe/mod.rs

//! Recipe model: versioned package-build descriptors
//!
//! A recipe describes how to fetch, verify, patch, configure, build, install
//! and self-test one release of a third-party library. Recipes are inert
//! data: parsing never runs anything, and a loaded [`Recipe`] is immutable.
//! Two releases of the same package are two separate recipe files and two
//! distinct values.
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "libheif"
//! version = "1.19.7"
//! revision = 10
//! license = "LGPL-3.0-only"
//!
//! [source]
//! url = "https://github.com/strukturag/libheif/releases/download/v%(version)s/libheif-%(version)s.tar.gz"
//! checksum = "sha256:161c042d2102665fcee3ded851c78a0eb5f2d4bfe39fba48ba6e588fd6e964f3"
//!
//! [[dependencies]]
//! name = "cmake"
//! scope = "build"
//!
//! [[dependencies]]
//! name = "libde265"
//!
//! [features.flags]
//! WITH_X265 = true
//! WITH_DAV1D = false
//!
//! [[install]]
//! tool = "cmake"
//! args = ["-S", ".", "-B", "build", "-DCMAKE_INSTALL_PREFIX=%(prefix)s", "%(features)s"]
//! ```

mod condition;
mod features;
mod format;
mod graph;
mod model;
mod parser;

pub use condition::{HostCondition, HostFacts};
pub use features::{FeatureOverrides, FeatureSet};
pub use format::{
    DependencyScope, DependencySpec, FeatureSection, FlagStyle, PackageSection, PatchSpec,
    RecipeManifest, SourceSection, StepSpec, TestSpec,
};
pub use graph::RecipeGraph;
pub use model::{Dependency, Patch, Recipe, Source, Step, TestStep};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
