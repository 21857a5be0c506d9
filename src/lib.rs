// src/lib.rs

//! Pantry: versioned package recipes and deterministic builds
//!
//! A recipe is a declarative TOML description of how to fetch, verify,
//! patch, configure, build, install and self-test one release of a
//! third-party library. Pantry parses recipes into immutable values, resolves
//! them into a build plan, and cooks the plan through a strictly ordered
//! state machine that stops at the first failure.
//!
//! # Architecture
//!
//! - Recipes are inert data: parsing never runs anything
//! - Integrity first: every download is hashed before it is used
//! - No retries: every failure is terminal and names its stage
//! - Pluggable side effects: fetcher, extractor, step runner, dependency probe

mod error;
pub mod hash;
pub mod kitchen;
pub mod recipe;

pub use error::{Error, Result};
pub use hash::{Hash, HashAlgorithm, Hasher};
pub use kitchen::{
    BatchReport, BuildPlan, CancelFlag, CookFailure, CookResult, CookState, Kitchen,
    KitchenConfig, Phase,
};
pub use recipe::{
    FeatureOverrides, Recipe, RecipeGraph, parse_recipe, parse_recipe_file, validate_recipe,
};
