// src/error.rs

//! Error types shared by the recipe model and the kitchen

use crate::kitchen::Phase;
use crate::recipe::DependencyScope;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a recipe from being parsed, planned or cooked
///
/// None of these are retried. The variant carries the offending identifier
/// (field, dependency, patch index, step index) so the operator can act on it
/// without re-running the build.
#[derive(Error, Debug)]
pub enum Error {
    /// The manifest is not valid TOML or is missing a required field
    #[error("malformed recipe: {0}")]
    MalformedRecipe(String),

    /// The same dependency is declared with two different scopes
    #[error("dependency {name} declared as both {first} and {second}")]
    DuplicateDependency {
        name: String,
        first: DependencyScope,
        second: DependencyScope,
    },

    /// An override names a flag the recipe does not declare
    #[error("unknown feature flag: {0}")]
    UnknownFeature(String),

    /// Two recipes with the same name were added to one graph
    #[error("duplicate recipe in set: {0}")]
    DuplicateRecipe(String),

    /// Recipes in a set depend on each other in a loop
    #[error("dependency cycle between recipes: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// Downloaded bytes do not hash to the declared checksum
    #[error("integrity mismatch for {resource}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        resource: String,
        expected: String,
        actual: String,
    },

    /// A declared dependency is not available in the environment
    #[error("unresolved dependency {name}: {reason}")]
    UnresolvedDependency { name: String, reason: String },

    /// A patch could not be applied on top of the previous ones
    #[error("patch #{index} ({patch}) does not apply: {reason}")]
    PatchConflict {
        index: usize,
        patch: String,
        reason: String,
    },

    /// An external step exited unsuccessfully
    #[error("{phase} step #{index} `{command}` {}\n{output}", exit_status(.exit_code))]
    StepFailed {
        phase: Phase,
        index: usize,
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// An external step could not be started (missing tool, bad workdir)
    #[error("{phase} step #{index} `{command}` could not be started: {reason}")]
    StepNotStarted {
        phase: Phase,
        index: usize,
        command: String,
        reason: String,
    },

    /// An external step ran past the operator's ceiling and was killed
    #[error("{phase} step #{index} `{command}` timed out after {}s\n{output}", .timeout.as_secs())]
    StepTimedOut {
        phase: Phase,
        index: usize,
        command: String,
        timeout: Duration,
        output: String,
    },

    /// A test assertion did not hold
    #[error("verification failed in test step #{step}: expected {expected}, got {actual}")]
    VerificationFailed {
        step: usize,
        expected: String,
        actual: String,
    },

    /// A file the recipe asked to install is not in the source tree
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The cook was cancelled by the operator
    #[error("cancelled")]
    Cancelled,

    /// The executor was driven through states out of order
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Network or transport failure while fetching a resource
    #[error("download failed: {0}")]
    Download(String),

    /// Source archive could not be unpacked
    #[error("archive error: {0}")]
    Archive(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::MalformedRecipe(e.to_string())
    }
}
