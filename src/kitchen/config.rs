// src/kitchen/config.rs

//! Configuration and result types for the Kitchen

use crate::error::Error;
use crate::kitchen::state::{CookState, Phase};
use crate::recipe::HostFacts;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared flag an operator flips to stop a running cook
///
/// The running external process is killed and the cook fails with
/// [`Error::Cancelled`]. The filesystem is left as it is.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration for the Kitchen
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Directory for verified downloads, keyed by checksum
    pub source_cache: PathBuf,
    /// Parent of the per-recipe build directories
    pub build_root: PathBuf,
    /// Packages are installed under `cellar/<name>/<version>`
    pub cellar: PathBuf,
    /// Shared prefix holding `opt/` links and shared data
    pub shared_prefix: PathBuf,
    /// Number of parallel jobs passed to build tools as `%(jobs)s`
    pub jobs: u32,
    /// Ceiling for any single external step (None = no limit)
    pub step_timeout: Option<Duration>,
    /// Keep build directory after completion (for debugging)
    pub keep_builddir: bool,
    /// Probe the host for declared dependencies before fetching
    pub check_dependencies: bool,
    /// Run the recipe's test steps
    pub run_tests: bool,
    /// Facts used to evaluate patch conditions
    pub host: HostFacts,
    /// Cancellation signal shared with the caller
    pub cancel: CancelFlag,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        Self {
            source_cache: PathBuf::from("/var/cache/pantry/sources"),
            build_root: std::env::temp_dir().join("pantry-build"),
            cellar: PathBuf::from("/opt/pantry/cellar"),
            shared_prefix: PathBuf::from("/opt/pantry"),
            jobs,
            step_timeout: None,
            keep_builddir: false,
            check_dependencies: true,
            run_tests: true,
            host: HostFacts::detect(),
            cancel: CancelFlag::new(),
        }
    }
}

impl KitchenConfig {
    /// Configuration rooted entirely under one directory
    ///
    /// Handy for unprivileged builds and tests: the source cache, build
    /// directories, cellar and shared prefix all live below `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source_cache: root.join("cache"),
            build_root: root.join("build"),
            cellar: root.join("cellar"),
            shared_prefix: root.clone(),
            ..Self::default()
        }
    }
}

/// Result of cooking a recipe
#[derive(Debug)]
pub struct CookResult {
    pub package: String,
    /// Version including revision
    pub version: String,
    /// Installation prefix
    pub prefix: PathBuf,
    /// Every state passed through, ending in Done
    pub history: Vec<CookState>,
    /// Build log
    pub log: String,
    /// Warnings generated during build (failed post-install steps land here)
    pub warnings: Vec<String>,
    /// Files under the prefix after installation, relative to it
    pub installed_files: Vec<PathBuf>,
    /// Number of test steps that ran and passed
    pub tests_run: usize,
}

/// A cook that ended in the Failed state
#[derive(Debug, thiserror::Error)]
#[error("{package}: {stage} failed: {error}")]
pub struct CookFailure {
    pub package: String,
    /// Phase in which the cook stopped
    pub stage: Phase,
    #[source]
    pub error: Error,
    /// States passed through, ending in Failed
    pub history: Vec<CookState>,
    /// Build log up to the failure
    pub log: String,
}
