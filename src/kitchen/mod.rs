// src/kitchen/mod.rs

//! Kitchen: where recipes are resolved and cooked
//!
//! The Kitchen turns an immutable [`Recipe`] into a [`BuildPlan`] and then
//! drives the plan through the cook state machine. Side effects go through
//! four narrow collaborators, each swappable for tests:
//! - [`Fetcher`] - downloads sources and patches
//! - [`Extractor`] - unpacks the source archive
//! - [`StepRunner`] - runs build, install and test commands
//! - [`DependencyProbe`] - checks that declared dependencies exist

mod archive;
mod config;
mod cook;
mod fetch;
mod patch;
mod plan;
mod probe;
mod runner;
mod state;
mod verify;

pub use archive::{ArchiveFormat, Extractor, TarExtractor};
pub use config::{CancelFlag, CookFailure, CookResult, KitchenConfig};
pub use cook::Cook;
pub use fetch::{Fetcher, HttpFetcher, SourceCache};
pub use patch::{PatchError, apply_patch};
pub use plan::{
    BuildPlan, FEATURES_PLACEHOLDER, FetchItem, Invocation, Layout, PlannedDependency,
    PlannedPatch, PlannedTest, ShareItem, SkippedPatch,
};
pub use probe::{Availability, DependencyProbe, HostProbe, NoopProbe, compare_versions};
pub use runner::{ProcessRunner, RunLimits, StepOutput, StepRunner};
pub use state::{CookState, Phase, StateTracker};

use crate::error::{Error, Result};
use crate::recipe::{FeatureOverrides, Recipe, RecipeGraph};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// The Kitchen: where recipes are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    runner: Arc<dyn StepRunner>,
    probe: Arc<dyn DependencyProbe>,
}

/// Outcome of cooking a set of recipes
#[derive(Debug, Default)]
pub struct BatchReport {
    pub cooked: Vec<CookResult>,
    pub failed: Vec<CookFailure>,
    /// Recipes in later waves that never started because of a failure
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

impl Kitchen {
    /// Create a new Kitchen with the host collaborators
    pub fn new(config: KitchenConfig) -> Self {
        let probe = Arc::new(HostProbe::new(&config.cellar));
        Self {
            config,
            fetcher: Arc::new(HttpFetcher::new()),
            extractor: Arc::new(TarExtractor),
            runner: Arc::new(ProcessRunner),
            probe,
        }
    }

    /// Create a Kitchen with default configuration
    pub fn with_defaults() -> Self {
        Self::new(KitchenConfig::default())
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn StepRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    /// Resolve a recipe into a build plan without side effects
    pub fn plan(&self, recipe: &Recipe, overrides: &FeatureOverrides) -> Result<BuildPlan> {
        plan::resolve(recipe, overrides, &self.config)
    }

    /// Cook a recipe: fetch, verify, patch, build, install and test
    ///
    /// Resolution errors (an unknown override, an undefined variable) fail
    /// before anything runs, with the stage reported as dependencies.
    pub fn cook(
        &self,
        recipe: &Recipe,
        overrides: &FeatureOverrides,
    ) -> std::result::Result<CookResult, CookFailure> {
        let plan = self.plan(recipe, overrides).map_err(|error| {
            let mut tracker = StateTracker::new();
            let _ = tracker.fail(Phase::Dependencies, error.to_string());
            CookFailure {
                package: recipe.name().to_string(),
                stage: Phase::Dependencies,
                error,
                history: tracker.into_history(),
                log: String::new(),
            }
        })?;

        Cook::new(self, plan).run()
    }

    /// Fetch and verify all resources of a recipe into the source cache
    ///
    /// Returns the cache paths. Useful for preparing offline builds.
    pub fn fetch(&self, recipe: &Recipe) -> Result<Vec<PathBuf>> {
        let plan = self.plan(recipe, &FeatureOverrides::new())?;
        let cache = SourceCache::new(&self.config.source_cache);

        let mut paths = Vec::new();
        for item in plan.fetch_items() {
            if cache.contains(&item.checksum, &item.filename) {
                info!("Already cached: {}", item.filename);
            } else {
                info!("Fetching {}", item.url);
                let data = self.fetcher.fetch(&item.url)?;
                if !item.checksum.matches(&data) {
                    return Err(Error::IntegrityMismatch {
                        resource: item.url.clone(),
                        expected: item.checksum.to_prefixed_string(),
                        actual: crate::hash::hash_bytes(item.checksum.algorithm, &data)
                            .to_prefixed_string(),
                    });
                }
                cache.put(&item.checksum, &item.filename, &data)?;
            }
            paths.push(cache.path_for(&item.checksum, &item.filename));
        }
        Ok(paths)
    }

    /// Whether every resource of a recipe is in the cache and still valid
    pub fn sources_cached(&self, recipe: &Recipe) -> Result<bool> {
        let plan = self.plan(recipe, &FeatureOverrides::new())?;
        let cache = SourceCache::new(&self.config.source_cache);
        Ok(plan
            .fetch_items()
            .iter()
            .all(|item| cache.contains(&item.checksum, &item.filename)))
    }

    /// Cook every recipe in a set, dependencies first
    ///
    /// Recipes within a wave do not depend on each other and are cooked in
    /// parallel. After a wave with any failure, later waves are skipped.
    pub fn cook_batch(&self, graph: &RecipeGraph) -> Result<BatchReport> {
        let waves = graph.waves()?;
        let mut report = BatchReport::default();

        for (number, wave) in waves.iter().enumerate() {
            if !report.failed.is_empty() {
                report
                    .skipped
                    .extend(wave.iter().map(|r| r.name().to_string()));
                continue;
            }

            let names: Vec<&str> = wave.iter().map(|r| r.name()).collect();
            info!("Wave {}: {}", number + 1, names.join(", "));

            let outcomes: Vec<_> = wave
                .par_iter()
                .map(|recipe| self.cook(recipe, &FeatureOverrides::new()))
                .collect();

            for outcome in outcomes {
                match outcome {
                    Ok(result) => report.cooked.push(result),
                    Err(failure) => {
                        warn!("{}", failure);
                        report.failed.push(failure);
                    }
                }
            }
        }

        Ok(report)
    }
}
