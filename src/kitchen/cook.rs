// src/kitchen/cook.rs

//! Cook: the actual build execution for a single recipe
//!
//! Stages run strictly in order and the first failure ends the cook:
//!
//! 1. **Dependencies** - every declared dependency is probed
//! 2. **Fetch** - the source archive and active patches are downloaded
//! 3. **Verify** - every download is hashed against its declared checksum
//! 4. **Unpack / Patch** - the archive is extracted and patches applied in order
//! 5. **Build** - install steps run through the step runner
//! 6. **Install** - share files are copied into pkgshare and `opt/<name>`
//!    is pointed at the prefix
//! 7. **Post-install** - best effort; failures become warnings
//! 8. **Test** - test steps run and their expectations are asserted

use crate::error::{Error, Result};
use crate::hash::hash_bytes;
use crate::kitchen::Kitchen;
use crate::kitchen::config::{CookFailure, CookResult};
use crate::kitchen::fetch::SourceCache;
use crate::kitchen::patch::apply_patch;
use crate::kitchen::plan::{BuildPlan, FetchItem, Invocation};
use crate::kitchen::probe::check_dependencies;
use crate::kitchen::runner::{RunLimits, StepOutput};
use crate::kitchen::state::{CookState, Phase, StateTracker};
use crate::kitchen::verify::verify_test;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A downloaded resource and whether it came from the verified cache
struct Fetched {
    item: FetchItem,
    data: Vec<u8>,
    from_cache: bool,
}

/// A single cook operation
pub struct Cook<'a> {
    kitchen: &'a Kitchen,
    plan: BuildPlan,
    cache: SourceCache,
    tracker: StateTracker,
    phase: Phase,
    /// Build log accumulator
    log: String,
    warnings: Vec<String>,
    tests_run: usize,
}

impl<'a> Cook<'a> {
    pub(super) fn new(kitchen: &'a Kitchen, plan: BuildPlan) -> Self {
        Self {
            cache: SourceCache::new(&kitchen.config.source_cache),
            kitchen,
            plan,
            tracker: StateTracker::new(),
            phase: Phase::Dependencies,
            log: String::new(),
            warnings: Vec::new(),
            tests_run: 0,
        }
    }

    /// Run every stage and report the outcome
    pub(super) fn run(mut self) -> std::result::Result<CookResult, CookFailure> {
        info!("Cooking {} {}", self.plan.package, self.plan.version);
        let outcome = self.execute();

        if !self.kitchen.config.keep_builddir {
            self.remove_build_dir();
        } else {
            info!("Keeping build directory {}", self.plan.layout.build_dir.display());
        }

        match outcome {
            Ok(()) => self.success(),
            Err(error) => Err(self.failure(error)),
        }
    }

    fn execute(&mut self) -> Result<()> {
        if self.kitchen.config.check_dependencies {
            self.enter(Phase::Dependencies)?;
            check_dependencies(self.kitchen.probe.as_ref(), &self.plan.dependencies)?;
            self.log_line("Dependencies satisfied");
        }

        self.enter(Phase::Fetch)?;
        let fetched = self.fetch()?;
        self.tracker.advance(CookState::Fetched)?;

        self.enter(Phase::Verify)?;
        self.verify(&fetched)?;
        self.tracker.advance(CookState::Verified)?;

        self.enter(Phase::Unpack)?;
        self.unpack(&fetched[0])?;

        self.enter(Phase::Patch)?;
        self.patch(&fetched[1..])?;
        self.tracker.advance(CookState::Patched)?;

        self.enter(Phase::Build)?;
        self.build()?;
        self.tracker.advance(CookState::Built)?;

        self.enter(Phase::Install)?;
        self.install_share()?;
        self.link_opt()?;
        self.tracker.advance(CookState::Installed)?;

        self.enter(Phase::PostInstall)?;
        self.post_install()?;

        self.enter(Phase::Test)?;
        self.test()?;
        self.tracker.advance(CookState::Tested)?;

        self.tracker.advance(CookState::Done)?;
        Ok(())
    }

    /// Record the stage being entered; honour cancellation between stages
    fn enter(&mut self, phase: Phase) -> Result<()> {
        self.phase = phase;
        if self.kitchen.config.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!("{}: entering {}", self.plan.package, phase);
        Ok(())
    }

    fn fetch(&mut self) -> Result<Vec<Fetched>> {
        let items: Vec<FetchItem> = self.plan.fetch_items().into_iter().cloned().collect();
        let mut fetched = Vec::with_capacity(items.len());

        for item in items {
            if let Some(data) = self.cache.get(&item.checksum, &item.filename) {
                self.log_line(&format!("Using cached {}", item.url));
                fetched.push(Fetched {
                    item,
                    data,
                    from_cache: true,
                });
                continue;
            }

            info!("Fetching {}", item.url);
            let data = self.kitchen.fetcher.fetch(&item.url)?;
            self.log_line(&format!("Fetched {} ({} bytes)", item.url, data.len()));
            fetched.push(Fetched {
                item,
                data,
                from_cache: false,
            });
        }

        for skipped in &self.plan.skipped_patches {
            info!(
                "Skipping patch #{} {} (condition {} does not hold)",
                skipped.index, skipped.url, skipped.condition
            );
        }

        Ok(fetched)
    }

    fn verify(&mut self, fetched: &[Fetched]) -> Result<()> {
        for entry in fetched {
            if !entry.from_cache {
                let actual = hash_bytes(entry.item.checksum.algorithm, &entry.data);
                if actual != entry.item.checksum {
                    return Err(Error::IntegrityMismatch {
                        resource: entry.item.url.clone(),
                        expected: entry.item.checksum.to_prefixed_string(),
                        actual: actual.to_prefixed_string(),
                    });
                }
                let item = &entry.item;
                if let Err(e) = self.cache.put(&item.checksum, &item.filename, &entry.data) {
                    self.warn(format!("Could not cache {}: {}", item.url, e));
                }
            }
            self.log_line(&format!("Verified {} {}", entry.item.filename, entry.item.checksum));
        }
        Ok(())
    }

    fn unpack(&mut self, source: &Fetched) -> Result<()> {
        let layout = &self.plan.layout;
        if layout.build_dir.exists() {
            fs::remove_dir_all(&layout.build_dir)?;
        }
        fs::create_dir_all(&layout.build_dir)?;

        self.kitchen.extractor.extract(
            &source.data,
            &source.item.filename,
            &layout.srcdir,
            self.plan.extract_dir.as_deref(),
        )?;
        fs::create_dir_all(&layout.testdir)?;

        let message = format!(
            "Extracted {} to {}",
            source.item.filename,
            layout.srcdir.display()
        );
        self.log_line(&message);
        Ok(())
    }

    fn patch(&mut self, patches: &[Fetched]) -> Result<()> {
        for (planned, entry) in self.plan.patches.clone().iter().zip(patches) {
            apply_patch(&self.plan.layout.srcdir, &entry.data, planned.strip).map_err(|e| {
                Error::PatchConflict {
                    index: planned.index,
                    patch: planned.resource.url.clone(),
                    reason: e.to_string(),
                }
            })?;
            self.log_line(&format!("Applied patch #{}: {}", planned.index, planned.resource.url));
        }
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        fs::create_dir_all(&self.plan.layout.prefix)?;
        for (index, invocation) in self.plan.install.clone().iter().enumerate() {
            let output = self.run_step(Phase::Build, index, invocation)?;
            ensure_success(Phase::Build, index, invocation, &output, &self.kitchen.config)?;
        }
        Ok(())
    }

    fn install_share(&mut self) -> Result<()> {
        if self.plan.share.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.plan.layout.pkgshare)?;
        for item in self.plan.share.clone() {
            if !item.from.is_file() {
                return Err(Error::MissingArtifact(item.from));
            }
            fs::copy(&item.from, &item.to)?;
            self.log_line(&format!("Installed {}", item.to.display()));
        }
        Ok(())
    }

    /// Point `opt/<name>` at the new prefix, replacing an older link
    fn link_opt(&mut self) -> Result<()> {
        let link = self.plan.layout.opt.join(&self.plan.package);
        let prefix = self.plan.layout.prefix.clone();
        fs::create_dir_all(&self.plan.layout.opt)?;
        if fs::symlink_metadata(&link).is_ok() {
            fs::remove_file(&link)?;
        }
        std::os::unix::fs::symlink(&prefix, &link)?;
        self.log_line(&format!("Linked {} -> {}", link.display(), prefix.display()));
        Ok(())
    }

    /// Post-install steps never fail the cook
    fn post_install(&mut self) -> Result<()> {
        for (index, invocation) in self.plan.post_install.clone().iter().enumerate() {
            match self.run_step(Phase::PostInstall, index, invocation) {
                Ok(output) if output.success() => {}
                Ok(output) => self.warn(format!(
                    "post-install step #{} `{}` failed ({})",
                    index,
                    invocation.command_line(),
                    match output.exit_code {
                        Some(code) => format!("exit status {}", code),
                        None => "killed".to_string(),
                    }
                )),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => self.warn(e.to_string()),
            }
        }
        Ok(())
    }

    fn test(&mut self) -> Result<()> {
        if !self.kitchen.config.run_tests {
            info!("Skipping tests for {}", self.plan.package);
            return Ok(());
        }
        for (index, test) in self.plan.tests.clone().iter().enumerate() {
            let output = self.run_step(Phase::Test, index, &test.invocation)?;
            ensure_success(Phase::Test, index, &test.invocation, &output, &self.kitchen.config)?;
            verify_test(index, test, &output)?;
            self.tests_run += 1;
            self.log_line(&format!("Test #{} passed", index));
        }
        Ok(())
    }

    /// Run one step; failing to start it is reported against the step
    fn run_step(
        &mut self,
        phase: Phase,
        index: usize,
        invocation: &Invocation,
    ) -> Result<StepOutput> {
        let limits = RunLimits {
            timeout: self.kitchen.config.step_timeout,
            cancel: self.kitchen.config.cancel.clone(),
        };
        self.log_line(&format!("$ {}", invocation.command_line()));
        let output = match self.kitchen.runner.run(invocation, &limits) {
            Ok(output) => output,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                return Err(Error::StepNotStarted {
                    phase,
                    index,
                    command: invocation.command_line(),
                    reason: match e {
                        Error::Io(io) => io.to_string(),
                        other => other.to_string(),
                    },
                });
            }
        };
        self.log_build_output(phase, &output);
        Ok(output)
    }

    fn success(self) -> std::result::Result<CookResult, CookFailure> {
        let prefix = self.plan.layout.prefix.clone();
        let installed_files = list_files(&prefix);
        info!(
            "Cooked {} {} ({} files, {} warnings)",
            self.plan.package,
            self.plan.version,
            installed_files.len(),
            self.warnings.len()
        );

        Ok(CookResult {
            package: self.plan.package,
            version: self.plan.version,
            prefix,
            history: self.tracker.into_history(),
            log: self.log,
            warnings: self.warnings,
            installed_files,
            tests_run: self.tests_run,
        })
    }

    fn failure(mut self, error: Error) -> CookFailure {
        let stage = self.phase;
        warn!("{}: {} failed: {}", self.plan.package, stage, error);
        self.log_line(&format!("FAILED at {}: {}", stage, error));
        if let Err(e) = self.tracker.fail(stage, error.to_string()) {
            debug!("State tracker already terminal: {}", e);
        }

        CookFailure {
            package: self.plan.package,
            stage,
            error,
            history: self.tracker.into_history(),
            log: self.log,
        }
    }

    fn remove_build_dir(&self) {
        let dir = &self.plan.layout.build_dir;
        if dir.exists()
            && let Err(e) = fs::remove_dir_all(dir)
        {
            warn!("Failed to remove build directory {}: {}", dir.display(), e);
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.log_line(&format!("WARNING: {}", message));
        self.warnings.push(message);
    }

    fn log_line(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }

    /// Log step output (stdout/stderr) with a phase header
    fn log_build_output(&mut self, phase: Phase, output: &StepOutput) {
        self.log_line(&format!("=== {} ===", phase));
        if !output.stdout.is_empty() {
            self.log.push_str(&output.stdout);
            self.log.push('\n');
        }
        if !output.stderr.is_empty() {
            self.log.push_str(&output.stderr);
            self.log.push('\n');
        }
    }
}

/// Turn an unsuccessful step into the matching error
fn ensure_success(
    phase: Phase,
    index: usize,
    invocation: &Invocation,
    output: &StepOutput,
    config: &crate::kitchen::KitchenConfig,
) -> Result<()> {
    if output.timed_out {
        return Err(Error::StepTimedOut {
            phase,
            index,
            command: invocation.command_line(),
            timeout: config.step_timeout.unwrap_or_default(),
            output: output.combined(),
        });
    }
    if !output.success() {
        return Err(Error::StepFailed {
            phase,
            index,
            command: invocation.command_line(),
            exit_code: output.exit_code,
            output: output.combined(),
        });
    }
    Ok(())
}

/// Regular files under `root`, relative to it, sorted
fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}
