// src/kitchen/probe.rs

//! Dependency availability checks
//!
//! Before anything is fetched, every declared dependency is looked up in the
//! environment. Missing dependencies stop the cook with
//! [`Error::UnresolvedDependency`]; nothing is installed automatically.

use crate::error::{Error, Result};
use crate::kitchen::plan::PlannedDependency;
use regex::Regex;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static DOTTED_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)+)").expect("static regex is valid"));

/// Outcome of looking for one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Found,
    Missing(String),
}

/// Trait for checking whether dependencies are present
///
/// This keeps the Kitchen decoupled from how packages are installed on the
/// host; tests substitute a fixed answer.
pub trait DependencyProbe: Send + Sync {
    fn probe(&self, dependency: &PlannedDependency) -> Availability;
}

/// A probe that assumes all dependencies are satisfied
///
/// Use this when the environment is known to be complete (e.g. a
/// pre-configured build container).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProbe;

impl DependencyProbe for NoopProbe {
    fn probe(&self, _dependency: &PlannedDependency) -> Availability {
        Availability::Found
    }
}

/// Looks in the cellar, then `PATH`, then pkg-config
#[derive(Debug, Clone)]
pub struct HostProbe {
    cellar: PathBuf,
}

impl HostProbe {
    pub fn new(cellar: impl Into<PathBuf>) -> Self {
        Self {
            cellar: cellar.into(),
        }
    }

    fn tool_version(name: &str) -> Option<String> {
        let output = Command::new(name)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .ok()?;
        let text = String::from_utf8_lossy(&output.stdout);
        let text = if text.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr)
        } else {
            text
        };
        extract_version(&text)
    }

    fn pkg_config(args: &[&str]) -> bool {
        Command::new("pkg-config")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl DependencyProbe for HostProbe {
    fn probe(&self, dependency: &PlannedDependency) -> Availability {
        let name = dependency.name.as_str();

        if self.cellar.join(name).is_dir() {
            debug!("{} found in cellar", name);
            return Availability::Found;
        }

        if let Ok(path) = which::which(name) {
            debug!("{} found at {}", name, path.display());
            let Some(required) = &dependency.min_version else {
                return Availability::Found;
            };
            return match Self::tool_version(name) {
                Some(found) if compare_versions(&found, required) != Ordering::Less => {
                    Availability::Found
                }
                Some(found) => Availability::Missing(format!(
                    "version {} is older than required {}",
                    found, required
                )),
                None => Availability::Missing(format!(
                    "cannot determine version (need at least {})",
                    required
                )),
            };
        }

        let module = dependency.pkg_config.as_str();
        if Self::pkg_config(&["--exists", module]) {
            debug!("{} found via pkg-config module {}", name, module);
            if let Some(required) = &dependency.min_version
                && !Self::pkg_config(&["--atleast-version", required, module])
            {
                return Availability::Missing(format!(
                    "pkg-config module {} is older than required {}",
                    module, required
                ));
            }
            return Availability::Found;
        }

        Availability::Missing("not found in cellar, PATH or pkg-config".to_string())
    }
}

/// Probe every dependency; fail naming the first missing one
///
/// All missing dependencies are logged so one run reports the whole gap.
pub fn check_dependencies(
    probe: &dyn DependencyProbe,
    dependencies: &[PlannedDependency],
) -> Result<()> {
    if dependencies.is_empty() {
        debug!("No dependencies declared");
        return Ok(());
    }

    let names: Vec<&str> = dependencies.iter().map(|d| d.name.as_str()).collect();
    info!("Checking dependencies: {}", names.join(", "));

    let mut first_missing: Option<(String, String)> = None;
    for dependency in dependencies {
        if let Availability::Missing(reason) = probe.probe(dependency) {
            warn!(
                "Missing {} dependency {}: {}",
                dependency.scope, dependency.name, reason
            );
            first_missing.get_or_insert((dependency.name.clone(), reason));
        }
    }

    match first_missing {
        Some((name, reason)) => Err(Error::UnresolvedDependency { name, reason }),
        None => Ok(()),
    }
}

/// First dotted version number in `text`
pub fn extract_version(text: &str) -> Option<String> {
    DOTTED_VERSION
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Compare dotted versions numerically; missing components count as zero
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
