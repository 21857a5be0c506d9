// tests/common/mod.rs

//! Shared test doubles and recipe builders for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use pantry::Error;
use pantry::hash::sha256;
use pantry::kitchen::{
    Availability, DependencyProbe, Fetcher, Invocation, Kitchen, KitchenConfig, PlannedDependency,
    RunLimits, StepOutput, StepRunner,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Build a `.tar.gz` holding `files` under the directory `top`
pub fn make_tarball(top: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/{}", top, path), content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Prefixed sha256 checksum of `data`, as written in a manifest
pub fn checksum_of(data: &[u8]) -> String {
    format!("sha256:{}", sha256(data))
}

/// Download URL used by [`manifest`] for a package's source archive
pub fn source_url(name: &str, version: &str) -> String {
    format!("https://downloads.example.org/{name}/{name}-{version}.tar.gz")
}

/// `[package]` and `[source]` sections for a recipe whose archive is `archive`
///
/// Tests append their own tables; top-level keys such as `share` must be
/// placed before this text.
pub fn manifest(name: &str, version: &str, archive: &[u8]) -> String {
    format!(
        r#"
[package]
name = "{name}"
version = "{version}"
license = "LGPL-3.0-only"
summary = "Test package {name}"

[source]
url = "{url}"
checksum = "{checksum}"
"#,
        url = source_url(name, version),
        checksum = checksum_of(archive),
    )
}

/// Fetcher serving fixed bytes per URL and counting requests
#[derive(Default)]
pub struct MapFetcher {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(url, data);
        self
    }

    pub fn insert(&self, url: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.resources
            .lock()
            .unwrap()
            .insert(url.into(), data.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for MapFetcher {
    fn fetch(&self, url: &str) -> pantry::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.resources
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Download(format!("no such resource {}", url)))
    }
}

/// What the scripted runner does when a given program is invoked
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub stdout: String,
    pub exit_code: i32,
    pub timed_out: bool,
    /// Files created relative to the invocation's working directory
    pub creates: Vec<PathBuf>,
}

impl Script {
    pub fn prints(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            ..Self::default()
        }
    }

    pub fn exits(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn hangs() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    pub fn creating(mut self, paths: &[&str]) -> Self {
        self.creates = paths.iter().map(PathBuf::from).collect();
        self
    }
}

/// Step runner that never spawns anything
///
/// Programs without a script succeed silently. Every invocation is recorded.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, program: &str, script: Script) -> Self {
        self.scripts.insert(program.to_string(), script);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|i| i.program)
            .collect()
    }
}

impl StepRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation, _limits: &RunLimits) -> pantry::Result<StepOutput> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let script = self
            .scripts
            .get(&invocation.program)
            .cloned()
            .unwrap_or_default();
        for path in &script.creates {
            let full = invocation.workdir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, b"output")?;
        }

        Ok(StepOutput {
            exit_code: if script.timed_out {
                None
            } else {
                Some(script.exit_code)
            },
            stdout: script.stdout,
            stderr: String::new(),
            timed_out: script.timed_out,
        })
    }
}

/// Probe reporting a fixed set of names as missing
#[derive(Default)]
pub struct StaticProbe {
    missing: HashSet<String>,
    probed: Mutex<Vec<String>>,
}

impl StaticProbe {
    pub fn missing(names: &[&str]) -> Self {
        Self {
            missing: names.iter().map(|n| n.to_string()).collect(),
            probed: Mutex::new(Vec::new()),
        }
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

impl DependencyProbe for StaticProbe {
    fn probe(&self, dependency: &PlannedDependency) -> Availability {
        self.probed.lock().unwrap().push(dependency.name.clone());
        if self.missing.contains(&dependency.name) {
            Availability::Missing("not installed".to_string())
        } else {
            Availability::Found
        }
    }
}

/// A kitchen rooted in `root` with all collaborators replaced
pub fn test_kitchen(
    root: &Path,
    fetcher: Arc<MapFetcher>,
    runner: Arc<ScriptedRunner>,
    probe: Arc<StaticProbe>,
) -> Kitchen {
    test_kitchen_with(KitchenConfig::rooted_at(root), fetcher, runner, probe)
}

pub fn test_kitchen_with(
    config: KitchenConfig,
    fetcher: Arc<MapFetcher>,
    runner: Arc<ScriptedRunner>,
    probe: Arc<StaticProbe>,
) -> Kitchen {
    Kitchen::new(config)
        .with_fetcher(fetcher)
        .with_runner(runner)
        .with_probe(probe)
}
