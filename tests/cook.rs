// tests/cook.rs

//! Integration tests for cooking a single recipe
//!
//! Every collaborator is replaced by a double from `common`, so these tests
//! never touch the network or spawn a build tool. Extraction, patching and
//! the source cache are real.

mod common;

use common::{
    MapFetcher, Script, ScriptedRunner, StaticProbe, checksum_of, make_tarball, manifest,
    source_url, test_kitchen, test_kitchen_with,
};
use pantry::kitchen::{Invocation, KitchenConfig, ProcessRunner, RunLimits, StepOutput, StepRunner};
use pantry::{CookState, Error, FeatureOverrides, Kitchen, Phase, Recipe, parse_recipe};
use std::sync::Arc;
use std::time::Duration;

const CONFIG_H: &str = "#pragma once\n#define LEVEL 1\n";

const LEVEL_2: &str = "\
--- a/src/config.h
+++ b/src/config.h
@@ -1,2 +1,2 @@
 #pragma once
-#define LEVEL 1
+#define LEVEL 2
";

const LEVEL_3: &str = "\
--- a/src/config.h
+++ b/src/config.h
@@ -1,2 +1,2 @@
 #pragma once
-#define LEVEL 2
+#define LEVEL 3
";

fn archive() -> Vec<u8> {
    make_tarball(
        "libheif-1.19.7",
        &[
            ("CMakeLists.txt", "project(libheif)\n"),
            ("src/config.h", CONFIG_H),
            ("examples/example.heic", "heic"),
            ("examples/example.avif", "avif"),
        ],
    )
}

/// A libheif-shaped recipe whose test decodes the shipped sample image
fn heif_recipe(archive: &[u8]) -> Recipe {
    let text = format!(
        r#"share = ["examples/example.heic"]
{manifest}
[[dependencies]]
name = "cmake"
scope = "build"

[[dependencies]]
name = "libde265"

[features.flags]
WITH_LIBDE265 = true
WITH_X265 = false

[[install]]
tool = "cmake"
args = ["-S", ".", "-B", "build", "%(features)s", "-DCMAKE_INSTALL_PREFIX=%(prefix)s"]

[[install]]
tool = "cmake"
args = ["--install", "build"]

[[post_install]]
tool = "update-mime-database"
args = ["%(shared)s/share/mime"]

[[test]]
tool = "heif-convert"
args = ["%(pkgshare)s/example.heic", "exampleheic.jpg"]
expect_output = "File contains 2 images"
expect_paths = ["exampleheic-1.jpg", "exampleheic-2.jpg"]
"#,
        manifest = manifest("libheif", "1.19.7", archive)
    );
    parse_recipe(&text).unwrap()
}

fn patched_recipe(archive: &[u8], patches: &[(&str, &str)]) -> Recipe {
    let mut text = manifest("libheif", "1.19.7", archive);
    for (url, body) in patches {
        text.push_str(&format!(
            "\n[[patches]]\nurl = \"{}\"\nchecksum = \"{}\"\n",
            url,
            checksum_of(body.as_bytes())
        ));
    }
    text.push_str("\n[[install]]\ntool = \"make\"\nargs = [\"install\"]\n");
    parse_recipe(&text).unwrap()
}

fn serving(archive: &[u8]) -> Arc<MapFetcher> {
    Arc::new(MapFetcher::new().with(source_url("libheif", "1.19.7"), archive.to_vec()))
}

fn decoding_runner(outputs: &[&str]) -> ScriptedRunner {
    ScriptedRunner::new().script(
        "heif-convert",
        Script::prints("File contains 2 images\nWritten to exampleheic-1.jpg\n").creating(outputs),
    )
}

#[test]
fn test_cook_reaches_done() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let runner = Arc::new(decoding_runner(&["exampleheic-1.jpg", "exampleheic-2.jpg"]));
    let kitchen = test_kitchen(
        root.path(),
        serving(&data),
        runner.clone(),
        Arc::new(StaticProbe::default()),
    );

    let result = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap();

    assert_eq!(
        result.history,
        vec![
            CookState::Pending,
            CookState::Fetched,
            CookState::Verified,
            CookState::Patched,
            CookState::Built,
            CookState::Installed,
            CookState::Tested,
            CookState::Done,
        ]
    );
    assert_eq!(result.version, "1.19.7");
    assert_eq!(result.tests_run, 1);
    assert!(result.warnings.is_empty());
    assert_eq!(
        runner.programs(),
        vec!["cmake", "cmake", "update-mime-database", "heif-convert"]
    );

    let configure = &runner.invocations()[0];
    assert!(configure.args.contains(&"-DWITH_LIBDE265=ON".to_string()));
    assert!(configure.args.contains(&"-DWITH_X265=OFF".to_string()));

    let shared = result.prefix.join("share/libheif/example.heic");
    assert_eq!(std::fs::read_to_string(shared).unwrap(), "heic");
    assert!(
        result
            .installed_files
            .contains(&std::path::PathBuf::from("share/libheif/example.heic"))
    );

    let opt_link = root.path().join("opt/libheif");
    assert_eq!(
        std::fs::canonicalize(&opt_link).unwrap(),
        std::fs::canonicalize(&result.prefix).unwrap()
    );

    // Build directory is gone unless asked to keep it
    assert!(!root.path().join("build/libheif-1.19.7").exists());
}

#[test]
fn test_missing_test_output_is_named() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let kitchen = test_kitchen(
        root.path(),
        serving(&data),
        Arc::new(decoding_runner(&["exampleheic-1.jpg"])),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();

    assert_eq!(failure.stage, Phase::Test);
    match &failure.error {
        Error::VerificationFailed {
            step,
            expected,
            actual,
        } => {
            assert_eq!(*step, 0);
            assert!(expected.ends_with("exampleheic-2.jpg"));
            assert_eq!(actual, "missing");
        }
        other => panic!("expected VerificationFailed, got {:?}", other),
    }
    assert!(matches!(
        failure.history.last(),
        Some(CookState::Failed { stage: Phase::Test, .. })
    ));
    assert_eq!(failure.history[failure.history.len() - 2], CookState::Installed);
}

#[test]
fn test_wrong_output_text() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let runner = ScriptedRunner::new().script(
        "heif-convert",
        Script::prints("File contains 1 image\n")
            .creating(&["exampleheic-1.jpg", "exampleheic-2.jpg"]),
    );
    let kitchen = test_kitchen(
        root.path(),
        serving(&data),
        Arc::new(runner),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();
    match failure.error {
        Error::VerificationFailed { expected, actual, .. } => {
            assert!(expected.contains("File contains 2 images"));
            assert!(actual.contains("File contains 1 image"));
        }
        other => panic!("expected VerificationFailed, got {:?}", other),
    }
}

#[test]
fn test_integrity_mismatch_runs_nothing() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let fetcher = Arc::new(
        MapFetcher::new().with(source_url("libheif", "1.19.7"), b"truncated download".to_vec()),
    );
    let runner = Arc::new(ScriptedRunner::new());
    let kitchen = test_kitchen(
        root.path(),
        fetcher,
        runner.clone(),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();

    assert_eq!(failure.stage, Phase::Verify);
    match &failure.error {
        Error::IntegrityMismatch {
            resource,
            expected,
            actual,
        } => {
            assert_eq!(resource, &source_url("libheif", "1.19.7"));
            assert_eq!(expected, &checksum_of(&data));
            assert_eq!(actual, &checksum_of(b"truncated download"));
        }
        other => panic!("expected IntegrityMismatch, got {:?}", other),
    }
    assert!(runner.invocations().is_empty());
    assert!(!kitchen.sources_cached(&heif_recipe(&data)).unwrap());
}

#[test]
fn test_patch_order_matters() {
    let data = archive();
    let first = "https://downloads.example.org/patches/level-2.patch";
    let second = "https://downloads.example.org/patches/level-3.patch";
    let fetcher = Arc::new(
        MapFetcher::new()
            .with(source_url("libheif", "1.19.7"), data.clone())
            .with(first, LEVEL_2)
            .with(second, LEVEL_3),
    );

    let root = tempfile::tempdir().unwrap();
    let config = KitchenConfig {
        keep_builddir: true,
        ..KitchenConfig::rooted_at(root.path())
    };
    let kitchen = test_kitchen_with(
        config,
        fetcher.clone(),
        Arc::new(ScriptedRunner::new()),
        Arc::new(StaticProbe::default()),
    );

    let in_order = patched_recipe(&data, &[(first, LEVEL_2), (second, LEVEL_3)]);
    kitchen.cook(&in_order, &FeatureOverrides::new()).unwrap();
    let plan = kitchen.plan(&in_order, &FeatureOverrides::new()).unwrap();
    let header = std::fs::read_to_string(plan.layout.srcdir.join("src/config.h")).unwrap();
    assert_eq!(header, "#pragma once\n#define LEVEL 3\n");

    let reversed = patched_recipe(&data, &[(second, LEVEL_3), (first, LEVEL_2)]);
    let failure = kitchen
        .cook(&reversed, &FeatureOverrides::new())
        .unwrap_err();
    assert_eq!(failure.stage, Phase::Patch);
    match failure.error {
        Error::PatchConflict { index, patch, .. } => {
            assert_eq!(index, 0);
            assert_eq!(patch, second);
        }
        other => panic!("expected PatchConflict, got {:?}", other),
    }
}

#[test]
fn test_patch_checksum_verified() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let url = "https://downloads.example.org/patches/level-2.patch";
    let fetcher = Arc::new(
        MapFetcher::new()
            .with(source_url("libheif", "1.19.7"), data.clone())
            .with(url, LEVEL_3),
    );
    let runner = Arc::new(ScriptedRunner::new());
    let kitchen = test_kitchen(
        root.path(),
        fetcher,
        runner.clone(),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&patched_recipe(&data, &[(url, LEVEL_2)]), &FeatureOverrides::new())
        .unwrap_err();
    assert!(matches!(
        failure.error,
        Error::IntegrityMismatch { ref resource, .. } if resource == url
    ));
    assert!(runner.invocations().is_empty());
}

#[test]
fn test_recipe_unchanged_across_cooks() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let fetcher = serving(&data);
    let kitchen = test_kitchen(
        root.path(),
        fetcher.clone(),
        Arc::new(decoding_runner(&["exampleheic-1.jpg", "exampleheic-2.jpg"])),
        Arc::new(StaticProbe::default()),
    );

    let recipe = heif_recipe(&data);
    let before = recipe.clone();
    let first = kitchen.cook(&recipe, &FeatureOverrides::new()).unwrap();
    let second = kitchen.cook(&recipe, &FeatureOverrides::new()).unwrap();

    assert_eq!(recipe, before);
    assert_eq!(first.history, second.history);
    assert_eq!(first.installed_files, second.installed_files);

    // The second cook is served from the verified cache
    assert_eq!(fetcher.calls(), 1);
    assert!(second.log.contains("Using cached"));
}

#[test]
fn test_step_failure_carries_output() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let runner = ScriptedRunner::new().script(
        "cmake",
        Script {
            stdout: "CMake Error: Could not find libde265\n".to_string(),
            exit_code: 1,
            ..Script::default()
        },
    );
    let kitchen = test_kitchen(
        root.path(),
        serving(&data),
        Arc::new(runner),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();

    assert_eq!(failure.stage, Phase::Build);
    match &failure.error {
        Error::StepFailed {
            phase,
            index,
            command,
            exit_code,
            output,
        } => {
            assert_eq!(*phase, Phase::Build);
            assert_eq!(*index, 0);
            assert!(command.starts_with("cmake -S . -B build"));
            assert_eq!(*exit_code, Some(1));
            assert_eq!(output, "CMake Error: Could not find libde265\n");
        }
        other => panic!("expected StepFailed, got {:?}", other),
    }
    assert!(failure.log.contains("CMake Error"));
    assert!(failure.to_string().contains("libheif: build failed"));
}

#[test]
fn test_failing_test_step() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let runner = ScriptedRunner::new().script("heif-convert", Script::exits(1));
    let kitchen = test_kitchen(
        root.path(),
        serving(&data),
        Arc::new(runner),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();
    assert!(matches!(
        failure.error,
        Error::StepFailed {
            phase: Phase::Test,
            index: 0,
            ..
        }
    ));
}

#[test]
fn test_step_timeout() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let config = KitchenConfig {
        step_timeout: Some(Duration::from_secs(5)),
        ..KitchenConfig::rooted_at(root.path())
    };
    let kitchen = test_kitchen_with(
        config,
        serving(&data),
        Arc::new(ScriptedRunner::new().script("cmake", Script::hangs())),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();
    match failure.error {
        Error::StepTimedOut {
            phase,
            index,
            timeout,
            ..
        } => {
            assert_eq!(phase, Phase::Build);
            assert_eq!(index, 0);
            assert_eq!(timeout, Duration::from_secs(5));
        }
        other => panic!("expected StepTimedOut, got {:?}", other),
    }
}

#[test]
fn test_post_install_failure_is_a_warning() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let runner = decoding_runner(&["exampleheic-1.jpg", "exampleheic-2.jpg"])
        .script("update-mime-database", Script::exits(2));
    let kitchen = test_kitchen(
        root.path(),
        serving(&data),
        Arc::new(runner),
        Arc::new(StaticProbe::default()),
    );

    let result = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap();
    assert_eq!(result.history.last(), Some(&CookState::Done));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("update-mime-database"));
    assert!(result.warnings[0].contains("exit status 2"));
}

#[test]
fn test_missing_dependency_stops_before_fetch() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let fetcher = serving(&data);
    let runner = Arc::new(ScriptedRunner::new());
    let probe = Arc::new(StaticProbe::missing(&["libde265"]));
    let kitchen = test_kitchen(root.path(), fetcher.clone(), runner.clone(), probe.clone());

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();

    assert_eq!(failure.stage, Phase::Dependencies);
    assert!(matches!(
        failure.error,
        Error::UnresolvedDependency { ref name, .. } if name == "libde265"
    ));
    assert_eq!(probe.probed(), vec!["cmake", "libde265"]);
    assert_eq!(fetcher.calls(), 0);
    assert!(runner.invocations().is_empty());
    assert_eq!(failure.history.len(), 2);
}

#[test]
fn test_dependency_check_can_be_disabled() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let probe = Arc::new(StaticProbe::missing(&["libde265"]));
    let config = KitchenConfig {
        check_dependencies: false,
        run_tests: false,
        ..KitchenConfig::rooted_at(root.path())
    };
    let runner = Arc::new(ScriptedRunner::new());
    let kitchen = test_kitchen_with(config, serving(&data), runner.clone(), probe.clone());

    let result = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap();
    assert!(probe.probed().is_empty());
    assert_eq!(result.tests_run, 0);
    assert!(!runner.programs().contains(&"heif-convert".to_string()));
}

#[test]
fn test_unknown_override_fails_before_anything_runs() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let fetcher = serving(&data);
    let kitchen = test_kitchen(
        root.path(),
        fetcher.clone(),
        Arc::new(ScriptedRunner::new()),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new().enable("WITH_KVAZAAR"))
        .unwrap_err();
    assert!(matches!(failure.error, Error::UnknownFeature(ref name) if name == "WITH_KVAZAAR"));
    assert_eq!(fetcher.calls(), 0);
}

#[test]
fn test_missing_share_file() {
    let root = tempfile::tempdir().unwrap();
    let data = make_tarball("libheif-1.19.7", &[("CMakeLists.txt", "project(libheif)\n")]);
    let kitchen = test_kitchen(
        root.path(),
        serving(&data),
        Arc::new(ScriptedRunner::new()),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();
    assert_eq!(failure.stage, Phase::Install);
    assert!(matches!(
        failure.error,
        Error::MissingArtifact(ref path) if path.ends_with("examples/example.heic")
    ));
}

#[test]
fn test_cancelled_before_start() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let fetcher = serving(&data);
    let config = KitchenConfig::rooted_at(root.path());
    config.cancel.cancel();
    let kitchen = test_kitchen_with(
        config,
        fetcher.clone(),
        Arc::new(ScriptedRunner::new()),
        Arc::new(StaticProbe::default()),
    );

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();
    assert!(matches!(failure.error, Error::Cancelled));
    assert_eq!(fetcher.calls(), 0);
}

/// Runner that behaves like a process killed by the operator mid-build
struct CancellingRunner {
    config: KitchenConfig,
}

impl StepRunner for CancellingRunner {
    fn run(&self, _invocation: &Invocation, _limits: &RunLimits) -> pantry::Result<StepOutput> {
        self.config.cancel.cancel();
        Err(Error::Cancelled)
    }
}

#[test]
fn test_cancelled_during_build() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let config = KitchenConfig::rooted_at(root.path());
    let kitchen = Kitchen::new(config.clone())
        .with_fetcher(serving(&data))
        .with_probe(Arc::new(StaticProbe::default()))
        .with_runner(Arc::new(CancellingRunner { config }));

    let failure = kitchen
        .cook(&heif_recipe(&data), &FeatureOverrides::new())
        .unwrap_err();
    assert_eq!(failure.stage, Phase::Build);
    assert!(matches!(failure.error, Error::Cancelled));
    assert!(kitchen.config().cancel.is_cancelled());
}

#[test]
fn test_fetch_warms_cache() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let fetcher = serving(&data);
    let kitchen = test_kitchen(
        root.path(),
        fetcher.clone(),
        Arc::new(ScriptedRunner::new()),
        Arc::new(StaticProbe::default()),
    );
    let recipe = heif_recipe(&data);

    assert!(!kitchen.sources_cached(&recipe).unwrap());
    let paths = kitchen.fetch(&recipe).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(std::fs::read(&paths[0]).unwrap(), data);
    assert!(kitchen.sources_cached(&recipe).unwrap());

    kitchen.fetch(&recipe).unwrap();
    assert_eq!(fetcher.calls(), 1);
}

#[test]
fn test_missing_tool_names_the_step() {
    let root = tempfile::tempdir().unwrap();
    let data = archive();
    let text = format!(
        "{}\n[[install]]\ntool = \"cmake\"\nargs = [\"-S\", \".\"]\n\n[[install]]\ntool = \"/nonexistent/pantry-cmake\"\nargs = [\"--build\", \"build\"]\n",
        manifest("libheif", "1.19.7", &data)
    );
    let recipe = parse_recipe(&text).unwrap();

    // The host runner, so the second tool really fails to spawn
    let kitchen = Kitchen::new(KitchenConfig::rooted_at(root.path()))
        .with_fetcher(serving(&data))
        .with_probe(Arc::new(StaticProbe::default()))
        .with_runner(Arc::new(SpawningRunner));

    let failure = kitchen.cook(&recipe, &FeatureOverrides::new()).unwrap_err();
    assert_eq!(failure.stage, Phase::Build);
    match &failure.error {
        Error::StepNotStarted {
            phase,
            index,
            command,
            reason,
        } => {
            assert_eq!(*phase, Phase::Build);
            assert_eq!(*index, 1);
            assert_eq!(command, "/nonexistent/pantry-cmake --build build");
            assert!(!reason.is_empty());
        }
        other => panic!("expected StepNotStarted, got {:?}", other),
    }
    assert!(failure.to_string().contains("build step #1"));
}

/// Runs `cmake` as a no-op and everything else on the host
struct SpawningRunner;

impl StepRunner for SpawningRunner {
    fn run(&self, invocation: &Invocation, limits: &RunLimits) -> pantry::Result<StepOutput> {
        if invocation.program == "cmake" {
            return Ok(StepOutput {
                exit_code: Some(0),
                ..StepOutput::default()
            });
        }
        ProcessRunner.run(invocation, limits)
    }
}

#[test]
fn test_post_install_runs_tool_through_opt_link() {
    let root = tempfile::tempdir().unwrap();
    let data = make_tarball("mime-1.0", &[("README", "mime")]);
    let text = format!(
        r#"{manifest}
[[install]]
tool = "sh"
args = ["-c", "mkdir -p %(bin)s && printf '#!/bin/sh\ntouch %(prefix)s/registered\n' > %(bin)s/register && chmod +x %(bin)s/register"]

[[post_install]]
tool = "%(opt)s/mime/bin/register"
"#,
        manifest = manifest("mime", "1.0", &data)
    );
    let recipe = parse_recipe(&text).unwrap();

    let kitchen = Kitchen::new(KitchenConfig::rooted_at(root.path()))
        .with_fetcher(Arc::new(MapFetcher::new().with(source_url("mime", "1.0"), data)))
        .with_probe(Arc::new(StaticProbe::default()));

    let result = kitchen.cook(&recipe, &FeatureOverrides::new()).unwrap();
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert!(result.prefix.join("registered").exists());
    assert!(root.path().join("opt/mime/bin/register").exists());
}

#[test]
fn test_opt_link_follows_latest_cook() {
    let root = tempfile::tempdir().unwrap();
    let kitchen_for = |version: &str, data: &[u8]| {
        test_kitchen(
            root.path(),
            Arc::new(MapFetcher::new().with(source_url("libheif", version), data.to_vec())),
            Arc::new(ScriptedRunner::new()),
            Arc::new(StaticProbe::default()),
        )
    };

    for version in ["1.18.1", "1.19.7"] {
        let data = make_tarball(&format!("libheif-{}", version), &[("README", version)]);
        let text = format!(
            "{}\n[[install]]\ntool = \"make\"\n",
            manifest("libheif", version, &data)
        );
        let recipe = parse_recipe(&text).unwrap();
        kitchen_for(version, &data)
            .cook(&recipe, &FeatureOverrides::new())
            .unwrap();
    }

    assert_eq!(
        std::fs::read_link(root.path().join("opt/libheif")).unwrap(),
        root.path().join("cellar/libheif/1.19.7")
    );
}
