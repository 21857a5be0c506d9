// src/kitchen/patch.rs

//! Applying unified diffs to the extracted source tree
//!
//! Patches are applied in-process with `diffy`, one file section at a time.
//! A multi-file patch is split on its `---`/`+++` headers; hunk line counts
//! decide where each section ends, so commit messages and `diff --git`
//! preambles around the hunks are ignored.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const DEV_NULL: &str = "/dev/null";

/// Why a patch did not apply
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch is not valid UTF-8")]
    NotUtf8,

    #[error("no file sections found")]
    Empty,

    #[error("malformed hunk header: {0}")]
    BadHunkHeader(String),

    #[error("hunk in {0} ends early")]
    Truncated(String),

    #[error("cannot strip {strip} components from {path}")]
    Strip { strip: u32, path: String },

    #[error("{0}: no such file in source tree")]
    MissingFile(String),

    #[error("{0}: file already exists")]
    AlreadyExists(String),

    #[error("{path}: {reason}")]
    Rejected { path: String, reason: String },

    #[error("{0}: {1}")]
    Io(String, std::io::Error),
}

/// One file's worth of hunks
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileSection {
    old: String,
    new: String,
    hunks: String,
}

/// Apply `patch` to the tree rooted at `tree`
///
/// Returns the paths touched, relative to `tree`.
pub fn apply_patch(tree: &Path, patch: &[u8], strip: u32) -> Result<Vec<PathBuf>, PatchError> {
    let text = std::str::from_utf8(patch).map_err(|_| PatchError::NotUtf8)?;
    let sections = split_sections(text)?;
    if sections.is_empty() {
        return Err(PatchError::Empty);
    }

    let mut touched = Vec::with_capacity(sections.len());
    for section in &sections {
        touched.push(apply_section(tree, section, strip)?);
    }
    Ok(touched)
}

fn apply_section(tree: &Path, section: &FileSection, strip: u32) -> Result<PathBuf, PatchError> {
    let creates = section.old == DEV_NULL;
    let deletes = section.new == DEV_NULL;
    let named = if deletes { &section.old } else { &section.new };
    let relative = strip_components(named, strip)?;
    let path = tree.join(&relative);
    let shown = relative.display().to_string();

    let base = if creates {
        if path.exists() {
            return Err(PatchError::AlreadyExists(shown));
        }
        String::new()
    } else {
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes).map_err(|_| PatchError::Rejected {
                path: shown.clone(),
                reason: "target is not UTF-8 text".to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PatchError::MissingFile(shown));
            }
            Err(e) => return Err(PatchError::Io(shown, e)),
        }
    };

    let diff = format!("--- a\n+++ b\n{}", section.hunks);
    let parsed = diffy::Patch::from_str(&diff).map_err(|e| PatchError::Rejected {
        path: shown.clone(),
        reason: e.to_string(),
    })?;
    let patched = diffy::apply(&base, &parsed).map_err(|e| PatchError::Rejected {
        path: shown.clone(),
        reason: e.to_string(),
    })?;

    if deletes {
        if !patched.is_empty() {
            return Err(PatchError::Rejected {
                path: shown,
                reason: "file not empty after removal hunk".to_string(),
            });
        }
        fs::remove_file(&path).map_err(|e| PatchError::Io(shown.clone(), e))?;
        debug!("Removed {}", shown);
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PatchError::Io(shown.clone(), e))?;
        }
        fs::write(&path, patched).map_err(|e| PatchError::Io(shown.clone(), e))?;
        debug!("Patched {}", shown);
    }

    Ok(relative)
}

/// `-p<strip>` semantics
fn strip_components(path: &str, strip: u32) -> Result<PathBuf, PatchError> {
    let parts: Vec<&str> = path.split('/').filter(|c| !c.is_empty() && *c != ".").collect();
    let rest = parts.get(strip as usize..).unwrap_or(&[]);
    if rest.is_empty() || rest.contains(&"..") {
        return Err(PatchError::Strip {
            strip,
            path: path.to_string(),
        });
    }
    Ok(rest.iter().collect())
}

/// Header file name without the trailing timestamp
fn header_path(line: &str, marker: &str) -> String {
    let rest = &line[marker.len()..];
    let rest = rest.split('\t').next().unwrap_or(rest);
    rest.trim_end().to_string()
}

/// `@@ -a,b +c,d @@` -> (b, d); a missing count means 1
fn hunk_counts(line: &str) -> Result<(usize, usize), PatchError> {
    let bad = || PatchError::BadHunkHeader(line.trim_end().to_string());
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| s.split(" @@").next())
        .ok_or_else(bad)?;

    let mut ranges = inner.split_whitespace();
    let old = ranges.next().and_then(|r| r.strip_prefix('-')).ok_or_else(bad)?;
    let new = ranges.next().and_then(|r| r.strip_prefix('+')).ok_or_else(bad)?;

    let count = |range: &str| -> Result<usize, PatchError> {
        match range.split_once(',') {
            Some((_, n)) => n.parse().map_err(|_| bad()),
            None => range.parse::<usize>().map(|_| 1).map_err(|_| bad()),
        }
    };
    Ok((count(old)?, count(new)?))
}

fn split_sections(text: &str) -> Result<Vec<FileSection>, PatchError> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut sections = Vec::new();
    let mut current: Option<FileSection> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.starts_with("--- ")
            && let Some(next) = lines.get(i + 1)
            && next.starts_with("+++ ")
        {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            current = Some(FileSection {
                old: header_path(line, "--- "),
                new: header_path(next, "+++ "),
                hunks: String::new(),
            });
            i += 2;
            continue;
        }

        if line.starts_with("@@ ")
            && let Some(section) = current.as_mut()
        {
            let (mut old_left, mut new_left) = hunk_counts(line)?;
            section.hunks.push_str(line);
            i += 1;

            while old_left > 0 || new_left > 0 {
                let Some(body) = lines.get(i) else {
                    return Err(PatchError::Truncated(section.new.clone()));
                };
                match body.as_bytes().first() {
                    Some(b' ') | Some(b'\n') | Some(b'\r') => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                    }
                    Some(b'-') => old_left = old_left.saturating_sub(1),
                    Some(b'+') => new_left = new_left.saturating_sub(1),
                    Some(b'\\') => {}
                    _ => return Err(PatchError::Truncated(section.new.clone())),
                }
                // An empty context line may have lost its leading space
                if body.starts_with('\n') || body.starts_with('\r') {
                    section.hunks.push(' ');
                }
                section.hunks.push_str(body);
                i += 1;
            }

            if let Some(marker) = lines.get(i)
                && marker.starts_with('\\')
            {
                section.hunks.push_str(marker);
                i += 1;
            }
            continue;
        }

        i += 1;
    }

    if let Some(done) = current {
        sections.push(done);
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIX: &str = "\
diff --git a/src/heif.c b/src/heif.c
index 1111111..2222222 100644
--- a/src/heif.c\t2024-01-01 00:00:00.000000000 +0000
+++ b/src/heif.c\t2024-01-02 00:00:00.000000000 +0000
@@ -1,3 +1,3 @@
 int main(void) {
-    return 1;
+    return 0;
 }
";

    fn tree_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_apply_simple() {
        let tree = tree_with(&[("src/heif.c", "int main(void) {\n    return 1;\n}\n")]);
        let touched = apply_patch(tree.path(), FIX.as_bytes(), 1).unwrap();
        assert_eq!(touched, vec![PathBuf::from("src/heif.c")]);
        assert_eq!(
            fs::read_to_string(tree.path().join("src/heif.c")).unwrap(),
            "int main(void) {\n    return 0;\n}\n"
        );
    }

    #[test]
    fn test_conflict() {
        let tree = tree_with(&[("src/heif.c", "int main(void) {\n    return 2;\n}\n")]);
        assert!(matches!(
            apply_patch(tree.path(), FIX.as_bytes(), 1),
            Err(PatchError::Rejected { .. })
        ));
    }

    #[test]
    fn test_missing_target() {
        let tree = tree_with(&[]);
        assert!(matches!(
            apply_patch(tree.path(), FIX.as_bytes(), 1),
            Err(PatchError::MissingFile(path)) if path == "src/heif.c"
        ));
    }

    #[test]
    fn test_strip_levels() {
        let tree = tree_with(&[("heif.c", "int main(void) {\n    return 1;\n}\n")]);
        apply_patch(tree.path(), FIX.as_bytes(), 2).unwrap();
        assert!(fs::read_to_string(tree.path().join("heif.c")).unwrap().contains("return 0"));

        assert!(matches!(
            apply_patch(tree.path(), FIX.as_bytes(), 3),
            Err(PatchError::Strip { .. })
        ));
    }

    #[test]
    fn test_create_and_delete() {
        let tree = tree_with(&[("old.txt", "bye\n")]);
        let patch = "\
--- /dev/null
+++ b/new.txt
@@ -0,0 +1,2 @@
+hello
+world
--- a/old.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
";
        let touched = apply_patch(tree.path(), patch.as_bytes(), 1).unwrap();
        assert_eq!(touched.len(), 2);
        assert_eq!(fs::read_to_string(tree.path().join("new.txt")).unwrap(), "hello\nworld\n");
        assert!(!tree.path().join("old.txt").exists());
    }

    #[test]
    fn test_multi_file_with_preamble() {
        let tree = tree_with(&[("a.txt", "one\n"), ("b.txt", "two\n")]);
        let patch = "\
From: someone
Subject: fix both

--- a/a.txt
+++ b/a.txt
@@ -1 +1 @@
-one
+ONE
--- a/b.txt
+++ b/b.txt
@@ -1 +1 @@
-two
+TWO
--
2.43.0
";
        apply_patch(tree.path(), patch.as_bytes(), 1).unwrap();
        assert_eq!(fs::read_to_string(tree.path().join("a.txt")).unwrap(), "ONE\n");
        assert_eq!(fs::read_to_string(tree.path().join("b.txt")).unwrap(), "TWO\n");
    }

    #[test]
    fn test_hunk_counts() {
        assert_eq!(hunk_counts("@@ -1,3 +1,4 @@ fn main\n").unwrap(), (3, 4));
        assert_eq!(hunk_counts("@@ -1 +1 @@\n").unwrap(), (1, 1));
        assert_eq!(hunk_counts("@@ -0,0 +1,2 @@\n").unwrap(), (0, 2));
        assert!(hunk_counts("@@ nonsense @@\n").is_err());
    }

    #[test]
    fn test_empty_patch() {
        let tree = tree_with(&[]);
        assert!(matches!(
            apply_patch(tree.path(), b"just words\n", 1),
            Err(PatchError::Empty)
        ));
    }
}
