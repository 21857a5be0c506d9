// src/kitchen/archive.rs

//! Source archive extraction

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Turns a verified archive into a source tree
pub trait Extractor: Send + Sync {
    /// Unpack `data` (downloaded as `filename`) so the sources end up at `dest`
    ///
    /// `extract_dir` names the directory inside the archive holding the
    /// sources; without it a single top-level directory is used if present.
    fn extract(
        &self,
        data: &[u8],
        filename: &str,
        dest: &Path,
        extract_dir: Option<&str>,
    ) -> Result<()>;
}

/// Compression wrapped around a tarball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarZst,
    Tar,
}

impl ArchiveFormat {
    /// Detect from the file name
    ///
    /// Supports: .tar.gz, .tgz, .tar.xz, .txz, .tar.zst, .tzst, .tar
    pub fn from_filename(filename: &str) -> Option<Self> {
        let name = filename.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Some(Self::TarZst)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    fn decoder<'a>(&self, data: &'a [u8]) -> Result<Box<dyn Read + 'a>> {
        let cursor = Cursor::new(data);
        Ok(match self {
            Self::TarGz => Box::new(GzDecoder::new(cursor)),
            Self::TarXz => Box::new(xz2::read::XzDecoder::new(cursor)),
            Self::TarZst => Box::new(
                zstd::stream::read::Decoder::new(cursor)
                    .map_err(|e| Error::Archive(format!("zstd: {}", e)))?,
            ),
            Self::Tar => Box::new(cursor),
        })
    }
}

/// Extractor for compressed tarballs
#[derive(Debug, Clone, Copy, Default)]
pub struct TarExtractor;

impl Extractor for TarExtractor {
    fn extract(
        &self,
        data: &[u8],
        filename: &str,
        dest: &Path,
        extract_dir: Option<&str>,
    ) -> Result<()> {
        let format = ArchiveFormat::from_filename(filename)
            .ok_or_else(|| Error::Archive(format!("Unknown archive format: {}", filename)))?;

        let staging = staging_dir(dest);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let mut archive = tar::Archive::new(format.decoder(data)?);
        archive
            .unpack(&staging)
            .map_err(|e| Error::Archive(format!("Failed to unpack {}: {}", filename, e)))?;

        let root = source_root(&staging, extract_dir)?;
        debug!("Source root for {}: {}", filename, root.display());

        if dest.exists() {
            fs::remove_dir_all(dest)?;
        }
        fs::rename(&root, dest)?;
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        Ok(())
    }
}

fn staging_dir(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".unpack");
    dest.with_file_name(name)
}

/// Pick the directory that holds the sources
fn source_root(staging: &Path, extract_dir: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = extract_dir {
        let relative = Path::new(dir);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::Archive(format!(
                "extract directory must be relative to the archive root: {}",
                dir
            )));
        }

        let root = staging.join(relative);
        if !root.is_dir() {
            return Err(Error::Archive(format!(
                "archive has no directory named {}",
                dir
            )));
        }
        // Symlinks inside the archive may still point elsewhere
        if !root.canonicalize()?.starts_with(staging.canonicalize()?) {
            return Err(Error::Archive(format!(
                "extract directory {} resolves outside the archive",
                dir
            )));
        }
        return Ok(root);
    }

    let entries: Vec<_> = fs::read_dir(staging)?.collect::<std::io::Result<_>>()?;
    match entries.as_slice() {
        [single] if single.file_type()?.is_dir() => Ok(single.path()),
        [] => Err(Error::Archive("archive is empty".to_string())),
        _ => Ok(staging.to_path_buf()),
    }
}
