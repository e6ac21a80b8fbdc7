//! On-disk good/bad archive buckets.
//!
//! One async mutex serialises every operation, so an upload copying into a
//! bucket can never interleave with a download zipping and clearing it.
//! Clearing moves files into a staging directory first; if any move fails,
//! the moved files are put back and the buckets stay as they were.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::models::Verdict;

pub const GOOD_DIR: &str = "good_pdfs";
pub const BAD_DIR: &str = "bad_pdfs";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Verdict '{0}' has no archive bucket")]
    NotArchivable(Verdict),

    #[error("Archive worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveCounts {
    pub good: usize,
    pub bad: usize,
}

pub struct ArchiveStore {
    root: PathBuf,
    good_dir: PathBuf,
    bad_dir: PathBuf,
    lock: Mutex<()>,
}

impl ArchiveStore {
    /// Opens the buckets under `root`, creating them if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let good_dir = root.as_ref().join(GOOD_DIR);
        let bad_dir = root.as_ref().join(BAD_DIR);
        std::fs::create_dir_all(&good_dir)?;
        std::fs::create_dir_all(&bad_dir)?;

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            good_dir,
            bad_dir,
            lock: Mutex::new(()),
        })
    }

    fn bucket(&self, verdict: Verdict) -> Result<&Path, StoreError> {
        match verdict {
            Verdict::Good => Ok(&self.good_dir),
            Verdict::Bad => Ok(&self.bad_dir),
            Verdict::Unclassified => Err(StoreError::NotArchivable(verdict)),
        }
    }

    /// Copies `source` into the verdict's bucket and returns the stored name.
    pub async fn add(
        &self,
        verdict: Verdict,
        filename: &str,
        source: &Path,
    ) -> Result<String, StoreError> {
        let dir = self.bucket(verdict)?.to_path_buf();
        let name = sanitize_filename(filename);
        let source = source.to_path_buf();

        let _guard = self.lock.lock().await;
        let stored = tokio::task::spawn_blocking(move || -> Result<String, StoreError> {
            let stored = unique_name(&dir, &name);
            std::fs::copy(&source, dir.join(&stored))?;
            Ok(stored)
        })
        .await??;

        info!(verdict = %verdict, stored = %stored, "Archived PDF");
        Ok(stored)
    }

    pub async fn counts(&self) -> Result<ArchiveCounts, StoreError> {
        let good_dir = self.good_dir.clone();
        let bad_dir = self.bad_dir.clone();

        let _guard = self.lock.lock().await;
        let counts = tokio::task::spawn_blocking(move || -> Result<ArchiveCounts, StoreError> {
            Ok(ArchiveCounts {
                good: list_files(&good_dir)?.len(),
                bad: list_files(&bad_dir)?.len(),
            })
        })
        .await??;
        Ok(counts)
    }

    /// Zips both buckets (`good/<name>`, `bad/<name>`) and empties them.
    ///
    /// The buckets are only cleared once the archive is fully built.
    pub async fn archive_and_clear(&self) -> Result<Vec<u8>, StoreError> {
        let root = self.root.clone();
        let good_dir = self.good_dir.clone();
        let bad_dir = self.bad_dir.clone();

        let _guard = self.lock.lock().await;
        let (bytes, entries) =
            tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, usize), StoreError> {
                let groups = [("good", list_files(&good_dir)?), ("bad", list_files(&bad_dir)?)];
                let entries: usize = groups.iter().map(|(_, files)| files.len()).sum();
                let bytes = build_archive(&groups)?;

                let files: Vec<PathBuf> = groups
                    .iter()
                    .flat_map(|(_, files)| files.iter().cloned())
                    .collect();
                let staging = tempfile::Builder::new()
                    .prefix(".clearing-")
                    .tempdir_in(&root)?;
                stage_files(staging.path(), &files)?;
                if let Err(e) = staging.close() {
                    warn!(error = %e, "Failed to remove staged archive files");
                }
                Ok((bytes, entries))
            })
            .await??;

        info!(entries, bytes = bytes.len(), "Built archive and cleared buckets");
        Ok(bytes)
    }
}

/// Regular files in `dir`, sorted by name.
fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Moves `files` into `staging`. On failure every file already moved is
/// put back before the error is returned.
fn stage_files(staging: &Path, files: &[PathBuf]) -> std::io::Result<()> {
    let mut moved: Vec<(&PathBuf, PathBuf)> = Vec::with_capacity(files.len());

    for (index, file) in files.iter().enumerate() {
        let target = staging.join(index.to_string());
        if let Err(e) = std::fs::rename(file, &target) {
            for (original, staged) in moved.iter().rev() {
                if let Err(restore) = std::fs::rename(staged, original) {
                    error!(
                        file = %original.display(),
                        error = %restore,
                        "Failed to restore file after aborted clear"
                    );
                }
            }
            return Err(e);
        }
        moved.push((file, target));
    }
    Ok(())
}

fn build_archive(groups: &[(&str, Vec<PathBuf>)]) -> Result<Vec<u8>, StoreError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (group, files) in groups {
        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            writer.start_file(format!("{}/{}", group, name.to_string_lossy()), options)?;
            writer.write_all(&std::fs::read(file)?)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

/// Base name of an uploaded filename, with any client-side path dropped.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        "upload.pdf".to_string()
    } else {
        base.to_string()
    }
}

/// `name`, or `stem-N.ext` for the first N that is not taken in `dir`.
fn unique_name(dir: &Path, name: &str) -> String {
    if !dir.join(name).exists() {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    (1..)
        .map(|n| match &extension {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        })
        .find(|candidate| !dir.join(candidate).exists())
        .unwrap_or_else(|| name.to_string())
}
