use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn, RunLogger};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::filename::deterministic_filename;
use crate::RepoRecord;

pub const MANIFEST_FILENAME: &str = "manifest.json";
const IMAGE_EXTENSION: &str = "jpg";
// Stored sets are read by other processes; temp files default to owner-only.
const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("duplicate record for {0}")]
    Duplicate(String),
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Stored form of one record; the image lives next to the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub description: String,
    pub stars: u64,
    pub url: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_utc: String,
    pub record_count: usize,
    pub records: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSummary {
    pub record_count: usize,
    pub image_bytes: u64,
    pub location: PathBuf,
}

/// Destination for a run's records.
pub trait RecordSink: Send + Sync {
    /// Replace everything previously stored with `records`, atomically:
    /// afterwards either the old set or the complete new set is visible.
    fn replace_all(
        &self,
        records: &[RepoRecord],
        generated_utc: &str,
    ) -> Result<SinkSummary, PersistError>;
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        set_mode(tmp.path(), FILE_MODE)?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Stores records as `{name}--{hash}.jpg` files plus `manifest.json` in one directory.
///
/// A run is written into a staging directory beside the target and swapped
/// in with renames, so readers never see a half-written set.
pub struct DirectorySink {
    dir: PathBuf,
    logger: RunLogger,
}

impl DirectorySink {
    pub fn new(dir: PathBuf, logger: RunLogger) -> Self {
        Self { dir, logger }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn parent_dir(&self) -> PathBuf {
        match self.dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn backup_dir(&self) -> PathBuf {
        let name = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "starcard".to_string());
        self.parent_dir().join(format!(".{name}.previous"))
    }

    fn write_staging(
        &self,
        staging: &Path,
        records: &[RepoRecord],
        generated_utc: &str,
    ) -> Result<SinkSummary, PersistError> {
        let writer = AtomicFileWriter::new(staging.to_path_buf());
        let mut entries = Vec::with_capacity(records.len());
        let mut image_bytes = 0u64;
        for record in records {
            let image = deterministic_filename(record.name(), record.url().as_str(), IMAGE_EXTENSION);
            writer.write(&image, record.image())?;
            image_bytes += record.image().len() as u64;
            entries.push(ManifestEntry {
                name: record.name().to_string(),
                description: record.description().to_string(),
                stars: record.stars(),
                url: record.url().to_string(),
                image,
            });
        }

        let manifest = Manifest {
            generated_utc: generated_utc.to_string(),
            record_count: entries.len(),
            records: entries,
        };
        writer.write(MANIFEST_FILENAME, &serde_json::to_vec_pretty(&manifest)?)?;

        Ok(SinkSummary {
            record_count: manifest.record_count,
            image_bytes,
            location: self.dir.clone(),
        })
    }

    /// Settles a backup left behind by an interrupted swap.
    ///
    /// Without a target the backup is the only copy of the previous set and
    /// is moved back. Beside a real target directory it is stale and removed.
    /// Beside anything else it is left alone.
    fn recover_interrupted_swap(&self) -> Result<(), PersistError> {
        let backup = self.backup_dir();
        if !path_present(&backup)? {
            return Ok(());
        }
        match existing_metadata(&self.dir)? {
            None => {
                engine_warn!(
                    self.logger,
                    "Restoring previous records from interrupted swap {}",
                    backup.display()
                );
                fs::rename(&backup, &self.dir)?;
            }
            Some(meta) if meta.is_dir() => fs::remove_dir_all(&backup)?,
            Some(_) => {}
        }
        Ok(())
    }

    fn swap_into_place(&self, staging: &Path) -> Result<(), PersistError> {
        let backup = self.backup_dir();
        let had_previous = path_present(&self.dir)?;
        if had_previous {
            fs::rename(&self.dir, &backup)?;
        }
        if let Err(err) = fs::rename(staging, &self.dir) {
            if had_previous {
                if let Err(restore) = fs::rename(&backup, &self.dir) {
                    engine_warn!(
                        self.logger,
                        "Failed to restore previous records from {}: {}",
                        backup.display(),
                        restore
                    );
                }
            }
            return Err(err.into());
        }
        if had_previous {
            if let Err(err) = fs::remove_dir_all(&backup) {
                engine_warn!(
                    self.logger,
                    "Failed to remove previous records at {}: {}",
                    backup.display(),
                    err
                );
            }
        }
        Ok(())
    }
}

impl RecordSink for DirectorySink {
    fn replace_all(
        &self,
        records: &[RepoRecord],
        generated_utc: &str,
    ) -> Result<SinkSummary, PersistError> {
        let parent = self.parent_dir();
        ensure_output_dir(&parent)?;
        self.recover_interrupted_swap()?;
        // A symlink at the target counts as "not a directory", dangling or not.
        if let Some(meta) = existing_metadata(&self.dir)? {
            if !meta.is_dir() {
                return Err(PersistError::OutputDir(format!(
                    "{} is not a directory",
                    self.dir.display()
                )));
            }
        }

        let mut seen = HashSet::with_capacity(records.len());
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.url().as_str())) {
            return Err(PersistError::Duplicate(dup.url().to_string()));
        }

        let staging = tempfile::Builder::new()
            .prefix(".starcard-staging-")
            .tempdir_in(&parent)?;
        set_mode(staging.path(), DIR_MODE)?;

        // On error the staging TempDir is dropped and removed; the old set stays.
        let summary = self.write_staging(staging.path(), records, generated_utc)?;
        self.swap_into_place(staging.path())?;

        engine_info!(
            self.logger,
            "Stored {} records ({} image bytes) in {}",
            summary.record_count,
            summary.image_bytes,
            self.dir.display()
        );
        Ok(summary)
    }
}

/// Metadata of `path` itself, not of a symlink target; `None` when absent.
fn existing_metadata(path: &Path) -> io::Result<Option<fs::Metadata>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn path_present(path: &Path) -> io::Result<bool> {
    Ok(existing_metadata(path)?.is_some())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Read back the manifest of a directory written by [`DirectorySink`].
pub fn read_manifest(dir: &Path) -> Result<Manifest, PersistError> {
    let raw = fs::read(dir.join(MANIFEST_FILENAME))?;
    Ok(serde_json::from_slice(&raw)?)
}
