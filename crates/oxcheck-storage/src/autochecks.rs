use crate::error::{Result, StorageError};
use crate::{validate_host_name, AutocheckStore};
use oxcheck_common::types::AutocheckEntry;
use std::io::Write;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Autochecks as `<dir>/<host>.json`.
///
/// Writes go to a temporary file in the same directory, are synced, and then
/// renamed over the previous file. An interrupted write leaves at most a
/// stray hidden temp file behind, which readers never look at and the next
/// [`FileAutocheckStore::new`] on the directory deletes.
pub struct FileAutocheckStore {
    dir: PathBuf,
}

impl FileAutocheckStore {
    /// Opens the store, creating `dir` if needed and deleting temp files
    /// left over from interrupted writes.
    ///
    /// The directory must not be shared with another running store.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let store = Self {
            dir: dir.to_path_buf(),
        };
        store.remove_stale_temp_files()?;
        Ok(store)
    }

    fn remove_stale_temp_files(&self) -> Result<()> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !(name.starts_with('.') && name.ends_with(TEMP_SUFFIX)) || !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale temp file")
                }
            }
        }
        if removed > 0 {
            tracing::info!(dir = %self.dir.display(), removed, "Stale autocheck temp files removed");
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, host: &str) -> PathBuf {
        self.dir.join(format!("{host}.{EXTENSION}"))
    }
}

impl AutocheckStore for FileAutocheckStore {
    fn read(&self, host: &str) -> Result<Vec<AutocheckEntry>> {
        validate_host_name(host)?;
        let path = self.path_for(host);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|source| StorageError::CorruptAutochecks {
            host: host.to_string(),
            source,
        })
    }

    fn write(&self, host: &str, entries: &[AutocheckEntry]) -> Result<()> {
        validate_host_name(host)?;
        let mut content = serde_json::to_vec_pretty(entries)?;
        content.push(b'\n');

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{host}."))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(host)).map_err(|e| e.error)?;

        tracing::debug!(host, entries = entries.len(), "Autochecks written");
        Ok(())
    }

    fn remove(&self, host: &str) -> Result<()> {
        validate_host_name(host)?;
        match std::fs::remove_file(self.path_for(host)) {
            Ok(()) => {
                tracing::info!(host, "Autochecks removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn hosts(&self) -> Result<Vec<String>> {
        let mut hosts = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    hosts.push(stem.to_string());
                }
            }
        }
        hosts.sort();
        Ok(hosts)
    }
}
