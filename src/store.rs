use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::BetterPromptError;

/// Flat string-keyed storage backing the settings store.
///
/// `set` only stages a value; `flush` makes staged values durable. Backends
/// with nothing to persist implement `flush` as a no-op.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn flush(&mut self) -> Result<(), BetterPromptError>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value);
    }

    fn flush(&mut self) -> Result<(), BetterPromptError> {
        Ok(())
    }
}

/// Store persisted as a single JSON object of string values.
///
/// `BTreeMap` keeps keys in deterministic order on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store. A file that is not a JSON object
    /// of strings is ignored with a warning and also yields an empty store;
    /// the next flush overwrites it. Other I/O errors (e.g. permission denied)
    /// are returned.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BetterPromptError> {
        let path = path.into();

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    entries: BTreeMap::new(),
                });
            }
            Err(e) => {
                return Err(BetterPromptError::SettingsReadFailed {
                    path,
                    detail: e.to_string(),
                });
            }
        };

        let entries = match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    err = %e,
                    "ignoring invalid settings file"
                );
                BTreeMap::new()
            }
        };

        Ok(Self { path, entries })
    }

    /// Like [`FileStore::open`], but an unreadable file is logged and treated
    /// as empty. Loading settings never fails.
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(err = %e, "starting with empty settings");
                Self {
                    path,
                    entries: BTreeMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value);
    }

    /// Write all entries to disk.
    ///
    /// Creates the parent directory if needed. Writes a temporary file next to
    /// the target and renames it into place; falls back to a direct write if
    /// the rename fails (e.g. cross-device).
    fn flush(&mut self) -> Result<(), BetterPromptError> {
        let path = self.path.clone();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    BetterPromptError::SettingsWriteFailed {
                        path: parent.to_path_buf(),
                        detail: format!("failed to create directory: {e}"),
                    }
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            BetterPromptError::SettingsWriteFailed {
                path: path.clone(),
                detail: format!("serialization failed: {e}"),
            }
        })?;

        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        let write_tmp = || -> Result<(), BetterPromptError> {
            let to_err = |e: std::io::Error| BetterPromptError::SettingsWriteFailed {
                path: tmp_path.clone(),
                detail: e.to_string(),
            };
            let mut f = fs::File::create(&tmp_path).map_err(to_err)?;
            f.write_all(json.as_bytes()).map_err(to_err)?;
            f.flush().map_err(to_err)?;
            Ok(())
        };
        write_tmp()?;

        if fs::rename(&tmp_path, &path).is_err() {
            fs::write(&path, &json).map_err(|e| BetterPromptError::SettingsWriteFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
            let _ = fs::remove_file(&tmp_path);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_get_set() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("k", "v".into());
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn open_invalid_json_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not valid json {{{").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("betterprompt_geminiApiKey"), None);
    }

    #[test]
    fn open_non_string_values_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"betterprompt_temperature": 0.5}"#).unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("betterprompt_temperature"), None);
    }

    #[test]
    fn open_or_empty_tolerates_directory_in_place_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open_or_empty(dir.path());
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn flush_then_open_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set("a", "1".into());
        store.set("b", "two".into());
        store.flush().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened, store);
    }

    #[test]
    fn flush_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("settings.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set("k", "v".into());
        store.flush().unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("a").join("b").join("settings.json.tmp").exists());
    }

    #[test]
    fn flush_overwrites_previous_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set("k", "old".into());
        store.flush().unwrap();
        store.set("k", "new".into());
        store.flush().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).expect("valid JSON");
        assert_eq!(parsed.get("k").map(String::as_str), Some("new"));
    }
}
