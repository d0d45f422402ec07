use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TikbatchError};

pub const KEY_OUTPUT_DIR: &str = "output_dir";
pub const KEY_CAPTION_FONT: &str = "caption_font";

/// Key-value settings persisted between runs. The orchestrator core never
/// touches this directly; the CLI reads and writes through it.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Write `value` only when the key has never been set. Used for the
    /// one-time default-output-directory initialization at startup.
    fn ensure(&mut self, key: &str, value: &str) -> Result<()> {
        if self.get(key).is_none() {
            self.set(key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(flatten)]
    values: BTreeMap<String, String>,
}

/// TOML-file-backed settings store, written through on every `set`.
pub struct TomlSettingsStore {
    path: PathBuf,
    file: SettingsFile,
}

impl TomlSettingsStore {
    /// Open the store at `path`, creating parent directories as needed. A
    /// missing file is an empty store; it is created on first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = if path.is_file() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                TikbatchError::Settings(format!("Failed to read settings file: {}", e))
            })?;
            toml::from_str(&content).map_err(|e| {
                TikbatchError::Settings(format!("Failed to parse settings file: {}", e))
            })?
        } else {
            SettingsFile::default()
        };

        Ok(Self { path, file })
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TikbatchError::Settings(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(&self.file).map_err(|e| {
            TikbatchError::Settings(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(&self.path, content).map_err(|e| {
            TikbatchError::Settings(format!("Failed to write settings file: {}", e))
        })
    }
}

impl SettingsStore for TomlSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.file.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.file.values.insert(key.to_string(), value.to_string());
        self.persist()
    }
}

/// Volatile store for tests and embedders that bring their own storage.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: BTreeMap<String, String>,
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_writes_only_once() {
        let mut store = MemorySettingsStore::default();
        store.ensure(KEY_OUTPUT_DIR, "/first").unwrap();
        store.ensure(KEY_OUTPUT_DIR, "/second").unwrap();
        assert_eq!(store.get(KEY_OUTPUT_DIR).as_deref(), Some("/first"));
    }

    #[test]
    fn test_toml_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        {
            let mut store = TomlSettingsStore::open(&path).unwrap();
            assert_eq!(store.get(KEY_CAPTION_FONT), None);
            store.set(KEY_CAPTION_FONT, "Impact").unwrap();
        }

        let reopened = TomlSettingsStore::open(&path).unwrap();
        assert_eq!(reopened.get(KEY_CAPTION_FONT).as_deref(), Some("Impact"));
    }

    #[test]
    fn test_missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlSettingsStore::open(dir.path().join("none.toml")).unwrap();
        assert_eq!(store.get(KEY_OUTPUT_DIR), None);
    }
}
