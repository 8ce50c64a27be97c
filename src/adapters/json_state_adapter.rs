//! JSON file state adapter.
//!
//! One `{key}.json` file per key under a state directory. Saves go through a
//! temp file and an atomic rename so a crash mid-write can never leave a
//! truncated record. Missing and unparsable files both load as `None`;
//! callers fall back to their defaults.

use crate::domain::error::OptionPilotError;
use crate::ports::state_port::StatePort;
use std::fs;
use std::path::PathBuf;

pub struct JsonStateAdapter {
    base_path: PathBuf,
}

impl JsonStateAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json.tmp", key))
    }
}

impl StatePort for JsonStateAdapter {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, OptionPilotError> {
        let path = self.key_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            // Unparsable file: reinitialize to defaults rather than failing.
            Err(_) => Ok(None),
        }
    }

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), OptionPilotError> {
        fs::create_dir_all(&self.base_path)?;
        let serialized =
            serde_json::to_string_pretty(value).map_err(|e| OptionPilotError::PersistenceCorrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let temp = self.temp_path(key);
        fs::write(&temp, serialized)?;
        fs::rename(&temp, self.key_path(key))?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), OptionPilotError> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
