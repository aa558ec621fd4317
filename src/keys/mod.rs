//! Local API key store
//!
//! A flat JSON object mapping a service name to its key. The key stored
//! under the sweep's backend name is handed to the benchmark tool.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default location of the store
pub const DEFAULT_KEY_STORE: &str = "config/api_keys.json";

/// Environment variable the benchmark tool reads its key from
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Service name to API key, persisted as pretty JSON
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeyStore {
    path: PathBuf,
    keys: BTreeMap<String, String>,
}

impl ApiKeyStore {
    /// Load the store; a missing file is an empty store
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let keys = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse key store {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read key store {}", path.display()))
            }
        };
        Ok(Self { path, keys })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the store, creating its directory if needed
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.keys)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write key store {}", self.path.display()))?;
        Ok(())
    }

    /// Insert or replace a key
    pub fn add(&mut self, service: impl Into<String>, key: impl Into<String>) {
        self.keys.insert(service.into(), key.into());
    }

    pub fn get(&self, service: &str) -> Option<&str> {
        self.keys.get(service).map(String::as_str)
    }

    /// Remove a key; returns whether it existed
    pub fn delete(&mut self, service: &str) -> bool {
        self.keys.remove(service).is_some()
    }

    /// `(service, masked key)` pairs, sorted by service
    pub fn masked(&self) -> Vec<(&str, String)> {
        self.keys
            .iter()
            .map(|(service, key)| (service.as_str(), mask(key)))
            .collect()
    }
}

/// First four and last four characters with stars between; short keys are
/// starred out entirely
pub fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}
