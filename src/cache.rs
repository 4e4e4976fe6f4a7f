use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::canonical::Grammar;

/// Previously computed ids, keyed by binary name and guarded by the MD5 of the
/// class bytes they were computed from.
#[derive(Debug, Serialize, Deserialize)]
pub struct Cache {
    pub version: String,
    pub grammar: Grammar,
    pub generated_at: DateTime<Utc>,
    pub entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source: String,
    pub hash: String,
    pub uid: i64,
}

impl Cache {
    pub fn new(grammar: Grammar) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            grammar,
            generated_at: Utc::now(),
            entries: HashMap::new(),
        }
    }

    pub fn load(path: &Path, grammar: Grammar) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new(grammar));
        }
        let content = std::fs::read_to_string(path)?;
        let cache = Self::from_json(&content)?;

        // Ids from another tool version or grammar are not comparable
        if cache.version != env!("CARGO_PKG_VERSION") || cache.grammar != grammar {
            return Ok(Self::new(grammar));
        }

        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let cache: Cache = serde_json::from_str(json)?;
        Ok(cache)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json)
    }

    pub fn get_entry(&self, binary_name: &str) -> Option<&CacheEntry> {
        self.entries.get(binary_name)
    }

    pub fn set_entry(&mut self, binary_name: &str, source: &str, hash: &str, uid: i64) {
        self.entries.insert(
            binary_name.to_string(),
            CacheEntry {
                source: source.to_string(),
                hash: hash.to_string(),
                uid,
            },
        );
    }

    /// Cached id for `binary_name`, if it was computed from bytes with this fingerprint.
    pub fn lookup(&self, binary_name: &str, current_hash: &str) -> Option<i64> {
        self.entries
            .get(binary_name)
            .filter(|e| e.hash == current_hash)
            .map(|e| e.uid)
    }

    /// Source path -> binary name, for resolving a file before parsing it.
    pub fn source_index(&self) -> HashMap<&str, &str> {
        self.entries
            .iter()
            .map(|(name, e)| (e.source.as_str(), name.as_str()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generated_at = Utc::now();
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(Grammar::default())
    }
}

/// Hex MD5 of a class file, used to detect unchanged artifacts.
pub fn fingerprint(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
