//! Persistent company-name → {ticker, isin} cache.
//!
//! Flat JSON object keyed by the exact company string. Loaded once when the
//! resolver is built, flushed after every mutation so an interrupted run
//! never loses resolved entries.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedInstrument {
    pub ticker: String,
    pub isin: String,
}

pub struct TickerCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CachedInstrument>,
}

impl TickerCache {
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read ticker cache {:?}", path))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Malformed ticker cache {:?}", path))?
        } else {
            BTreeMap::new()
        };

        info!("Ticker cache: {} entries from {:?}", entries.len(), path);
        Ok(Self { path: Some(path.to_path_buf()), entries })
    }

    /// Non-persistent cache for tests and dry runs.
    pub fn in_memory() -> Self {
        Self { path: None, entries: BTreeMap::new() }
    }

    pub fn get(&self, company: &str) -> Option<&CachedInstrument> {
        self.entries.get(company)
    }

    /// Insert and flush immediately (write-through).
    pub fn insert(&mut self, company: &str, entry: CachedInstrument) -> Result<()> {
        self.entries.insert(company.to_string(), entry);
        self.flush()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CachedInstrument)> {
        self.entries.iter()
    }

    fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json)
            .with_context(|| format!("Could not write ticker cache {:?}", path))?;
        Ok(())
    }
}
