//! Pipeline orchestrator: ties extraction → resolution → enrichment →
//! storage together, one filer directory at a time.
//!
//! ## Run modes
//!
//! `run_extraction()` — per-document flow. A PDF with an existing JSON
//!   sibling is skipped, so re-runs are no-ops for processed documents.
//!   Failures are isolated: a malformed document or row never stops the
//!   batch.
//!
//! `run_positions()` — folds all persisted documents of each filer into the
//!   per-ISIN ledger file. Run after extraction.

use crate::config::AppConfig;
use crate::enrich::Enricher;
use crate::extract::{self, document::PdfDocument};
use crate::models::DocumentSummary;
use crate::positions;
use crate::resolve::cache::TickerCache;
use crate::resolve::yahoo::YahooClient;
use crate::resolve::InstrumentResolver;
use crate::storage;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub records_extracted: usize,
    pub rows_skipped: usize,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Extract, resolve and enrich every unprocessed PDF. `filer` limits the
    /// run to one directory; `None` walks all of them.
    pub async fn run_extraction(&self, filer: Option<&str>) -> Result<PipelineStats> {
        let yahoo = Arc::new(
            YahooClient::new(&self.config.resolver).context("Failed to build Yahoo client")?,
        );
        let cache = TickerCache::load(&self.config.resolver.cache_path)?;
        let mut resolver = InstrumentResolver::new(yahoo.clone(), yahoo.clone(), cache);
        let enricher = Enricher::new(yahoo);

        let mut stats = PipelineStats::default();

        for dir in self.filer_dirs(filer)? {
            info!("=== Processing filer {:?} ===", dir.file_name().unwrap_or_default());

            let mut pdfs: Vec<PathBuf> = std::fs::read_dir(&dir)
                .with_context(|| format!("Could not list {:?}", dir))?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().map(|e| e == "pdf").unwrap_or(false))
                .collect();
            pdfs.sort();

            for pdf_path in pdfs {
                let json_path = pdf_path.with_extension("json");
                if json_path.exists() {
                    stats.documents_skipped += 1;
                    continue;
                }

                let doc = match PdfDocument::open(&pdf_path) {
                    Ok(doc) => doc,
                    Err(e) => {
                        warn!("Malformed document {:?}: {:#}", pdf_path, e);
                        stats.documents_skipped += 1;
                        if self.config.storage.delete_corrupt {
                            if let Err(e) = std::fs::remove_file(&pdf_path) {
                                warn!("Could not delete {:?}: {:#}", pdf_path, e);
                            }
                        }
                        continue;
                    }
                };

                let extraction = match extract::extract_document(&doc, &self.config.markers) {
                    Ok(ex) => ex,
                    Err(e) => {
                        warn!("Extraction failed for {:?}: {}", pdf_path, e);
                        stats.documents_skipped += 1;
                        continue;
                    }
                };
                stats.rows_skipped += extraction.rows_skipped;

                let mut records = Vec::with_capacity(extraction.records.len());
                for raw in extraction.records {
                    let (ticker, isin) = resolver.resolve(&raw.company).await;
                    records.push(enricher.enrich(raw, &ticker, &isin).await);
                }

                let n = records.len();
                let summary = DocumentSummary::from_records(records);
                storage::write_document(&json_path, &summary)?;

                info!("{:?}: {} records", pdf_path.file_name().unwrap_or_default(), n);
                stats.records_extracted += n;
                stats.documents_processed += 1;
            }
        }

        info!(
            "=== Done: {} documents | {} skipped | {} records | {} bad rows ===",
            stats.documents_processed,
            stats.documents_skipped,
            stats.records_extracted,
            stats.rows_skipped,
        );

        Ok(stats)
    }

    /// Rebuild the position ledger for each filer from its persisted
    /// documents.
    pub async fn run_positions(&self, filer: Option<&str>) -> Result<usize> {
        let mut instruments = 0usize;

        for dir in self.filer_dirs(filer)? {
            match positions::aggregate_filer(&dir, &self.config.storage.ledger_filename) {
                Ok(n) => instruments += n,
                Err(e) => warn!("Aggregation failed for {:?}: {:#}", dir, e),
            }
        }

        Ok(instruments)
    }

    fn filer_dirs(&self, filer: Option<&str>) -> Result<Vec<PathBuf>> {
        let data_dir = &self.config.storage.data_dir;

        if let Some(name) = filer {
            let dir = data_dir.join(name);
            if !dir.is_dir() {
                anyhow::bail!("No data directory for filer {:?} at {:?}", name, dir);
            }
            return Ok(vec![dir]);
        }

        if !data_dir.exists() {
            return Ok(vec![]);
        }

        let mut dirs: Vec<PathBuf> = std::fs::read_dir(data_dir)
            .with_context(|| format!("Could not list {:?}", data_dir))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn temp_config(data_dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.data_dir = data_dir.to_path_buf();
        config.resolver.cache_path = data_dir.join("ticker_cache.json");
        config
    }

    #[tokio::test]
    async fn test_processed_documents_are_skipped_on_rerun() {
        let root = std::env::temp_dir().join(format!("ptr_pipeline_skip_{}", std::process::id()));
        let filer_dir = root.join("Doe");
        fs::create_dir_all(&filer_dir).unwrap();

        // a PDF with a JSON sibling counts as already processed; it must be
        // skipped before the document is even opened
        fs::write(filer_dir.join("Jane_Doe_1_1_2024.pdf"), b"not even a pdf").unwrap();
        let json_path = filer_dir.join("Jane_Doe_1_1_2024.json");
        let original = "{\"Amount purchased\": \"0 - 0\", \"Amount sold\": \"0 - 0\"}";
        fs::write(&json_path, original).unwrap();

        let pipeline = Pipeline::new(temp_config(&root));
        let stats = pipeline.run_extraction(Some("Doe")).await.unwrap();

        assert_eq!(stats.documents_skipped, 1);
        assert_eq!(stats.documents_processed, 0);
        assert_eq!(stats.records_extracted, 0);
        // the existing document was not rewritten
        assert_eq!(fs::read_to_string(&json_path).unwrap(), original);

        fs::remove_dir_all(&root).unwrap();
    }
}
