//! Bulk retrieval of disclosure filings.
//!
//! The clerk publishes a yearly ZIP with a tab-separated index of all
//! filings; each row references a PDF by document id. We pull the index in
//! memory, filter by filer, and download the PDFs into one directory per
//! filer.

pub mod http;

use anyhow::{Context, Result};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::FetchConfig;

use self::http::HttpClient;

// Index columns (tab-separated, after the header row)
const COL_LAST_NAME: usize = 1;
const COL_FIRST_NAME: usize = 2;
const COL_FILING_DATE: usize = 7;
const COL_DOC_ID: usize = 8;

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub last_name: String,
    pub first_name: String,
    pub filing_date: String,
    pub doc_id: String,
}

impl IndexEntry {
    /// `<first>_<last>_<date>` with slashes made path-safe.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}",
            self.first_name,
            self.last_name,
            self.filing_date.replace('/', "_")
        )
    }
}

#[derive(Debug, Default)]
pub struct FetchStats {
    pub filings_found: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub errors: usize,
}

pub struct Fetcher {
    client: HttpClient,
    config: FetchConfig,
    data_dir: PathBuf,
}

impl Fetcher {
    pub fn new(config: &FetchConfig, data_dir: &Path) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            config: config.clone(),
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Download the yearly index and every matching filing PDF.
    /// `filer` is a last name, or "all" for everyone.
    pub async fn fetch_year(&self, year: u16, filer: &str) -> Result<FetchStats> {
        let index_url = self.config.index_url.replace("{year}", &year.to_string());
        info!("Fetching index {}", index_url);

        let archive = self
            .client
            .get_bytes(&index_url)
            .await
            .context("Index archive download failed")?;

        let index_text = read_index_from_zip(&archive, year)?;
        let entries = parse_index(&index_text, filer)?;

        let mut stats = FetchStats {
            filings_found: entries.len(),
            ..Default::default()
        };
        info!("{} filings for {:?} in {}", entries.len(), filer, year);

        for entry in &entries {
            let dir = self.data_dir.join(&entry.last_name);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Could not create dir {:?}", dir))?;

            let pdf_path = dir.join(format!("{}.pdf", entry.file_stem()));
            if pdf_path.exists() {
                debug!("{:?} already present", pdf_path);
                stats.already_present += 1;
                continue;
            }

            let url = format!(
                "{}/{}/{}.pdf",
                self.config.pdf_base_url, year, entry.doc_id
            );
            match self.client.get_bytes(&url).await {
                Ok(bytes) => {
                    std::fs::write(&pdf_path, bytes)
                        .with_context(|| format!("Could not write {:?}", pdf_path))?;
                    info!("Downloaded {:?}", pdf_path);
                    stats.downloaded += 1;
                }
                Err(e) => {
                    warn!("Download failed for doc {}: {:#}", entry.doc_id, e);
                    stats.errors += 1;
                }
            }
        }

        Ok(stats)
    }
}

/// Pull `{year}FD.txt` out of the index archive without touching disk.
fn read_index_from_zip(archive: &[u8], year: u16) -> Result<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .context("Index archive is not a valid ZIP")?;

    let name = format!("{}FD.txt", year);
    let mut file = zip
        .by_name(&name)
        .with_context(|| format!("{} missing from index archive", name))?;

    let mut text = String::new();
    file.read_to_string(&mut text)
        .with_context(|| format!("{} is not valid UTF-8", name))?;
    Ok(text)
}

/// Parse the tab-separated index, keeping rows for the requested filer.
fn parse_index(text: &str, filer: &str) -> Result<Vec<IndexEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut entries = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Index row {}: {}", i + 1, e);
                continue;
            }
        };

        let last_name = record.get(COL_LAST_NAME).unwrap_or_default().trim();
        if filer != "all" && last_name != filer {
            continue;
        }

        let doc_id = record.get(COL_DOC_ID).unwrap_or_default().trim();
        if doc_id.is_empty() {
            continue;
        }

        entries.push(IndexEntry {
            last_name: last_name.to_string(),
            first_name: record
                .get(COL_FIRST_NAME)
                .unwrap_or_default()
                .trim()
                .to_string(),
            filing_date: record
                .get(COL_FILING_DATE)
                .unwrap_or_default()
                .trim()
                .to_string(),
            doc_id: doc_id.to_string(),
        });
    }

    Ok(entries)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
