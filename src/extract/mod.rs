//! Document → structured-record extraction.
//!
//! The disclosure PDFs have no stable schema: the rendering layer flattens
//! the transaction table into a plain sequence of text lines. Extraction is
//! staged as lines → row groups → normalized records, with each stage
//! isolated so one malformed row never kills the document.

pub mod document;
pub mod lines;
pub mod normalize;
pub mod segment;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::config::MarkerConfig;
use crate::models::{AmountRange, TradeAction};

use self::document::DocumentSource;

// ── Error taxonomy ────────────────────────────────────────────────────────────

/// Structural parse failures. Fatal for the affected record or document,
/// never for the whole batch.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("table start marker {0:?} not found on any page")]
    MarkerNotFound(String),

    #[error("category sentinel {0:?} not found in extracted region")]
    CategorySentinelNotFound(String),

    #[error("no action code found in row starting with {0:?}")]
    NoActionCode(String),

    #[error("row too short to hold required fields: {0:?}")]
    TruncatedRow(Vec<String>),

    #[error("unparseable amount {0:?}")]
    BadAmount(String),

    #[error("unparseable date {0:?}")]
    BadDate(String),
}

// ── Raw record ────────────────────────────────────────────────────────────────

/// Extraction output before instrument resolution and enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub company: String,
    pub action: TradeAction,
    pub date: NaiveDate,
    pub amount: AmountRange,
    pub description: String,
}

/// Outcome of extracting one document: parsed records plus the count of rows
/// that failed structurally and were skipped.
#[derive(Debug)]
pub struct Extraction {
    pub records: Vec<RawRecord>,
    pub rows_skipped: usize,
}

/// Run the full extraction for one document.
pub fn extract_document(
    doc: &dyn DocumentSource,
    markers: &MarkerConfig,
) -> Result<Extraction, ExtractError> {
    let lines = lines::extract_table_lines(doc, markers)?;
    let groups = segment::segment_rows(&lines, &markers.category_sentinel)?;

    let mut records = Vec::new();
    let mut rows_skipped = 0usize;

    for group in &groups {
        match normalize::normalize_row(group).and_then(|buf| normalize::build_record(&buf)) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Skipping row {:?}: {}", group.first(), e);
                rows_skipped += 1;
            }
        }
    }

    Ok(Extraction { records, rows_skipped })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
