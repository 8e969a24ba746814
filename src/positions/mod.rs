//! Position Aggregator: fold all persisted documents of one filer into a
//! per-ISIN ledger.
//!
//! The fold is commutative per ISIN, so document enumeration order does not
//! matter; the final date-descending sort makes the output deterministic.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::enrich::parse_share_count;
use crate::models::{InstrumentKind, InstrumentPosition, PositionEntry, TransactionRecord};
use crate::storage;

/// Fold record sets into the ledger. Purchases add the range midpoint,
/// sales subtract it; exchanges are recorded with no value effect.
pub fn fold_documents<I>(documents: I) -> BTreeMap<String, InstrumentPosition>
where
    I: IntoIterator<Item = Vec<TransactionRecord>>,
{
    let mut ledger: BTreeMap<String, InstrumentPosition> = BTreeMap::new();

    for records in documents {
        for record in records {
            let position = ledger
                .entry(record.isin.clone())
                .or_insert_with(|| InstrumentPosition::new(&record.company));

            let midpoint = record.amount.midpoint();
            if record.action.is_purchase() {
                position.aggregated_value += midpoint;
            } else if record.action.is_sale() {
                position.aggregated_value -= midpoint;
            }

            let estimated = match (
                parse_share_count(&record.description.original),
                record.reference_price,
            ) {
                (Some(shares), Some(price)) => shares * price,
                _ => 0.0,
            };

            let entry = PositionEntry {
                date: record.date,
                amount: midpoint,
                description: record.description.original.clone(),
                action: record.action,
                reference_price: record.reference_price,
                estimated_real_position_size: estimated,
            };

            match record.description.kind {
                InstrumentKind::Stock => position.stocks.push(entry),
                InstrumentKind::CallOption | InstrumentKind::PutOption => {
                    position.options.push(entry)
                }
                _ => position.autres.push(entry),
            }
        }
    }

    sort_histories(&mut ledger);
    ledger
}

/// Most recent transactions first, in every bucket.
fn sort_histories(ledger: &mut BTreeMap<String, InstrumentPosition>) {
    for position in ledger.values_mut() {
        position.stocks.sort_by(|a, b| b.date.cmp(&a.date));
        position.options.sort_by(|a, b| b.date.cmp(&a.date));
        position.autres.sort_by(|a, b| b.date.cmp(&a.date));
    }
}

/// Aggregate every persisted document in a filer directory and write the
/// ledger. The ledger file itself is excluded from the scan; unreadable
/// documents are skipped, not fatal.
pub fn aggregate_filer(dir: &Path, ledger_filename: &str) -> Result<usize> {
    let mut documents = Vec::new();

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Could not list {:?}", dir))?
    {
        let path = entry?.path();
        let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
        let is_ledger = path
            .file_name()
            .map(|n| n == ledger_filename)
            .unwrap_or(false);

        if !path.is_file() || !is_json || is_ledger {
            continue;
        }

        match storage::read_document(&path) {
            Ok(records) => documents.push(records),
            Err(e) => warn!("Skipping {:?}: {:#}", path, e),
        }
    }

    let ledger = fold_documents(documents);
    let out = dir.join(ledger_filename);
    storage::write_ledger(&out, &ledger)?;

    info!("{:?}: ledger with {} instruments", dir, ledger.len());
    Ok(ledger.len())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
