//! Persistent record store: one JSON object per document, one ledger file
//! per filer.
//!
//! Document shape: keys "Transaction 1"… in insertion order, plus
//! "Amount purchased" / "Amount sold" summary strings. The aggregator reads
//! the same shape back, so both directions live here.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::models::{DocumentSummary, InstrumentPosition, TransactionRecord};

const KEY_PURCHASED: &str = "Amount purchased";
const KEY_SOLD: &str = "Amount sold";
const KEY_TRANSACTION: &str = "Transaction ";

// ── Document records ──────────────────────────────────────────────────────────

pub fn document_to_json(summary: &DocumentSummary) -> Result<Value> {
    let mut map = Map::new();

    for (i, record) in summary.records.iter().enumerate() {
        map.insert(
            format!("{}{}", KEY_TRANSACTION, i + 1),
            serde_json::to_value(record)?,
        );
    }
    map.insert(
        KEY_PURCHASED.to_string(),
        Value::String(summary.purchased.summary_string()),
    );
    map.insert(
        KEY_SOLD.to_string(),
        Value::String(summary.sold.summary_string()),
    );

    Ok(Value::Object(map))
}

pub fn write_document(path: &Path, summary: &DocumentSummary) -> Result<()> {
    let json = document_to_json(summary)?;
    std::fs::write(path, serde_json::to_string_pretty(&json)?)
        .with_context(|| format!("Could not write {:?}", path))?;
    debug!("Wrote {} records to {:?}", summary.records.len(), path);
    Ok(())
}

/// Parse a stored document back into its records. Summary keys are skipped;
/// they are derived data.
pub fn read_document(path: &Path) -> Result<Vec<TransactionRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {:?}", path))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed JSON in {:?}", path))?;

    let Value::Object(map) = value else {
        anyhow::bail!("{:?} is not a JSON object", path);
    };

    let mut records = Vec::new();
    for (key, value) in map {
        if !key.starts_with(KEY_TRANSACTION) {
            continue;
        }
        let record: TransactionRecord = serde_json::from_value(value)
            .with_context(|| format!("Bad record {:?} in {:?}", key, path))?;
        records.push(record);
    }
    Ok(records)
}

// ── Ledger ────────────────────────────────────────────────────────────────────

pub fn write_ledger(path: &Path, ledger: &BTreeMap<String, InstrumentPosition>) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(ledger)?)
        .with_context(|| format!("Could not write ledger {:?}", path))?;
    debug!("Wrote ledger with {} instruments to {:?}", ledger.len(), path);
    Ok(())
}

pub fn read_ledger(path: &Path) -> Result<BTreeMap<String, InstrumentPosition>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read ledger {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Malformed ledger {:?}", path))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AmountRange, Description, InstrumentKind, TradeAction, UNRESOLVED,
    };
    use chrono::NaiveDate;

    fn record(n: u32) -> TransactionRecord {
        TransactionRecord {
            company: format!("Company {}", n),
            ticker: UNRESOLVED.into(),
            isin: UNRESOLVED.into(),
            action: TradeAction::Purchase,
            date: NaiveDate::from_ymd_opt(2024, 1, n).unwrap(),
            amount: AmountRange { low: 1001.0, high: 15000.0 },
            description: Description {
                kind: InstrumentKind::Stock,
                original: "Purchased 100 shares".into(),
                option_details: None,
            },
            reference_price: None,
        }
    }

    #[test]
    fn test_transaction_keys_stay_in_insertion_order() {
        let records: Vec<TransactionRecord> = (1..=11).map(record).collect();
        let summary = DocumentSummary::from_records(records);
        let json = document_to_json(&summary).unwrap();

        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        // "Transaction 10"/"Transaction 11" must not sort before "Transaction 2"
        assert_eq!(keys[0], "Transaction 1");
        assert_eq!(keys[1], "Transaction 2");
        assert_eq!(keys[9], "Transaction 10");
        assert_eq!(keys[10], "Transaction 11");
        assert_eq!(keys[11], KEY_PURCHASED);
        assert_eq!(keys[12], KEY_SOLD);
    }

    #[test]
    fn test_summary_strings() {
        let summary = DocumentSummary::from_records(vec![record(1), record(2)]);
        let json = document_to_json(&summary).unwrap();
        assert_eq!(json[KEY_PURCHASED], "2002 - 30000");
        assert_eq!(json[KEY_SOLD], "0 - 0");
    }

    #[test]
    fn test_record_round_trip_through_json_value() {
        let summary = DocumentSummary::from_records(vec![record(1)]);
        let json = document_to_json(&summary).unwrap();

        let parsed: TransactionRecord =
            serde_json::from_value(json["Transaction 1"].clone()).unwrap();
        assert_eq!(parsed, summary.records[0]);
    }
}
