use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::extract::ExtractError;

// ── Trade action ──────────────────────────────────────────────────────────────

/// Normalized transaction action. Raw disclosure codes are single letters
/// ("P", "S", "E"), optionally suffixed with "(partial)".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    #[serde(rename = "purchase")]
    Purchase,
    #[serde(rename = "sale")]
    Sale,
    #[serde(rename = "exchange")]
    Exchange,
    #[serde(rename = "purchase_partial")]
    PurchasePartial,
    #[serde(rename = "sale_partial")]
    SalePartial,
}

impl TradeAction {
    /// Parse a raw action code, case-insensitively. Filings use lowercase
    /// "s" occasionally.
    pub fn parse_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "p" => Some(Self::Purchase),
            "s" => Some(Self::Sale),
            "e" => Some(Self::Exchange),
            "p (partial)" => Some(Self::PurchasePartial),
            "s (partial)" => Some(Self::SalePartial),
            _ => None,
        }
    }

    pub fn is_purchase(self) -> bool {
        matches!(self, Self::Purchase | Self::PurchasePartial)
    }

    pub fn is_sale(self) -> bool {
        matches!(self, Self::Sale | Self::SalePartial)
    }
}

// ── Amount range ──────────────────────────────────────────────────────────────

/// Disclosed dollar range, e.g. "$1,001 - $15,000". A single "$X" collapses
/// to low == high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub low: f64,
    pub high: f64,
}

impl AmountRange {
    pub fn parse(text: &str) -> Result<Self, ExtractError> {
        let text = text.trim();
        if !text.contains('$') {
            return Err(ExtractError::BadAmount(text.to_string()));
        }

        let cleaned = text.replace('$', "").replace(',', "");
        let parts: Vec<&str> = cleaned
            .split('-')
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();

        let (low, high) = match parts.as_slice() {
            [single] => {
                let v = single
                    .parse::<f64>()
                    .map_err(|_| ExtractError::BadAmount(text.to_string()))?;
                (v, v)
            }
            [lo, hi] => {
                let lo = lo
                    .parse::<f64>()
                    .map_err(|_| ExtractError::BadAmount(text.to_string()))?;
                let hi = hi
                    .parse::<f64>()
                    .map_err(|_| ExtractError::BadAmount(text.to_string()))?;
                (lo, hi)
            }
            _ => return Err(ExtractError::BadAmount(text.to_string())),
        };

        if low > high {
            return Err(ExtractError::BadAmount(text.to_string()));
        }

        Ok(Self { low, high })
    }

    pub fn zero() -> Self {
        Self { low: 0.0, high: 0.0 }
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    pub fn add(&mut self, other: &AmountRange) {
        self.low += other.low;
        self.high += other.high;
    }

    /// "LOW - HIGH" summary form, integral amounts without a decimal point.
    pub fn summary_string(&self) -> String {
        format!("{} - {}", fmt_amount(self.low), fmt_amount(self.high))
    }
}

fn fmt_amount(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

// ── Instrument description ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentKind {
    #[serde(rename = "stock")]
    Stock,
    #[serde(rename = "call_option")]
    CallOption,
    #[serde(rename = "put_option")]
    PutOption,
    #[serde(rename = "bond")]
    Bond,
    #[serde(rename = "unknown")]
    Unknown,
}

impl InstrumentKind {
    /// Ledger bucket name for the position aggregator.
    pub fn ledger_bucket(self) -> &'static str {
        match self {
            Self::Stock => "stocks",
            Self::CallOption | Self::PutOption => "options",
            _ => "autres",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDetails {
    pub expiration_date: NaiveDate,
    pub strike_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "type")]
    pub kind: InstrumentKind,
    pub original: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub option_details: Option<OptionDetails>,
}

// ── Transaction record ────────────────────────────────────────────────────────

/// Canonical extracted record, one per detected transaction.
/// Ticker/ISIN use the sentinel "NA" when unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "ISIN")]
    pub isin: String,
    #[serde(rename = "Action")]
    pub action: TradeAction,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Amount")]
    pub amount: AmountRange,
    #[serde(rename = "Description")]
    pub description: Description,
    #[serde(
        rename = "ReferencePrice",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub reference_price: Option<f64>,
}

pub const UNRESOLVED: &str = "NA";

// ── Per-document summary ──────────────────────────────────────────────────────

/// All records of one document plus the summed purchased/sold ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSummary {
    pub records: Vec<TransactionRecord>,
    pub purchased: AmountRange,
    pub sold: AmountRange,
}

impl DocumentSummary {
    /// Derive the two summary aggregates from a record set. Low and high
    /// bounds are summed independently per action category.
    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        let mut purchased = AmountRange::zero();
        let mut sold = AmountRange::zero();

        for r in &records {
            if r.action.is_purchase() {
                purchased.add(&r.amount);
            } else if r.action.is_sale() {
                sold.add(&r.amount);
            }
        }

        Self { records, purchased, sold }
    }
}

// ── Position ledger ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub action: TradeAction,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reference_price: Option<f64>,
    pub estimated_real_position_size: f64,
}

/// One per-ISIN ledger line. The three history lists are sorted by date
/// descending once the fold over all documents completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentPosition {
    #[serde(rename = "Company")]
    pub company: String,
    pub aggregated_value: f64,
    pub stocks: Vec<PositionEntry>,
    pub options: Vec<PositionEntry>,
    pub autres: Vec<PositionEntry>,
}

impl InstrumentPosition {
    pub fn new(company: &str) -> Self {
        Self {
            company: company.to_string(),
            aggregated_value: 0.0,
            stocks: Vec::new(),
            options: Vec::new(),
            autres: Vec::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_codes() {
        assert_eq!(TradeAction::parse_code("P"), Some(TradeAction::Purchase));
        assert_eq!(TradeAction::parse_code("s"), Some(TradeAction::Sale));
        assert_eq!(TradeAction::parse_code("E"), Some(TradeAction::Exchange));
        assert_eq!(
            TradeAction::parse_code("S (partial)"),
            Some(TradeAction::SalePartial)
        );
        assert_eq!(
            TradeAction::parse_code("p (PARTIAL)"),
            Some(TradeAction::PurchasePartial)
        );
        assert_eq!(TradeAction::parse_code("SP"), None);
        assert_eq!(TradeAction::parse_code("Apple"), None);
    }

    #[test]
    fn test_parse_amount_range() {
        let r = AmountRange::parse("$1,001 - $15,000").unwrap();
        assert_eq!(r.low, 1001.0);
        assert_eq!(r.high, 15000.0);
        assert_eq!(r.midpoint(), 8000.5);
    }

    #[test]
    fn test_parse_amount_single_value_collapses() {
        let r = AmountRange::parse("$50,000").unwrap();
        assert_eq!(r.low, 50000.0);
        assert_eq!(r.high, 50000.0);
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(AmountRange::parse("1,001 - 15,000").is_err()); // no dollar sign
        assert!(AmountRange::parse("$abc").is_err());
        assert!(AmountRange::parse("$15,000 - $1,001").is_err()); // inverted
    }

    #[test]
    fn test_summary_string() {
        let r = AmountRange { low: 1001.0, high: 15000.0 };
        assert_eq!(r.summary_string(), "1001 - 15000");
    }

    #[test]
    fn test_document_summary_aggregates() {
        let rec = |action, low, high| TransactionRecord {
            company: "X".into(),
            ticker: UNRESOLVED.into(),
            isin: UNRESOLVED.into(),
            action,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            amount: AmountRange { low, high },
            description: Description {
                kind: InstrumentKind::Unknown,
                original: String::new(),
                option_details: None,
            },
            reference_price: None,
        };

        let summary = DocumentSummary::from_records(vec![
            rec(TradeAction::Purchase, 1001.0, 15000.0),
            rec(TradeAction::PurchasePartial, 1001.0, 15000.0),
            rec(TradeAction::Sale, 15001.0, 50000.0),
            rec(TradeAction::Exchange, 1001.0, 15000.0),
        ]);

        assert_eq!(summary.purchased.low, 2002.0);
        assert_eq!(summary.purchased.high, 30000.0);
        assert_eq!(summary.sold.low, 15001.0);
        assert_eq!(summary.sold.high, 50000.0);
    }
}
