//! Record Enricher: classify the free-text description, pull out option
//! parameters, and attach a historical reference price.

use std::sync::{Arc, LazyLock};

use chrono::{Days, NaiveDate};
use regex::Regex;
use tracing::warn;

use crate::extract::RawRecord;
use crate::models::{
    Description, InstrumentKind, OptionDetails, TransactionRecord, UNRESOLVED,
};
use crate::resolve::PriceHistoryService;

// Ordered classification table; first match wins.
static CLASSIFIERS: LazyLock<Vec<(Regex, InstrumentKind)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?i)call option").unwrap(), InstrumentKind::CallOption),
        (Regex::new(r"(?i)put option").unwrap(), InstrumentKind::PutOption),
        (Regex::new(r"(?i)shares|stocks").unwrap(), InstrumentKind::Stock),
        (Regex::new(r"(?i)bond").unwrap(), InstrumentKind::Bond),
    ]
});

static STRIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)strike price of \$([\d,]+(?:\.\d+)?)").unwrap());

static EXPIRATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)expiration date of (\d{1,2}/\d{1,2}/\d{2,4})").unwrap());

static SHARE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:purchased|sold)\s+([\d,]+)\s+shares").unwrap());

pub fn classify(description: &str) -> InstrumentKind {
    for (re, kind) in CLASSIFIERS.iter() {
        if re.is_match(description) {
            return *kind;
        }
    }
    InstrumentKind::Unknown
}

/// Strike and expiration from option descriptions. Both must parse; a
/// partial match leaves the details absent, which is not an error.
pub fn option_details(description: &str) -> Option<OptionDetails> {
    let strike = STRIKE
        .captures(description)
        .and_then(|c| c[1].replace(',', "").parse::<f64>().ok())?;

    let raw_date = EXPIRATION.captures(description).map(|c| c[1].to_string())?;
    let expiration_date = NaiveDate::parse_from_str(&raw_date, "%m/%d/%y")
        .or_else(|_| NaiveDate::parse_from_str(&raw_date, "%m/%d/%Y"))
        .ok()?;

    Some(OptionDetails { expiration_date, strike_price: strike })
}

/// Share count from "Purchased/Sold N shares" phrasing, when present.
pub fn parse_share_count(description: &str) -> Option<f64> {
    SHARE_COUNT
        .captures(description)
        .and_then(|c| c[1].replace(',', "").parse::<f64>().ok())
}

// ── Enricher ──────────────────────────────────────────────────────────────────

pub struct Enricher {
    prices: Arc<dyn PriceHistoryService>,
}

impl Enricher {
    pub fn new(prices: Arc<dyn PriceHistoryService>) -> Self {
        Self { prices }
    }

    /// Assemble the final record from the raw extraction plus resolved
    /// identifiers. Option details only apply to call/put classifications.
    pub async fn enrich(
        &self,
        raw: RawRecord,
        ticker: &str,
        isin: &str,
    ) -> TransactionRecord {
        let kind = classify(&raw.description);

        let details = match kind {
            InstrumentKind::CallOption | InstrumentKind::PutOption => {
                option_details(&raw.description)
            }
            _ => None,
        };

        let reference_price = self.reference_price(ticker, raw.date).await;

        TransactionRecord {
            company: raw.company,
            ticker: ticker.to_string(),
            isin: isin.to_string(),
            action: raw.action,
            date: raw.date,
            amount: raw.amount,
            description: Description {
                kind,
                original: raw.description,
                option_details: details,
            },
            reference_price,
        }
    }

    /// Mean of open and close on the transaction date, rounded to cents.
    /// Absent for unresolved tickers and non-trading days; never an error.
    async fn reference_price(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        if ticker == UNRESOLVED {
            return None;
        }

        let end = date.checked_add_days(Days::new(1))?;
        match self.prices.open_close(ticker, date, end).await {
            Ok(Some((open, close))) => Some(((open + close) / 2.0 * 100.0).round() / 100.0),
            Ok(None) => None,
            Err(e) => {
                warn!("Price history failed for {} on {}: {:#}", ticker, date, e);
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AmountRange, TradeAction};
    use anyhow::Result;
    use async_trait::async_trait;

    struct StubPrices {
        open_close: Option<(f64, f64)>,
        fail: bool,
    }

    #[async_trait]
    impl PriceHistoryService for StubPrices {
        async fn open_close(
            &self,
            _ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Option<(f64, f64)>> {
            if self.fail {
                return Err(anyhow::anyhow!("service down"));
            }
            Ok(self.open_close)
        }
    }

    #[test]
    fn test_classification_table_order() {
        assert_eq!(classify("purchased call options on AAPL"), InstrumentKind::CallOption);
        assert_eq!(classify("Put Options, 100 contracts"), InstrumentKind::PutOption);
        assert_eq!(classify("Purchased 100 shares"), InstrumentKind::Stock);
        assert_eq!(classify("common stocks"), InstrumentKind::Stock);
        assert_eq!(classify("municipal bond ladder"), InstrumentKind::Bond);
        assert_eq!(classify("something else entirely"), InstrumentKind::Unknown);
        // call option wins over a shares mention later in the text
        assert_eq!(
            classify("call options covering 100 shares"),
            InstrumentKind::CallOption
        );
    }

    #[test]
    fn test_option_details_extraction() {
        let d = option_details(
            "call options with a strike price of $50 and an expiration date of 6/20/25",
        )
        .unwrap();
        assert_eq!(d.strike_price, 50.0);
        assert_eq!(d.expiration_date, NaiveDate::from_ymd_opt(2025, 6, 20).unwrap());
    }

    #[test]
    fn test_option_details_require_both_fields() {
        assert!(option_details("call options with a strike price of $50").is_none());
        assert!(option_details("expiration date of 6/20/25").is_none());
    }

    #[test]
    fn test_share_count_parsing() {
        assert_eq!(parse_share_count("Purchased 100 shares"), Some(100.0));
        assert_eq!(parse_share_count("sold 2,500 shares of common"), Some(2500.0));
        assert_eq!(parse_share_count("call options"), None);
    }

    fn raw() -> RawRecord {
        RawRecord {
            company: "Apple Inc".into(),
            action: TradeAction::Purchase,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            amount: AmountRange { low: 1001.0, high: 15000.0 },
            description: "Purchased 100 shares".into(),
        }
    }

    #[tokio::test]
    async fn test_enrich_attaches_reference_price() {
        let enricher = Enricher::new(Arc::new(StubPrices {
            open_close: Some((185.0, 186.5)),
            fail: false,
        }));
        let rec = enricher.enrich(raw(), "AAPL", "US0378331005").await;

        assert_eq!(rec.description.kind, InstrumentKind::Stock);
        assert_eq!(rec.reference_price, Some(185.75));
    }

    #[tokio::test]
    async fn test_no_price_for_unresolved_ticker() {
        let enricher = Enricher::new(Arc::new(StubPrices {
            open_close: Some((185.0, 186.5)),
            fail: false,
        }));
        let rec = enricher.enrich(raw(), UNRESOLVED, UNRESOLVED).await;
        assert_eq!(rec.reference_price, None);
    }

    #[tokio::test]
    async fn test_price_service_failure_degrades_to_absent() {
        let enricher = Enricher::new(Arc::new(StubPrices { open_close: None, fail: true }));
        let rec = enricher.enrich(raw(), "AAPL", UNRESOLVED).await;
        assert_eq!(rec.reference_price, None);
    }
}
