//! Instrument Resolver: free-text company name → (ticker, ISIN).
//!
//! Resolution never fails hard: every miss or service error degrades to the
//! "NA" sentinel so the pipeline keeps moving.

pub mod cache;
pub mod yahoo;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::UNRESOLVED;

use self::cache::{CachedInstrument, TickerCache};

// ── Service contracts ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub symbol: String,
    pub short_name: String,
    pub quote_type: String,
}

#[async_trait]
pub trait NameSearchService: Send + Sync {
    async fn search_by_name(&self, query: &str) -> Result<Vec<SearchHit>>;
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    /// ISIN for a resolved ticker. Err means the service failed or the field
    /// was absent from an otherwise successful response.
    async fn isin_for(&self, ticker: &str) -> Result<String>;
}

#[async_trait]
pub trait PriceHistoryService: Send + Sync {
    /// Open and close of the first trading day in [start, end), or None when
    /// the range holds no trading data (weekend, holiday, delisted symbol).
    async fn open_close(
        &self,
        ticker: &str,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<Option<(f64, f64)>>;
}

// ── Resolver ──────────────────────────────────────────────────────────────────

pub struct InstrumentResolver {
    search: Arc<dyn NameSearchService>,
    profile: Arc<dyn ProfileService>,
    cache: TickerCache,
}

impl InstrumentResolver {
    pub fn new(
        search: Arc<dyn NameSearchService>,
        profile: Arc<dyn ProfileService>,
        cache: TickerCache,
    ) -> Self {
        Self { search, profile, cache }
    }

    pub fn cache(&self) -> &TickerCache {
        &self.cache
    }

    /// Resolve a company name, cache-first. A cached ticker with an "NA"
    /// ISIN retries the profile lookup and upgrades the entry in place, so a
    /// transient profile failure never poisons the cache.
    pub async fn resolve(&mut self, company: &str) -> (String, String) {
        if let Some(hit) = self.cache.get(company).cloned() {
            if hit.ticker != UNRESOLVED && hit.isin == UNRESOLVED {
                if let Ok(isin) = self.profile.isin_for(&hit.ticker).await {
                    let upgraded = CachedInstrument { ticker: hit.ticker.clone(), isin };
                    if let Err(e) = self.cache.insert(company, upgraded.clone()) {
                        warn!("Cache flush failed for {:?}: {:#}", company, e);
                    }
                    return (upgraded.ticker, upgraded.isin);
                }
            }
            debug!("Cache hit for {:?}: {}", company, hit.ticker);
            return (hit.ticker, hit.isin);
        }

        let ticker = self.resolve_ticker(company).await;

        let isin = if ticker == UNRESOLVED {
            UNRESOLVED.to_string()
        } else {
            match self.profile.isin_for(&ticker).await {
                Ok(isin) => isin,
                Err(e) => {
                    warn!("ISIN lookup failed for {}: {:#}", ticker, e);
                    UNRESOLVED.to_string()
                }
            }
        };

        let entry = CachedInstrument { ticker: ticker.clone(), isin: isin.clone() };
        if let Err(e) = self.cache.insert(company, entry) {
            warn!("Cache flush failed for {:?}: {:#}", company, e);
        }

        (ticker, isin)
    }

    /// Widening prefix search: first word, first two words, … full name.
    /// Symbols are tallied across all queries; dot-suffixed listings fold
    /// into their base symbol when an unsuffixed variant shows up.
    async fn resolve_ticker(&self, company: &str) -> String {
        let words: Vec<&str> = company.split_whitespace().collect();

        // first-seen order matters for deterministic tie-breaking
        let mut tally: Vec<(String, usize)> = Vec::new();
        let mut display: HashMap<String, String> = HashMap::new();

        for i in 1..=words.len() {
            let prefix = words[..i].join(" ");
            let hits = match self.search.search_by_name(&prefix).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!("Name search failed for {:?}: {:#}", prefix, e);
                    continue;
                }
            };

            let equities: Vec<&SearchHit> = hits
                .iter()
                .filter(|h| h.quote_type.eq_ignore_ascii_case("EQUITY"))
                .collect();

            let unsuffixed: HashSet<&str> = equities
                .iter()
                .filter(|h| !h.symbol.contains('.'))
                .map(|h| h.symbol.as_str())
                .collect();

            for hit in &equities {
                let symbol = match hit.symbol.split_once('.') {
                    Some((base, _)) if unsuffixed.contains(base) => base.to_string(),
                    _ => hit.symbol.clone(),
                };

                match tally.iter_mut().find(|(s, _)| s == &symbol) {
                    Some((_, n)) => *n += 1,
                    None => tally.push((symbol.clone(), 1)),
                }
                display.entry(symbol).or_insert_with(|| hit.short_name.clone());
            }
        }

        let Some(max) = tally.iter().map(|(_, n)| *n).max() else {
            debug!("No equity hits for {:?}", company);
            return UNRESOLVED.to_string();
        };

        let leaders: Vec<&(String, usize)> =
            tally.iter().filter(|(_, n)| *n == max).collect();

        let winner = if leaders.len() == 1 || max > 1 {
            // Unique leader, or a count tie above 1: first candidate found.
            // The latter depends on external result ordering and is a known
            // non-determinism across repeated queries.
            leaders[0].0.clone()
        } else {
            // All candidates were seen exactly once: fall back to name
            // similarity against the hit's descriptive text.
            leaders
                .iter()
                .map(|(sym, _)| {
                    let text = display.get(sym).map(String::as_str).unwrap_or(sym);
                    (sym, name_similarity(company, text))
                })
                .fold(None::<(&String, f64)>, |best, (sym, score)| match best {
                    Some((_, s)) if s >= score => best,
                    _ => Some((sym, score)),
                })
                .map(|(sym, _)| sym.clone())
                .unwrap_or_else(|| UNRESOLVED.to_string())
        };

        debug!("Resolved {:?} -> {} (count {})", company, winner, max);
        winner
    }
}

// ── Name similarity ───────────────────────────────────────────────────────────

/// Word-overlap similarity in [0, 1] between a company name and a candidate's
/// descriptive text. Exact normalized match and prefix containment score
/// high; otherwise the Jaccard ratio of word sets.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let norm = |s: &str| -> Vec<String> {
        s.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .map(|w| w.to_string())
            .collect()
    };

    let wa = norm(a);
    let wb = norm(b);
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    if wa == wb {
        return 1.0;
    }

    let sa: HashSet<&String> = wa.iter().collect();
    let sb: HashSet<&String> = wb.iter().collect();
    let intersection = sa.intersection(&sb).count() as f64;
    let union = sa.union(&sb).count() as f64;
    let jaccard = intersection / union;

    // Containment bonus: "Apple" vs "Apple Inc." should score well.
    if sa.is_subset(&sb) || sb.is_subset(&sa) {
        (jaccard + 0.5).min(0.95)
    } else {
        jaccard
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
