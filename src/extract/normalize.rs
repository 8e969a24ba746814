//! Row Normalizer: rewrite one token group into the canonical record shape.
//!
//! The renderer produces several inconsistent row shapes (action code glued
//! to the company name, stray inserted tokens, merged transaction and
//! notification dates, amount ranges split across two tokens). Each shape is
//! corrected by one rule; the rules run in a fixed order and are idempotent
//! when their predicate does not hold.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{AmountRange, TradeAction};

use super::{ExtractError, RawRecord};

static EMBEDDED_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([SPsp])( \(partial\))?$").unwrap());

static DATE_SHAPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").unwrap());

static DESCRIPTION_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^d[^:]{0,12}:\s*").unwrap());

/// Apply the shape-correcting rule sequence. Returns the corrected token
/// buffer: [company, action, date, amount, description…].
pub fn normalize_row(group: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut buf: Vec<String> = group.to_vec();

    split_embedded_action(&mut buf);
    drop_until_action_code(&mut buf)?;
    tidy_date_slot(&mut buf);
    splice_spilled_amount(&mut buf);

    Ok(buf)
}

/// Rule 1: a trailing whole-word action code inside the first token is split
/// off into its own slot. Guarded against codes glued to digits, slashes or
/// dashes (those belong to the asset name, e.g. option series text).
fn split_embedded_action(buf: &mut Vec<String>) {
    let Some(first) = buf.first() else { return };

    let Some(m) = EMBEDDED_ACTION.find(first) else { return };
    if m.start() == 0 {
        return; // no company prefix to split off
    }

    let before = first.as_bytes()[m.start() - 1] as char;
    if before.is_ascii_digit() || before == '/' || before == '-' {
        return;
    }

    let prefix = first[..m.start()].trim().to_string();
    if prefix.is_empty() {
        return;
    }
    let code = first[m.start()..].trim().to_string();

    buf.splice(0..1, [prefix, code]);
}

/// Rule 2: drop stray tokens until slot 1 holds a recognized action code.
/// Bounded by the buffer length so malformed rows fail instead of spinning.
fn drop_until_action_code(buf: &mut Vec<String>) -> Result<(), ExtractError> {
    let bound = buf.len();
    for _ in 0..bound {
        match buf.get(1) {
            None => break,
            Some(tok) if TradeAction::parse_code(tok).is_some() => return Ok(()),
            Some(_) => {
                buf.remove(1);
            }
        }
    }
    Err(ExtractError::NoActionCode(
        buf.first().cloned().unwrap_or_default(),
    ))
}

/// Rule 3: the date slot sometimes carries the notification date too.
/// Merged form ("01/15/2024 02/09/2024", 21 chars) is truncated to the
/// transaction date; a clean 10-char date followed by a standalone
/// date-shaped token has that token removed.
fn tidy_date_slot(buf: &mut Vec<String>) {
    let Some(tok) = buf.get(2) else { return };

    if tok.len() == 21 {
        // PDF text extraction can smuggle multibyte garbage into the slot;
        // an unsliceable token is left for the date parser to reject.
        if let Some(date) = tok.get(..10) {
            buf[2] = date.to_string();
        }
    } else if tok.len() == 10 {
        let trailing_date = buf.get(3).is_some_and(|next| DATE_SHAPED.is_match(next));
        if trailing_date {
            buf.remove(3);
        }
    }
}

/// Rule 4: when the amount token ends at the dash ("$1,001 -"), the high
/// bound spilled into the next token; splice it back.
fn splice_spilled_amount(buf: &mut Vec<String>) {
    let Some(tok) = buf.get(3) else { return };

    let high_is_empty = match tok.split_once('-') {
        Some((_, high)) => high.trim().is_empty(),
        None => false,
    };

    if high_is_empty && buf.len() > 4 {
        let high = buf.remove(4);
        buf[3] = format!("{} {}", buf[3], high);
    }
}

/// Build the raw record from a normalized buffer. Company, action, date and
/// amount are required; everything after the amount is description text.
pub fn build_record(buf: &[String]) -> Result<RawRecord, ExtractError> {
    if buf.len() < 4 {
        return Err(ExtractError::TruncatedRow(buf.to_vec()));
    }

    let action = TradeAction::parse_code(&buf[1])
        .ok_or_else(|| ExtractError::NoActionCode(buf[0].clone()))?;

    let date = NaiveDate::parse_from_str(&buf[2], "%m/%d/%Y")
        .map_err(|_| ExtractError::BadDate(buf[2].clone()))?;

    let amount = AmountRange::parse(&buf[3])?;

    let description = DESCRIPTION_LABEL
        .replace(buf[4..].join(" ").trim(), "")
        .to_string();

    Ok(RawRecord {
        company: buf[0].trim().to_string(),
        action,
        date,
        amount,
        description,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstrumentKind;

    fn toks(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_canonical_row_passes_through() {
        // End-to-end scenario from the dominant layout.
        let group = toks(&[
            "Apple Inc",
            "P",
            "01/15/2024",
            "$1,001 -",
            "$15,000",
            "Purchased 100 shares",
        ]);
        let rec = build_record(&normalize_row(&group).unwrap()).unwrap();

        assert_eq!(rec.company, "Apple Inc");
        assert_eq!(rec.action, TradeAction::Purchase);
        assert_eq!(rec.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(rec.amount.low, 1001.0);
        assert_eq!(rec.amount.high, 15000.0);
        assert_eq!(rec.description, "Purchased 100 shares");
        let _ = InstrumentKind::Stock; // classification happens in enrich
    }

    #[test]
    fn test_embedded_action_is_split_off() {
        let group = toks(&["Tesla Inc S", "06/02/2024", "$15,001 -", "$50,000"]);
        let buf = normalize_row(&group).unwrap();
        assert_eq!(buf[0], "Tesla Inc");
        assert_eq!(buf[1], "S");
        assert_eq!(buf[2], "06/02/2024");
    }

    #[test]
    fn test_embedded_partial_action() {
        let group = toks(&[
            "NVIDIA Corp S (partial)",
            "03/10/2024",
            "$1,001 -",
            "$15,000",
        ]);
        let buf = normalize_row(&group).unwrap();
        assert_eq!(buf[0], "NVIDIA Corp");
        assert_eq!(buf[1], "S (partial)");
    }

    #[test]
    fn test_action_adjacent_to_digit_is_not_split() {
        // "500 P" style series text must not be mistaken for an action code
        // when glued to digits/slashes/dashes.
        let group = toks(&["Fund 2024-P", "P", "01/15/2024", "$1,001 - $15,000"]);
        let buf = normalize_row(&group).unwrap();
        assert_eq!(buf[0], "Fund 2024-P");
        assert_eq!(buf[1], "P");
    }

    #[test]
    fn test_stray_tokens_before_action_are_dropped() {
        let group = toks(&[
            "Apple Inc",
            "[ST]",
            "AAPL",
            "P",
            "01/15/2024",
            "$1,001 - $15,000",
        ]);
        let buf = normalize_row(&group).unwrap();
        assert_eq!(buf[1], "P");
        assert_eq!(buf[2], "01/15/2024");
    }

    #[test]
    fn test_row_without_action_code_errors_instead_of_looping() {
        let group = toks(&["Apple Inc", "junk", "more junk", "still junk"]);
        let err = normalize_row(&group).unwrap_err();
        assert!(matches!(err, ExtractError::NoActionCode(_)));
    }

    #[test]
    fn test_merged_notification_date_is_truncated() {
        let group = toks(&[
            "Apple Inc",
            "P",
            "01/15/2024 02/09/2024",
            "$1,001 - $15,000",
        ]);
        let buf = normalize_row(&group).unwrap();
        assert_eq!(buf[2], "01/15/2024");
    }

    #[test]
    fn test_multibyte_garbage_in_date_slot_degrades_to_bad_date() {
        // 21 bytes with a multibyte char straddling the truncation point;
        // must not panic, must surface as a per-record error
        let group = toks(&[
            "Apple Inc",
            "P",
            "01/15/202é0123456789",
            "$1,001 - $15,000",
        ]);
        let buf = normalize_row(&group).unwrap();
        let err = build_record(&buf).unwrap_err();
        assert!(matches!(err, ExtractError::BadDate(_)));
    }

    #[test]
    fn test_standalone_notification_date_is_removed() {
        let group = toks(&[
            "Apple Inc",
            "P",
            "01/15/2024",
            "02/09/2024",
            "$1,001 - $15,000",
        ]);
        let buf = normalize_row(&group).unwrap();
        assert_eq!(buf[2], "01/15/2024");
        assert_eq!(buf[3], "$1,001 - $15,000");
    }

    #[test]
    fn test_amount_not_removed_when_no_notification_date() {
        let group = toks(&["Apple Inc", "P", "01/15/2024", "$1,001 - $15,000", "desc"]);
        let buf = normalize_row(&group).unwrap();
        assert_eq!(buf[3], "$1,001 - $15,000");
        assert_eq!(buf[4], "desc");
    }

    #[test]
    fn test_description_label_is_stripped() {
        let group = toks(&[
            "Apple Inc",
            "P",
            "01/15/2024",
            "$1,001 - $15,000",
            "Description: Purchased 100 shares",
        ]);
        let rec = build_record(&normalize_row(&group).unwrap()).unwrap();
        assert_eq!(rec.description, "Purchased 100 shares");
    }

    #[test]
    fn test_truncated_row_is_a_structural_error() {
        let group = toks(&["Apple Inc", "P", "01/15/2024"]);
        let err = build_record(&normalize_row(&group).unwrap()).unwrap_err();
        assert!(matches!(err, ExtractError::TruncatedRow(_)));
    }

    #[test]
    fn test_bad_amount_is_a_per_record_error() {
        let group = toks(&["Apple Inc", "P", "01/15/2024", "not an amount"]);
        let err = build_record(&normalize_row(&group).unwrap()).unwrap_err();
        assert!(matches!(err, ExtractError::BadAmount(_)));
    }

    #[test]
    fn test_normalized_rows_satisfy_action_postcondition() {
        // For all valid groups the second slot is a recognized action code.
        let groups = [
            toks(&["A Corp", "P", "01/15/2024", "$1,001 -", "$15,000"]),
            toks(&["B Corp S", "01/15/2024", "$1,001 - $15,000"]),
            toks(&["C Corp", "x", "y", "S", "01/15/2024", "$1,001"]),
        ];
        for g in &groups {
            let buf = normalize_row(g).unwrap();
            assert!(TradeAction::parse_code(&buf[1]).is_some());
        }
    }
}
