//! Row Segmenter: split the flat line sequence into one token group per
//! transaction.
//!
//! The recurring delimiter is the filer's category abbreviation ("SP", "JT",
//! "DC", …). It is not hard-coded: the line right after the category
//! sentinel names it, and every later occurrence starts a new row.

use tracing::debug;

use super::ExtractError;

pub fn segment_rows(
    lines: &[String],
    category_sentinel: &str,
) -> Result<Vec<Vec<String>>, ExtractError> {
    let sentinel_idx = lines
        .iter()
        .position(|l| l == category_sentinel)
        .ok_or_else(|| ExtractError::CategorySentinelNotFound(category_sentinel.to_string()))?;

    let delimiter = lines
        .get(sentinel_idx + 1)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ExtractError::CategorySentinelNotFound(category_sentinel.to_string()))?
        .clone();

    debug!("Row delimiter discovered: {:?}", delimiter);

    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in lines {
        if line == &delimiter {
            groups.push(std::mem::take(&mut current));
        } else {
            current.push(line.clone());
        }
    }
    groups.push(current);

    // The first group precedes the first delimiter: filer metadata, not a
    // transaction. Empty groups come from adjacent delimiter lines.
    Ok(groups
        .into_iter()
        .skip(1)
        .filter(|g| !g.is_empty())
        .collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
