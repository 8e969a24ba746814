//! Line Extractor: locate the transaction table's text region and flatten it
//! into trimmed lines.

use tracing::debug;

use crate::config::MarkerConfig;

use super::ExtractError;
use super::document::DocumentSource;

/// Collect the table region lines from every page carrying the start marker.
/// Long filings continue the table across pages, so all marker pages
/// contribute, in page order. Errors only when no page has the marker.
pub fn extract_table_lines(
    doc: &dyn DocumentSource,
    markers: &MarkerConfig,
) -> Result<Vec<String>, ExtractError> {
    let mut collected: Vec<String> = Vec::new();
    let mut marker_seen = false;

    for page in 0..doc.page_count() {
        if !doc.find_marker(page, &markers.table_start) {
            continue;
        }
        marker_seen = true;

        let text = doc.page_text(page);
        let lines: Vec<&str> = text.split('\n').collect();

        // Table body starts right after the header line carrying the marker.
        let start = lines
            .iter()
            .position(|l| l.contains(markers.table_start.as_str()))
            .unwrap_or(0);

        for line in &lines[start + 1..] {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            collected.push(trimmed.to_string());
        }
    }

    if !marker_seen {
        return Err(ExtractError::MarkerNotFound(markers.table_start.clone()));
    }

    // Everything at and after the asset-type footnote is boilerplate.
    // The footnote is usually present but its absence is tolerated.
    if let Some(idx) = collected.iter().position(|l| l == &markers.trailer) {
        debug!("Truncating {} footnote lines", collected.len() - idx);
        collected.truncate(idx);
    }

    Ok(collected)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::document::TextDocument;

    fn markers() -> MarkerConfig {
        MarkerConfig::default()
    }

    #[test]
    fn test_extracts_lines_after_marker_until_blank() {
        let doc = TextDocument::single_page(
            "Filer: Example\nID Owner Asset\nSP\nApple Inc\nP\n\nleftover",
        );
        let lines = extract_table_lines(&doc, &markers()).unwrap();
        assert_eq!(lines, vec!["SP", "Apple Inc", "P"]);
    }

    #[test]
    fn test_missing_marker_is_an_error() {
        let doc = TextDocument::single_page("no table here at all");
        let err = extract_table_lines(&doc, &markers()).unwrap_err();
        assert!(matches!(err, ExtractError::MarkerNotFound(_)));
    }

    #[test]
    fn test_trailer_truncation() {
        let m = markers();
        let page = format!("x Owner y\nSP\nApple Inc\n{}\nasset codes...", m.trailer);
        let doc = TextDocument::single_page(&page);
        let lines = extract_table_lines(&doc, &m).unwrap();
        assert_eq!(lines, vec!["SP", "Apple Inc"]);
    }

    #[test]
    fn test_trailer_absence_is_tolerated() {
        let doc = TextDocument::single_page("x Owner y\nSP\nApple Inc");
        let lines = extract_table_lines(&doc, &markers()).unwrap();
        assert_eq!(lines, vec!["SP", "Apple Inc"]);
    }

    #[test]
    fn test_table_spanning_multiple_pages() {
        let doc = TextDocument::new(vec![
            "h Owner h\nSP\nApple Inc".to_string(),
            "no marker on this page".to_string(),
            "h Owner h\nSP\nMicrosoft Corp".to_string(),
        ]);
        let lines = extract_table_lines(&doc, &markers()).unwrap();
        assert_eq!(lines, vec!["SP", "Apple Inc", "SP", "Microsoft Corp"]);
    }
}
