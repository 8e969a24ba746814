//! Page-ordered document text abstraction.
//!
//! The extractor only needs "does this page contain the marker" and "give me
//! the page text", so the PDF backend stays swappable (tests use an
//! in-memory source).

use anyhow::{Context, Result, bail};
use std::path::Path;

pub trait DocumentSource {
    fn page_count(&self) -> usize;

    fn page_text(&self, page: usize) -> &str;

    fn find_marker(&self, page: usize, text: &str) -> bool {
        self.page_text(page).contains(text)
    }
}

// ── PDF backend ───────────────────────────────────────────────────────────────

const PDF_MAGIC: &[u8] = b"%PDF";
/// Disclosure PDFs are a few pages; anything huge is not one of ours.
const MAX_PDF_SIZE: usize = 50 * 1024 * 1024;

pub struct PdfDocument {
    pages: Vec<String>,
}

impl PdfDocument {
    /// Open and text-extract a PDF. Any failure here means the document is
    /// malformed and should be skipped by the caller.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Could not read {:?}", path))?;

        if bytes.len() < 8 || !bytes.starts_with(PDF_MAGIC) {
            bail!("{:?} is not a PDF (missing header)", path);
        }
        if bytes.len() > MAX_PDF_SIZE {
            bail!("{:?} exceeds the {} MB limit", path, MAX_PDF_SIZE / (1024 * 1024));
        }

        let text = pdf_extract::extract_text_from_mem(&bytes)
            .with_context(|| format!("Text extraction failed for {:?}", path))?;

        // pdf-extract separates pages with form feeds; a single-page
        // document yields one chunk either way.
        let pages = text.split('\u{0C}').map(|p| p.to_string()).collect();

        Ok(Self { pages })
    }
}

impl DocumentSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> &str {
        &self.pages[page]
    }
}

// ── In-memory source (tests, fixtures) ────────────────────────────────────────

pub struct TextDocument {
    pages: Vec<String>,
}

impl TextDocument {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }

    pub fn single_page(text: &str) -> Self {
        Self { pages: vec![text.to_string()] }
    }
}

impl DocumentSource for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> &str {
        &self.pages[page]
    }
}
