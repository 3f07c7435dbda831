//! Document Extractor — one uploaded PDF in, title + plain text out.
//!
//! Validation is structural (`lopdf` must load the byte stream), text comes
//! from `pdf-extract` in document page order, and the title prefers embedded
//! metadata over the file name. Failures are per-source data
//! ([`SourceError`]), never panics or caller-level errors: one corrupt
//! upload must not disturb its sibling jobs.

use lopdf::{Document, Object};
use tracing::{debug, instrument, warn};

use sourcemill_shared::SourceError;

/// A successfully extracted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Embedded metadata title, else the file name without extension.
    pub title: String,
    /// Whitespace-normalized plain text of the whole document. Non-empty.
    pub content: String,
}

/// Extract title and plain text from one PDF.
///
/// Returns `SourceError { kind: UnreadableSource }` for byte streams that
/// are not a well-formed PDF, and `{ kind: EmptyExtraction }` for documents
/// that parse but yield no usable text (e.g. scanned image pages).
#[instrument(skip(bytes), fields(file = %file_name, len = bytes.len()))]
pub fn extract(file_name: &str, bytes: &[u8]) -> Result<ExtractedDocument, SourceError> {
    // Structural validation first: feeding arbitrary bytes straight into
    // text extraction produces confusing downstream errors.
    let doc = Document::load_mem(bytes).map_err(|e| {
        warn!(error = %e, "failed to load PDF");
        SourceError::unreadable(file_name, format!("not a readable PDF: {e}"))
    })?;

    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        warn!(error = %e, "text extraction failed");
        SourceError::unreadable(file_name, format!("text extraction failed: {e}"))
    })?;

    let content = normalize_text(&text);
    if content.is_empty() {
        return Err(SourceError::empty(
            file_name,
            "document contains no extractable text",
        ));
    }

    let title = metadata_title(&doc).unwrap_or_else(|| title_from_file_name(file_name));

    debug!(
        title = %title,
        content_len = content.len(),
        pages = doc.get_pages().len(),
        "document extracted"
    );

    Ok(ExtractedDocument { title, content })
}

// ---------------------------------------------------------------------------
// Title derivation
// ---------------------------------------------------------------------------

/// Read the `Title` entry of the PDF Info dictionary, if present and
/// non-empty.
fn metadata_title(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;

    let dict = match info {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };

    let Object::String(raw, _) = dict.get(b"Title").ok()? else {
        return None;
    };

    let decoded = decode_pdf_text(raw);
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Decode a PDF text string: UTF-16BE when BOM-prefixed, else treated as
/// (mostly ASCII-compatible) PDFDocEncoding.
fn decode_pdf_text(raw: &[u8]) -> String {
    if raw.starts_with(&[0xFE, 0xFF]) {
        let utf16: Vec<u16> = raw[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Fall back to the file name with its extension stripped.
fn title_from_file_name(file_name: &str) -> String {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    stem.to_string()
}

// ---------------------------------------------------------------------------
// Text normalization
// ---------------------------------------------------------------------------

/// Normalize extracted text: strip nulls, trim each line, collapse runs of
/// blank lines to a single separator, trim the whole.
fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.replace('\0', "").lines() {
        let line = line.trim();
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push_str("\n\n");
            pending_blank = false;
        } else if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
