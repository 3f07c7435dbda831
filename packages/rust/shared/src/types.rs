//! Core domain types for sourcemill ingestion runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Lower bound for a crawl page budget.
pub const MIN_PAGE_BUDGET: u32 = 1;

/// Upper bound for a crawl page budget. The UI enforces the same bound,
/// but the backend must not trust the client.
pub const MAX_PAGE_BUDGET: u32 = 100;

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for ingestion request identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a new time-sortable request identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// IngestionRequest
// ---------------------------------------------------------------------------

/// One uploaded file part, as decoded from the multipart submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original file name from the upload (unique within one request).
    pub name: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// Declared content type, if the client sent one.
    pub content_type: Option<String>,
}

/// The raw, untrusted submission: files, URL lines, page budget, team map.
///
/// `url_lines` is the newline-delimited string exactly as posted; splitting
/// and validation happen in the resolver so that bad lines can be reported
/// per-source instead of rejecting the request.
#[derive(Debug, Clone, Default)]
pub struct IngestionRequest {
    /// Uploaded file blobs, in upload order.
    pub files: Vec<UploadedFile>,
    /// Newline-delimited URL list, in listed order.
    pub url_lines: String,
    /// Requested page budget per crawl job. Clamped to
    /// [`MIN_PAGE_BUDGET`]..=[`MAX_PAGE_BUDGET`] during resolution.
    pub max_pages: u32,
    /// Source identifier (file name or URL) → opaque team label.
    /// Entries for sources not present in the request are ignored.
    pub source_team_map: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// IngestionJob
// ---------------------------------------------------------------------------

/// The work variant of one job: extract a document or crawl a site.
#[derive(Debug, Clone)]
pub enum JobSpec {
    /// Extract one uploaded document.
    Document {
        /// Original file name.
        file_name: String,
        /// Raw document bytes.
        bytes: Vec<u8>,
    },
    /// Crawl one site starting from a seed URL.
    Crawl {
        /// Seed URL supplied by the caller.
        seed_url: Url,
        /// Maximum number of fetch attempts for this job.
        page_budget: u32,
    },
}

/// One independent unit of ingestion work with its resolved team label.
///
/// Jobs never depend on each other's output; the orchestrator may run them
/// in any order as long as results are assembled in submission order.
#[derive(Debug, Clone)]
pub struct IngestionJob {
    /// The file name or seed URL that identifies this job's source.
    pub source_id: String,
    /// Resolved team label (from the map, or positional fallback).
    pub team_id: String,
    /// What to do.
    pub spec: JobSpec,
}

// ---------------------------------------------------------------------------
// KnowledgeItem
// ---------------------------------------------------------------------------

/// One normalized knowledge item.
///
/// `title` and `content` are the UI contract — renaming them breaks the
/// consumer's Markdown conversion. `content` is never empty for an emitted
/// item; empty extractions become [`SourceError`]s instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Display title (document metadata, page title, or derived).
    pub title: String,
    /// Extracted plain-text/Markdown content. Non-empty.
    pub content: String,
    /// The file name or specific page URL that produced this item.
    pub source_id: String,
    /// Team label attached to every item from this source.
    pub team_id: String,
}

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// Classification of a per-source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// A file that cannot be parsed as a document, or a seed URL that
    /// cannot be fetched. Job-level; siblings are unaffected.
    UnreadableSource,
    /// A discovered link inside a crawl that failed to fetch.
    /// Page-level; the crawl continues.
    UnreachablePage,
    /// A source that parses but yields no usable text.
    EmptyExtraction,
    /// A URL line that does not parse as an absolute http(s) URL.
    InvalidUrl,
}

/// A recorded per-source failure, reported alongside successful items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    /// The file name, URL, or literal bad line this error is about.
    pub source_id: String,
    /// Failure classification.
    pub kind: SourceErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl SourceError {
    /// A job-level unreadable-source error.
    pub fn unreadable(source_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            kind: SourceErrorKind::UnreadableSource,
            message: msg.into(),
        }
    }

    /// A page-level unreachable-page error.
    pub fn unreachable(source_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            kind: SourceErrorKind::UnreachablePage,
            message: msg.into(),
        }
    }

    /// An empty-extraction error.
    pub fn empty(source_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            kind: SourceErrorKind::EmptyExtraction,
            message: msg.into(),
        }
    }

    /// An invalid-URL-line error.
    pub fn invalid_url(line: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            source_id: line.into(),
            kind: SourceErrorKind::InvalidUrl,
            message: msg.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// IngestionResult
// ---------------------------------------------------------------------------

/// The single response payload for one submission.
///
/// Constructed exclusively by the orchestrator; immutable once returned.
/// Request-scoped: nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    /// Identifier for this ingestion run.
    pub request_id: RequestId,
    /// Items in job-submission order (files first, then URLs; within one
    /// crawl, pages in discovery order).
    pub items: Vec<KnowledgeItem>,
    /// Per-source failures, in the order they were observed per job.
    pub errors: Vec<SourceError>,
    /// True if the request-wide timeout expired and these are partial
    /// results.
    #[serde(default)]
    pub timed_out: bool,
}

impl IngestionResult {
    /// An empty result for a request with no sources.
    pub fn empty(request_id: RequestId) -> Self {
        Self {
            request_id,
            items: Vec::new(),
            errors: Vec::new(),
            timed_out: false,
        }
    }
}

// ---------------------------------------------------------------------------
// CancelFlag
// ---------------------------------------------------------------------------

/// Cooperative cancellation signal shared between the orchestrator and its
/// workers. Workers check it between page fetches; nothing is interrupted
/// mid-fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancelFlag {
    /// A fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every holder of this flag.
    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_roundtrip() {
        let id = RequestId::new();
        let s = id.to_string();
        let parsed: RequestId = s.parse().expect("parse RequestId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn result_serialization() {
        let result = IngestionResult {
            request_id: RequestId::new(),
            items: vec![KnowledgeItem {
                title: "Notes".into(),
                content: "Body text".into(),
                source_id: "notes.pdf".into(),
                team_id: "team_1".into(),
            }],
            errors: vec![SourceError::unreachable(
                "https://example.com/gone",
                "HTTP 404",
            )],
            timed_out: false,
        };

        let json = serde_json::to_string(&result).expect("serialize");
        assert!(json.contains("\"title\":\"Notes\""));
        assert!(json.contains("\"content\":\"Body text\""));
        assert!(json.contains("\"kind\":\"unreachable_page\""));

        let parsed: IngestionResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.errors[0].kind, SourceErrorKind::UnreachablePage);
    }

    #[test]
    fn error_kind_wire_names() {
        let kinds = [
            (SourceErrorKind::UnreadableSource, "\"unreadable_source\""),
            (SourceErrorKind::UnreachablePage, "\"unreachable_page\""),
            (SourceErrorKind::EmptyExtraction, "\"empty_extraction\""),
            (SourceErrorKind::InvalidUrl, "\"invalid_url\""),
        ];
        for (kind, expected) in kinds {
            assert_eq!(serde_json::to_string(&kind).expect("serialize"), expected);
        }
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
