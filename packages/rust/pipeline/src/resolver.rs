//! Source Resolver — the raw request becomes a validated list of jobs.
//!
//! Pure transformation, no side effects. Only structural malformation
//! (duplicate source identifiers, nameless files) rejects the request; a
//! single bad URL line becomes a per-source error and the rest of the
//! request proceeds.

use std::collections::HashSet;

use tracing::debug;
use url::Url;

use sourcemill_shared::{
    IngestionJob, IngestionRequest, JobSpec, MAX_PAGE_BUDGET, MIN_PAGE_BUDGET, Result, SourceError,
    SourcemillError,
};

/// Output of resolution: runnable jobs plus the URL lines that didn't make it.
#[derive(Debug, Default)]
pub struct ResolvedJobs {
    /// Jobs in submission order: files in upload order, then URLs in
    /// listed order.
    pub jobs: Vec<IngestionJob>,
    /// One entry per URL line that failed to parse. Never silently dropped.
    pub errors: Vec<SourceError>,
}

/// Resolve a raw request into typed ingestion jobs.
///
/// The page budget is clamped to its documented bounds rather than
/// rejected — the UI enforces the same range, but the backend does not
/// trust the client. Team labels come from `source_team_map`; sources
/// missing from the map get the positional `team_{n}` fallback the web
/// client itself uses, so labels stay stable and distinguishable either
/// way.
pub fn resolve(request: &IngestionRequest) -> Result<ResolvedJobs> {
    let page_budget = request.max_pages.clamp(MIN_PAGE_BUDGET, MAX_PAGE_BUDGET);

    let url_lines: Vec<&str> = request
        .url_lines
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    check_unique_sources(request, &url_lines)?;

    let mut resolved = ResolvedJobs::default();
    // Positions count every file and every surviving URL line — including
    // lines that fail to parse — to mirror the client's index-based
    // auto-assignment.
    let mut position = 0usize;

    for file in &request.files {
        if file.name.trim().is_empty() {
            return Err(SourcemillError::malformed("uploaded file has no name"));
        }
        position += 1;

        resolved.jobs.push(IngestionJob {
            source_id: file.name.clone(),
            team_id: team_label(request, &file.name, position),
            spec: JobSpec::Document {
                file_name: file.name.clone(),
                bytes: file.bytes.clone(),
            },
        });
    }

    for line in url_lines {
        position += 1;

        let seed_url = match parse_http_url(line) {
            Ok(url) => url,
            Err(message) => {
                debug!(%line, %message, "URL line rejected");
                resolved.errors.push(SourceError::invalid_url(line, message));
                continue;
            }
        };

        resolved.jobs.push(IngestionJob {
            source_id: line.to_string(),
            team_id: team_label(request, line, position),
            spec: JobSpec::Crawl {
                seed_url,
                page_budget,
            },
        });
    }

    Ok(resolved)
}

/// Every source identifier must be unique within one request.
fn check_unique_sources(request: &IngestionRequest, url_lines: &[&str]) -> Result<()> {
    let mut seen = HashSet::new();

    for file in &request.files {
        if !seen.insert(file.name.as_str()) {
            return Err(SourcemillError::malformed(format!(
                "duplicate source: {}",
                file.name
            )));
        }
    }
    for line in url_lines {
        if !seen.insert(line) {
            return Err(SourcemillError::malformed(format!(
                "duplicate source: {line}"
            )));
        }
    }

    Ok(())
}

/// Parse one URL line as an absolute http(s) URL.
fn parse_http_url(line: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(line).map_err(|e| format!("not a valid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme: {other}")),
    }
}

/// Team label from the map, else positional fallback (1-based).
fn team_label(request: &IngestionRequest, source_id: &str, position: usize) -> String {
    request
        .source_team_map
        .get(source_id)
        .cloned()
        .unwrap_or_else(|| format!("team_{position}"))
}
