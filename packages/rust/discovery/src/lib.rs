//! Feed and sitemap discovery for blog seeds.
//!
//! Before expanding a blog crawl link-by-link, sourcemill first checks
//! whether the site publishes an RSS/Atom feed or a sitemap. If found, the
//! linked post URLs pre-seed the crawl frontier, which reaches the actual
//! articles faster than following navigation links.

mod parser;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use sourcemill_shared::{Result, SourcemillError};

pub use parser::{parse_feed, parse_sitemap};

/// Well-known feed locations probed at the seed's origin, in order.
const FEED_PATHS: &[&str] = &["/feed", "/rss", "/feed.xml", "/rss.xml"];

/// Well-known sitemap locations probed after feeds.
const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

/// Maximum response size we consider valid (10 MB).
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default timeout in seconds for a discovery probe.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default cap on discovered URLs returned to the caller.
const DEFAULT_MAX_ENTRIES: usize = 50;

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("sourcemill/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// DiscoveryResult
// ---------------------------------------------------------------------------

/// How the post URLs were discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    /// RSS or Atom feed.
    Feed,
    /// XML sitemap.
    Sitemap,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feed => write!(f, "feed"),
            Self::Sitemap => write!(f, "sitemap"),
        }
    }
}

/// Outcome of the discovery process.
#[derive(Debug, Clone)]
pub enum DiscoveryResult {
    /// A feed or sitemap yielded same-origin post URLs.
    Found {
        /// Discovered post URLs, in document order, deduplicated.
        urls: Vec<Url>,
        /// Where they came from.
        method: DiscoveryMethod,
    },
    /// Nothing usable found; the caller falls back to link expansion.
    NotFound,
}

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for the discovery process.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout for each probe request, in seconds.
    pub timeout_secs: u64,
    /// Maximum number of discovered URLs to return.
    pub max_entries: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Probe well-known feed and sitemap paths at the seed's origin.
///
/// Feeds are preferred over sitemaps (a feed lists actual posts; a sitemap
/// lists everything). Only same-origin URLs survive. Probes are cheap
/// metadata requests and are not counted against any crawl page budget.
#[instrument(skip_all, fields(seed = %seed))]
pub async fn discover(seed: &Url, opts: &DiscoveryOptions) -> Result<DiscoveryResult> {
    let origin = origin_url(seed)?;
    let client = build_client(opts)?;

    for path in FEED_PATHS {
        let probe_url = format!("{origin}{path}");
        if let Some(body) = fetch_probe(&client, &probe_url).await {
            let urls = keep_same_origin(parse_feed(&body), seed, opts.max_entries);
            if !urls.is_empty() {
                info!(probe = %probe_url, count = urls.len(), "feed discovered");
                return Ok(DiscoveryResult::Found {
                    urls,
                    method: DiscoveryMethod::Feed,
                });
            }
        }
    }

    for path in SITEMAP_PATHS {
        let probe_url = format!("{origin}{path}");
        if let Some(body) = fetch_probe(&client, &probe_url).await {
            let candidates = parse_sitemap(&body)
                .into_iter()
                .filter(|u| looks_like_post(u))
                .collect();
            let urls = keep_same_origin(candidates, seed, opts.max_entries);
            if !urls.is_empty() {
                info!(probe = %probe_url, count = urls.len(), "sitemap discovered");
                return Ok(DiscoveryResult::Found {
                    urls,
                    method: DiscoveryMethod::Sitemap,
                });
            }
        }
    }

    debug!("no feed or sitemap found");
    Ok(DiscoveryResult::NotFound)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The scheme://host[:port] origin of a URL, without path or query.
fn origin_url(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| SourcemillError::parse(format!("URL has no host: {url}")))?;

    let mut origin = format!("{}://{host}", url.scheme());
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{port}"));
    }
    Ok(origin)
}

fn build_client(opts: &DiscoveryOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(3))
        .timeout(std::time::Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| SourcemillError::Network(format!("failed to build HTTP client: {e}")))
}

/// Fetch one probe URL; `None` on any failure (probes are best-effort).
async fn fetch_probe(client: &Client, url: &str) -> Option<String> {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            debug!(%url, error = %e, "probe failed");
            return None;
        }
    };

    if !response.status().is_success() {
        debug!(%url, status = %response.status(), "probe not available");
        return None;
    }

    match response.text().await {
        Ok(body) if body.len() <= MAX_RESPONSE_SIZE => Some(body),
        Ok(_) => {
            debug!(%url, "probe response too large");
            None
        }
        Err(e) => {
            debug!(%url, error = %e, "probe body read failed");
            None
        }
    }
}

/// Parse candidates, keep same-origin ones, dedup, cap.
fn keep_same_origin(candidates: Vec<String>, seed: &Url, cap: usize) -> Vec<Url> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();

    for candidate in candidates {
        let Ok(mut url) = Url::parse(&candidate) else {
            continue;
        };
        url.set_fragment(None);

        let same_origin = url.scheme() == seed.scheme()
            && url.host_str() == seed.host_str()
            && url.port_or_known_default() == seed.port_or_known_default();
        if !same_origin {
            continue;
        }

        if seen.insert(url.to_string()) {
            urls.push(url);
            if urls.len() >= cap {
                break;
            }
        }
    }

    urls
}

/// Heuristic filter for sitemap entries: keep URLs that look like posts.
fn looks_like_post(url: &str) -> bool {
    url.contains("/blog/") || url.contains("/post/") || url.contains("/article/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
