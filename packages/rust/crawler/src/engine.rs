//! Bounded breadth-first site crawler.
//!
//! One crawl job owns its frontier and visited set exclusively; the only
//! cross-job resource is an optional shared fetch limiter. The page budget
//! counts fetch *attempts* — successes and failures alike — so a site full
//! of dead links cannot consume more wall-clock than the caller asked for.

use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sourcemill_discovery::{DiscoveryOptions, DiscoveryResult};
use sourcemill_shared::{CancelFlag, CrawlConfig, SourceError, SourcemillError};

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("sourcemill/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// CrawlOutcome
// ---------------------------------------------------------------------------

/// One successfully captured page.
#[derive(Debug, Clone)]
pub struct PageCapture {
    /// The specific page URL (not the seed).
    pub url: String,
    /// Page title: `<title>`, else first heading, else the URL itself.
    pub title: String,
    /// Extracted readable text (Markdown). Non-empty.
    pub content: String,
}

/// Result of one crawl job. Partial success is the normal case.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Captured pages, in discovery (breadth-first) order.
    pub pages: Vec<PageCapture>,
    /// Per-page failures; the crawl continued past each of these.
    pub page_errors: Vec<SourceError>,
    /// Number of fetch attempts made. Never exceeds the page budget.
    pub pages_fetched: u32,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Breadth-first same-origin crawler with an attempt-counted page budget.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
    /// Optional process-wide cap on concurrent outbound fetches.
    fetch_slots: Option<Arc<Semaphore>>,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self, SourcemillError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| SourcemillError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            fetch_slots: None,
        })
    }

    /// Share an outbound-fetch limiter with other crawl jobs.
    pub fn with_fetch_slots(mut self, slots: Arc<Semaphore>) -> Self {
        self.fetch_slots = Some(slots);
        self
    }

    /// Crawl starting from `seed`, making at most `page_budget` fetch
    /// attempts.
    ///
    /// The seed must be reachable for the job to be meaningful: a seed
    /// fetch failure returns `Err` and the orchestrator records it as a
    /// job-level error. Failures on discovered pages are carried in
    /// [`CrawlOutcome::page_errors`] and never abort the job.
    ///
    /// Between fetches the crawler checks `cancel`; once set, it stops
    /// expanding and returns whatever it has.
    #[instrument(skip_all, fields(seed = %seed, budget = page_budget))]
    pub async fn crawl(
        &self,
        seed: &Url,
        page_budget: u32,
        cancel: &CancelFlag,
    ) -> Result<CrawlOutcome, SourceError> {
        let seed_id = seed.to_string();

        if !self.config.allow_private_hosts && is_private_target(seed) {
            return Err(SourceError::unreadable(
                &seed_id,
                "seed resolves to a private or local address",
            ));
        }

        let mut frontier: VecDeque<(Url, u32)> = VecDeque::new();
        let mut enqueued: HashSet<String> = HashSet::new();
        let mut content_hashes: HashSet<String> = HashSet::new();
        let mut outcome = CrawlOutcome::default();

        frontier.push_back((seed.clone(), 0));
        enqueued.insert(normalize_url(seed));

        // Feed/sitemap discovery pre-seeds the frontier behind the seed.
        let expand_links = self.config.mode != "feed-first";
        if self.config.mode != "crawl" {
            self.preseed_from_discovery(seed, &mut frontier, &mut enqueued)
                .await;
        }

        info!(
            mode = %self.config.mode,
            preseeded = frontier.len() - 1,
            "starting crawl"
        );

        while let Some((url, depth)) = frontier.pop_front() {
            if outcome.pages_fetched >= page_budget {
                debug!("page budget exhausted");
                break;
            }
            if cancel.is_cancelled() {
                debug!("crawl cancelled");
                break;
            }

            if outcome.pages_fetched > 0 && self.config.rate_limit_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.rate_limit_ms)).await;
            }

            let is_seed = outcome.pages_fetched == 0;
            outcome.pages_fetched += 1;

            let body = match self.fetch_page(&url).await {
                Ok(body) => body,
                Err(message) => {
                    if is_seed {
                        return Err(SourceError::unreadable(
                            &seed_id,
                            format!("seed fetch failed: {message}"),
                        ));
                    }
                    debug!(%url, %message, "page fetch failed, continuing");
                    outcome
                        .page_errors
                        .push(SourceError::unreachable(url.to_string(), message));
                    continue;
                }
            };

            // Link discovery happens before content filtering: a page with
            // no readable text can still link to pages that have some.
            if expand_links {
                for link in extract_links(&body, &url) {
                    if !same_origin(&link, seed) {
                        continue;
                    }
                    if !self.config.allow_private_hosts && is_private_target(&link) {
                        continue;
                    }
                    if frontier.len() >= self.config.frontier_cap {
                        debug!(cap = self.config.frontier_cap, "frontier cap reached");
                        break;
                    }
                    if enqueued.insert(normalize_url(&link)) {
                        frontier.push_back((link, depth + 1));
                    }
                }
            }

            match sourcemill_markdown::extract_readable(&body, &url) {
                Ok(content) => {
                    let text = content.markdown.trim().to_string();
                    if text.is_empty() {
                        outcome.page_errors.push(SourceError::empty(
                            url.to_string(),
                            "page has no readable text",
                        ));
                        continue;
                    }

                    // Mirror URLs serving identical bodies produce one item.
                    let hash = content_hash(&text);
                    if !content_hashes.insert(hash) {
                        debug!(%url, "duplicate content, skipping");
                        continue;
                    }

                    let title = content
                        .title
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| url.to_string());

                    outcome.pages.push(PageCapture {
                        url: url.to_string(),
                        title,
                        content: text,
                    });
                }
                Err(e) => {
                    warn!(%url, error = %e, "content extraction failed");
                    outcome
                        .page_errors
                        .push(SourceError::unreachable(url.to_string(), e.to_string()));
                }
            }
        }

        info!(
            pages = outcome.pages.len(),
            errors = outcome.page_errors.len(),
            fetched = outcome.pages_fetched,
            "crawl complete"
        );

        Ok(outcome)
    }

    /// Probe feeds/sitemaps and enqueue discovered posts at depth 1.
    async fn preseed_from_discovery(
        &self,
        seed: &Url,
        frontier: &mut VecDeque<(Url, u32)>,
        enqueued: &mut HashSet<String>,
    ) {
        let opts = DiscoveryOptions::default();
        match sourcemill_discovery::discover(seed, &opts).await {
            Ok(DiscoveryResult::Found { urls, method }) => {
                info!(%method, count = urls.len(), "pre-seeding frontier from discovery");
                for url in urls {
                    if frontier.len() >= self.config.frontier_cap {
                        break;
                    }
                    if enqueued.insert(normalize_url(&url)) {
                        frontier.push_back((url, 1));
                    }
                }
            }
            Ok(DiscoveryResult::NotFound) => {
                debug!("no feed or sitemap, proceeding with link expansion");
            }
            Err(e) => {
                debug!(error = %e, "discovery failed, proceeding with link expansion");
            }
        }
    }

    /// Fetch one page body, enforcing status and content-type checks.
    async fn fetch_page(&self, url: &Url) -> Result<String, String> {
        let _permit = match &self.fetch_slots {
            Some(slots) => Some(
                slots
                    .acquire()
                    .await
                    .map_err(|_| "fetch limiter closed".to_string())?,
            ),
            None => None,
        };

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
                return Err(format!("unsupported content type: {content_type}"));
            }
        }

        response
            .text()
            .await
            .map_err(|e| format!("body read failed: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Link extraction & URL handling
// ---------------------------------------------------------------------------

/// Extract candidate links from a page, resolved against its URL with
/// fragments stripped. Anchors, `javascript:` and `mailto:` are skipped.
pub(crate) fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:")
            {
                continue;
            }

            if let Ok(mut resolved) = base_url.join(href) {
                resolved.set_fragment(None);
                links.push(resolved);
            }
        }
    }

    links
}

/// Whether two URLs share scheme, host, and (default-resolved) port.
pub(crate) fn same_origin(url: &Url, other: &Url) -> bool {
    url.scheme() == other.scheme()
        && url.host_str() == other.host_str()
        && url.port_or_known_default() == other.port_or_known_default()
}

/// Normalize a URL for deduplication (strip fragment, trailing slash,
/// except for the bare root path).
pub(crate) fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}

/// SHA-256 hash of extracted content, for duplicate suppression.
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Private-address guard
// ---------------------------------------------------------------------------

/// Check if a URL targets a loopback/private/reserved address. Crawling is
/// driven by caller-supplied URLs, so internal addresses are refused unless
/// explicitly allowed.
pub(crate) fn is_private_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        if host == "localhost"
            || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
