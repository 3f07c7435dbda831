//! Readable-content extraction and Markdown rendering.
//!
//! Turns a fetched HTML page into clean Markdown body text using the `htmd`
//! crate plus a series of cleanup passes, and renders a finished
//! [`IngestionResult`] back into a single Markdown document for callers
//! that want a file instead of JSON.

mod cleanup;

use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use sourcemill_shared::{IngestionResult, Result, SourcemillError};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of extracting readable content from an HTML page.
#[derive(Debug, Clone)]
pub struct ReadableContent {
    /// Title from `<title>`, else the first `<h1>`; `None` if neither
    /// yields text (the caller falls back to the page URL).
    pub title: Option<String>,
    /// Clean Markdown body. May be empty for content-free pages;
    /// the caller decides whether an empty body is an error.
    pub markdown: String,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the readable body of an HTML page as Markdown.
///
/// 1. Locates the main content container (blog-aware selector list)
/// 2. Converts HTML → Markdown via `htmd`, skipping chrome tags
/// 3. Runs the cleanup pipeline (blank lines, stray HTML, relative links)
#[instrument(skip(html), fields(url = %page_url))]
pub fn extract_readable(html: &str, page_url: &Url) -> Result<ReadableContent> {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc);
    let content_html = content_container_html(&doc, html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "svg",
            "form",
        ])
        .build();

    let raw = converter
        .convert(&content_html)
        .map_err(|e| SourcemillError::Conversion(format!("htmd conversion failed: {e}")))?;

    let markdown = cleanup::run_pipeline(&raw, Some(page_url));

    debug!(
        title = title.as_deref().unwrap_or("<none>"),
        len = markdown.len(),
        "readable extraction complete"
    );

    Ok(ReadableContent { title, markdown })
}

/// Pull a page title out of `<title>`, falling back to the first `<h1>`.
fn extract_title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").expect("valid selector");
    if let Some(el) = doc.select(&title_sel).next() {
        let text = el.text().collect::<String>();
        let text = text.trim();
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    let h1_sel = Selector::parse("h1").expect("valid selector");
    doc.select(&h1_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

/// Find the HTML of the main content container, stripping page chrome.
///
/// Tries blog/article containers in priority order; falls back to `<body>`,
/// then the raw document.
fn content_container_html(doc: &Html, raw: &str) -> String {
    let selectors = [
        "article",
        "main",
        "[role=\"main\"]",
        ".post-content",
        ".entry-content",
        ".blog-post",
        ".content",
    ];

    for sel_str in &selectors {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = doc.select(&body_sel).next() {
            return body.inner_html();
        }
    }

    raw.to_string()
}

// ---------------------------------------------------------------------------
// Result rendering
// ---------------------------------------------------------------------------

/// Render an [`IngestionResult`] as one Markdown document.
///
/// Each item becomes `# {title}` followed by its content; items are joined
/// with a horizontal rule, matching what the web client produces from the
/// JSON payload.
pub fn render_result(result: &IngestionResult) -> String {
    let mut sections: Vec<String> = result
        .items
        .iter()
        .map(|item| format!("# {}\n\n{}", item.title, item.content.trim_end()))
        .collect();

    if !result.errors.is_empty() {
        let mut section = String::from("# Errors\n");
        for err in &result.errors {
            section.push_str(&format!("\n- `{}`: {}", err.source_id, err.message));
        }
        sections.push(section);
    }

    let mut out = sections.join("\n\n---\n\n");
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sourcemill_shared::{KnowledgeItem, RequestId, SourceError};

    fn page_url() -> Url {
        Url::parse("https://blog.example.com/posts/hello").unwrap()
    }

    #[test]
    fn extract_simple_article() {
        let html = "<html><head><title>Hello Post</title></head><body>\
                    <article><h1>Hello</h1><p>First paragraph.</p></article>\
                    </body></html>";
        let content = extract_readable(html, &page_url()).unwrap();

        assert_eq!(content.title.as_deref(), Some("Hello Post"));
        assert!(content.markdown.contains("# Hello"));
        assert!(content.markdown.contains("First paragraph."));
    }

    #[test]
    fn extract_title_falls_back_to_h1() {
        let html = "<html><body><main><h1>Only Heading</h1><p>Text</p></main></body></html>";
        let content = extract_readable(html, &page_url()).unwrap();
        assert_eq!(content.title.as_deref(), Some("Only Heading"));
    }

    #[test]
    fn extract_no_title_is_none() {
        let html = "<html><body><p>Just a paragraph.</p></body></html>";
        let content = extract_readable(html, &page_url()).unwrap();
        assert!(content.title.is_none());
        assert!(content.markdown.contains("Just a paragraph."));
    }

    #[test]
    fn extract_strips_nav_and_footer() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a><a href="/about">About</a></nav>
            <article><h1>Post</h1><p>Real content.</p></article>
            <footer><p>Copyright 2025</p></footer>
        </body></html>"#;

        let content = extract_readable(html, &page_url()).unwrap();
        assert!(content.markdown.contains("Real content."));
        assert!(!content.markdown.contains("Copyright 2025"));
    }

    #[test]
    fn extract_drops_script_and_style() {
        let html = r#"<html><body><article>
            <h1>Post</h1>
            <script>trackVisitor();</script>
            <style>.hidden { display: none; }</style>
            <p>Visible text.</p>
        </article></body></html>"#;

        let content = extract_readable(html, &page_url()).unwrap();
        assert!(content.markdown.contains("Visible text."));
        assert!(!content.markdown.contains("trackVisitor"));
        assert!(!content.markdown.contains("display: none"));
    }

    #[test]
    fn extract_resolves_relative_links() {
        let html = r#"<html><body><article>
            <p>See <a href="/other-post">the other post</a>.</p>
        </article></body></html>"#;

        let content = extract_readable(html, &page_url()).unwrap();
        assert!(
            content
                .markdown
                .contains("(https://blog.example.com/other-post)")
        );
    }

    #[test]
    fn extract_empty_page_yields_empty_markdown() {
        let html = "<html><body></body></html>";
        let content = extract_readable(html, &page_url()).unwrap();
        assert!(content.markdown.trim().is_empty());
    }

    #[test]
    fn extract_preserves_code_blocks() {
        let html = r#"<html><body><article>
            <h1>Snippet</h1>
            <pre><code class="language-rust">fn main() {}</code></pre>
        </article></body></html>"#;

        let content = extract_readable(html, &page_url()).unwrap();
        assert!(content.markdown.contains("```rust"));
        assert!(content.markdown.contains("fn main() {}"));
    }

    // --- render_result ---

    fn item(title: &str, content: &str) -> KnowledgeItem {
        KnowledgeItem {
            title: title.into(),
            content: content.into(),
            source_id: "notes.pdf".into(),
            team_id: "team_1".into(),
        }
    }

    #[test]
    fn render_joins_items_with_rule() {
        let result = IngestionResult {
            request_id: RequestId::new(),
            items: vec![item("One", "First body."), item("Two", "Second body.")],
            errors: vec![],
            timed_out: false,
        };

        let md = render_result(&result);
        assert!(md.starts_with("# One\n\nFirst body."));
        assert!(md.contains("\n\n---\n\n# Two"));
        assert!(md.ends_with("Second body.\n"));
    }

    #[test]
    fn render_includes_errors_section() {
        let result = IngestionResult {
            request_id: RequestId::new(),
            items: vec![item("One", "Body.")],
            errors: vec![SourceError::unreachable("https://x.test/p", "HTTP 500")],
            timed_out: false,
        };

        let md = render_result(&result);
        assert!(md.contains("# Errors"));
        assert!(md.contains("`https://x.test/p`: HTTP 500"));
    }

    #[test]
    fn render_empty_result_is_empty() {
        let result = IngestionResult::empty(RequestId::new());
        assert_eq!(render_result(&result), "");
    }
}
