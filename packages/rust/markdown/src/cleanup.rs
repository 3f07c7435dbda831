//! Post-conversion cleanup pipeline for Markdown output.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! Raw `htmd` output from scraped blog pages tends to carry stray markup,
//! vendor-prefixed code fences, and excess blank lines.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = md.to_string();

    result = collapse_blank_lines(&result);
    result = fix_code_fence_languages(&result);
    result = strip_stray_html(&result);
    result = resolve_relative_links(&result, base_url);
    result = trim_line_endings(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Collapse blank-line runs
// ---------------------------------------------------------------------------

/// Collapse runs of consecutive blank lines into a single blank separator.
fn collapse_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Fix code fence language hints
// ---------------------------------------------------------------------------

/// Rewrite class-style fence hints (`language-js`, `lang-python`,
/// `highlight-rust`) to their plain language name.
fn fix_code_fence_languages(md: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^```(?:language-|lang-|highlight-)(\w+)").expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(md, "```$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Strip stray HTML tags
// ---------------------------------------------------------------------------

/// Remove container tags that survived the conversion, preserving their
/// inner text. Lines inside code fences are left untouched.
fn strip_stray_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary)(?:\s[^>]*)?>",
        )
        .expect("valid regex")
    });

    let mut out = String::with_capacity(md.len());
    let mut in_fence = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            out.push_str(line);
        } else if in_fence {
            out.push_str(line);
        } else {
            out.push_str(&HTML_TAG_RE.replace_all(line, ""));
        }
        out.push('\n');
    }

    if out.ends_with('\n') {
        out.pop();
    }
    out
}

// ---------------------------------------------------------------------------
// Pass 4: Resolve relative links
// ---------------------------------------------------------------------------

/// Resolve relative URLs in Markdown links against the page URL, so items
/// remain useful once detached from their origin.
fn resolve_relative_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").expect("valid regex"));

    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            let text = &caps[1];
            let href = &caps[2];

            if href.starts_with("http://")
                || href.starts_with("https://")
                || href.starts_with('#')
                || href.starts_with("mailto:")
            {
                return format!("[{text}]({href})");
            }

            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => format!("[{text}]({href})"),
            }
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Trim line endings
// ---------------------------------------------------------------------------

/// Trim trailing whitespace per line and end with exactly one newline.
fn trim_line_endings(md: &str) -> String {
    let joined = md
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    let trimmed = joined.trim_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_blank_lines_single_separator() {
        let input = "Line 1\n\n\n\n\nLine 2";
        assert_eq!(collapse_blank_lines(input), "Line 1\n\nLine 2");
    }

    #[test]
    fn collapse_blank_lines_keeps_single_blank() {
        let input = "Line 1\n\nLine 2";
        assert_eq!(collapse_blank_lines(input), input);
    }

    #[test]
    fn fence_language_prefix_stripped() {
        let input = "```language-javascript\nconsole.log('hi');\n```";
        let result = fix_code_fence_languages(input);
        assert!(result.starts_with("```javascript"));
    }

    #[test]
    fn fence_plain_language_untouched() {
        let input = "```rust\nfn main() {}\n```";
        assert_eq!(fix_code_fence_languages(input), input);
    }

    #[test]
    fn stray_div_removed_content_kept() {
        let input = "# Title\n\n<div class=\"note\">Important info</div>\n\nMore text";
        let result = strip_stray_html(input);
        assert!(result.contains("Important info"));
        assert!(!result.contains("<div"));
    }

    #[test]
    fn stray_html_kept_inside_fences() {
        let input = "```html\n<div>Preserved</div>\n```";
        let result = strip_stray_html(input);
        assert!(result.contains("<div>Preserved</div>"));
    }

    #[test]
    fn relative_link_resolved() {
        let base = Url::parse("https://blog.example.com/posts/intro").unwrap();
        let input = "[Next](/posts/next)";
        let result = resolve_relative_links(input, Some(&base));
        assert_eq!(result, "[Next](https://blog.example.com/posts/next)");
    }

    #[test]
    fn absolute_link_untouched() {
        let base = Url::parse("https://blog.example.com/").unwrap();
        let input = "[Link](https://other.com/page)";
        assert_eq!(
            resolve_relative_links(input, Some(&base)),
            "[Link](https://other.com/page)"
        );
    }

    #[test]
    fn anchor_link_untouched() {
        let base = Url::parse("https://blog.example.com/page").unwrap();
        let input = "[Section](#section-1)";
        assert_eq!(resolve_relative_links(input, Some(&base)), input);
    }

    #[test]
    fn line_endings_trimmed() {
        let input = "Line 1   \nLine 2\t\nLine 3\n\n\n";
        assert_eq!(trim_line_endings(input), "Line 1\nLine 2\nLine 3\n");
    }

    #[test]
    fn full_pipeline_cleans_markdown() {
        let input = "# Title\n\n\n\n\n## Section\n\n<div>Some content</div>\n\n```language-python\nprint('hi')\n```\n\nEnd";
        let base = Url::parse("https://example.com/page").unwrap();
        let result = run_pipeline(input, Some(&base));

        assert!(!result.contains("\n\n\n"));
        assert!(result.contains("```python"));
        assert!(!result.contains("<div>"));
        assert!(result.contains("Some content"));
        assert!(result.ends_with('\n'));
    }
}
