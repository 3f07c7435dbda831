//! RSS/Atom feed and XML sitemap parsers.
//!
//! Both parsers are tolerant event loops: they pull candidate URLs out of
//! whatever well-formed-enough XML the site serves and leave validation
//! (origin checks, URL parsing) to the caller. A parse failure mid-document
//! returns whatever was collected up to that point.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Extract post URLs from an RSS 2.0 or Atom feed.
///
/// RSS carries `<item><link>URL</link></item>`; Atom carries
/// `<entry><link href="URL"/></entry>` where only `rel="alternate"`
/// (or no `rel`) links point at the post itself.
pub fn parse_feed(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut in_item = false;
    let mut in_link = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_item = true,
                b"link" if in_item => {
                    // Atom links carry their target as an attribute.
                    if let Some(href) = link_href(&e) {
                        urls.push(href);
                    } else {
                        in_link = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_item && e.local_name().as_ref() == b"link" {
                    if let Some(href) = link_href(&e) {
                        urls.push(href);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if in_link {
                    if let Ok(text) = t.unescape() {
                        push_nonempty(&mut urls, text.trim());
                    }
                    in_link = false;
                }
            }
            Ok(Event::CData(t)) => {
                if in_link {
                    let raw = t.into_inner();
                    let text = String::from_utf8_lossy(&raw).trim().to_string();
                    push_nonempty(&mut urls, &text);
                    in_link = false;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_item = false,
                b"link" => in_link = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    urls
}

/// Extract `<loc>` URLs from a sitemap `urlset` (or sitemap index).
pub fn parse_sitemap(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = true;
                }
            }
            Ok(Event::Text(t)) => {
                if in_loc {
                    if let Ok(text) = t.unescape() {
                        push_nonempty(&mut urls, text.trim());
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    urls
}

/// Read the `href` attribute of an Atom `<link>`, honoring `rel`.
fn link_href(e: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut alternate = true;

    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => {
                href = attr.unescape_value().ok().map(|v| v.into_owned());
            }
            b"rel" => {
                if let Ok(rel) = attr.unescape_value() {
                    alternate = rel == "alternate";
                }
            }
            _ => {}
        }
    }

    if alternate { href } else { None }
}

fn push_nonempty(urls: &mut Vec<String>, candidate: &str) {
    if !candidate.is_empty() {
        urls.push(candidate.to_string());
    }
}
