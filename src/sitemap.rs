//! Sitemap XML parsing.
//!
//! The platform publishes a sitemap index (`<sitemapindex>`) whose
//! `<sitemap><loc>` entries point at per-type sitemaps (`<urlset>` with
//! `<url><loc>` entries). Both shapes reduce to an ordered list of `loc`
//! values under a given parent element.

use quick_xml::events::Event;
use quick_xml::Reader;

/// Sub-sitemaps listed in a sitemap index.
pub fn parse_sitemap_index(xml: &str) -> Result<Vec<String>, String> {
    collect_locs(xml, "sitemap")
}

/// Page URLs listed in a sitemap.
pub fn parse_urlset(xml: &str) -> Result<Vec<String>, String> {
    collect_locs(xml, "url")
}

fn collect_locs(xml: &str, parent: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locs = Vec::new();
    let mut buf = Vec::new();
    let mut in_parent = false;
    let mut in_loc = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == parent.as_bytes() {
                    in_parent = true;
                } else if name == b"loc" && in_parent {
                    in_loc = true;
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if name == parent.as_bytes() {
                    in_parent = false;
                } else if name == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Text(e)) if in_loc => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                push_loc(&mut locs, &text);
            }
            Ok(Event::CData(e)) if in_loc => {
                let text = std::str::from_utf8(&e).map_err(|e| e.to_string())?;
                push_loc(&mut locs, text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "error at position {}: {}",
                    reader.error_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(locs)
}

fn push_loc(locs: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        locs.push(text.to_string());
    }
}
