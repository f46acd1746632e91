use anyhow::{Context, Result};
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document, Attribute, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use url::Url;

use crate::asset_cache::AssetCache;
use crate::document::{AttrMap, PageDocument, ScriptDescriptor};
use crate::fetcher::Fetcher;
use crate::rewriter::Rewriter;
use crate::site;

/// Fetches pages and captures their structure after rewriting.
pub struct HtmlParser<'a> {
    fetcher: &'a Fetcher,
    cache: &'a AssetCache,
}

impl<'a> HtmlParser<'a> {
    pub fn new(fetcher: &'a Fetcher, cache: &'a AssetCache) -> Self {
        Self { fetcher, cache }
    }

    /// Fetch and capture one page. A page that cannot be fetched is an error.
    pub async fn scrape(&self, url: &Url) -> Result<PageDocument> {
        let html = self
            .fetcher
            .fetch_text(url)
            .await
            .with_context(|| format!("Failed to scrape page: {}", url))?;
        self.capture(url, &html).await
    }

    /// Rewrite already-fetched markup as if it were served at `url` and
    /// capture its structure.
    pub async fn capture(&self, url: &Url, html: &str) -> Result<PageDocument> {
        let dom = parse_html(html);
        Rewriter::new(self.cache).rewrite_dom(&dom.document, url).await;
        extract_document(&dom.document, site::route_for(url))
    }
}

pub fn parse_html(html: &str) -> RcDom {
    parse_document(RcDom::default(), ParseOpts::default()).one(html)
}

/// Capture title, head descriptors, body markup and root attributes.
pub fn extract_document(document: &Handle, route: String) -> Result<PageDocument> {
    let head = find_first(document, "head");
    let body = find_first(document, "body");
    let root = find_first(document, "html");

    let head_elements = |tag: &str| -> Vec<Handle> {
        head.as_ref()
            .map(|head| {
                elements(head)
                    .into_iter()
                    .filter(|e| is_element(e, tag))
                    .collect()
            })
            .unwrap_or_default()
    };

    let title = head_elements("title")
        .first()
        .map(|t| text_of(t).trim().to_string())
        .unwrap_or_default();
    let meta = head_elements("meta").iter().map(attr_map).collect();
    let links = head_elements("link").iter().map(attr_map).collect();
    let styles = head_elements("style").iter().map(text_of).collect();
    let scripts = head_elements("script")
        .iter()
        .map(|script| {
            let inline = text_of(script).trim().to_string();
            ScriptDescriptor {
                attrs: attr_map(script),
                inline: (!inline.is_empty()).then_some(inline),
            }
        })
        .collect();

    let body_html = match &body {
        Some(body) => inner_html(body)?,
        None => String::new(),
    };

    Ok(PageDocument {
        route,
        title,
        meta,
        links,
        styles,
        scripts,
        body_html,
        body_attrs: body.as_ref().map(attr_map).unwrap_or_default(),
        html_attrs: root.as_ref().map(attr_map).unwrap_or_default(),
    })
}

/// Serialized markup of a node's children.
pub fn inner_html(handle: &Handle) -> Result<String> {
    let mut buf = Vec::new();
    let node: SerializableHandle = handle.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    serialize(&mut buf, &node, opts).context("Failed to serialize markup")?;
    String::from_utf8(buf).context("Serialized markup is not UTF-8")
}

/// Every element under `root` (inclusive), in document order.
pub(crate) fn elements(root: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    collect_elements(root, &mut out);
    out
}

fn collect_elements(handle: &Handle, out: &mut Vec<Handle>) {
    if let NodeData::Element { .. } = handle.data {
        out.push(handle.clone());
    }
    for child in handle.children.borrow().iter() {
        collect_elements(child, out);
    }
}

fn find_first(root: &Handle, tag: &str) -> Option<Handle> {
    elements(root).into_iter().find(|e| is_element(e, tag))
}

pub(crate) fn tag_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub(crate) fn is_element(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, NodeData::Element { name, .. } if &*name.local == tag)
}

fn is_plain(attribute: &Attribute, name: &str) -> bool {
    attribute.name.prefix.is_none() && &*attribute.name.local == name
}

pub(crate) fn attr(handle: &Handle, name: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| is_plain(a, name))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub(crate) fn set_attr(handle: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &handle.data {
        for attribute in attrs.borrow_mut().iter_mut().filter(|a| is_plain(a, name)) {
            attribute.value = StrTendril::from(value);
        }
    }
}

fn attr_map(handle: &Handle) -> AttrMap {
    match &handle.data {
        NodeData::Element { attrs, .. } => AttrMap::from_pairs(attrs.borrow().iter().map(|a| {
            let name = match &a.name.prefix {
                Some(prefix) => format!("{}:{}", prefix, a.name.local),
                None => a.name.local.to_string(),
            };
            (name, a.value.to_string())
        })),
        _ => AttrMap::default(),
    }
}

/// Concatenated text of all descendant text nodes.
pub(crate) fn text_of(handle: &Handle) -> String {
    let mut text = String::new();
    push_text(handle, &mut text);
    text
}

fn push_text(handle: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &handle.data {
        out.push_str(&contents.borrow());
    }
    for child in handle.children.borrow().iter() {
        push_text(child, out);
    }
}

/// Replace an element's text content, keeping its first text node.
pub(crate) fn replace_text(handle: &Handle, text: &str) {
    let mut replaced = false;
    for child in handle.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            let mut contents = contents.borrow_mut();
            if replaced {
                contents.clear();
            } else {
                *contents = StrTendril::from(text);
                replaced = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::AttrValue;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="es-ES" class="no-js">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>  Inicio - Medical Open World  </title>
    <link rel="stylesheet" id="theme-css" href="/remote-assets/wp-content/themes/t/style.css" media="all">
    <style id="inline-css">.hero > h1 { color: #fff; }</style>
    <script src="/remote-assets/wp-includes/js/jquery.js" defer></script>
    <script>  var settings = {"a":1};  </script>
</head>
<body class="home page" data-id="2">
    <h1>Hola</h1>
    <p>Texto &amp; más</p>
    <script>if (a < b) { run(); }</script>
</body>
</html>"#;

    #[test]
    fn test_extract_document() {
        let dom = parse_html(PAGE);
        let page = extract_document(&dom.document, "/".to_string()).unwrap();

        assert_eq!(page.route, "/");
        assert_eq!(page.title, "Inicio - Medical Open World");

        assert_eq!(page.meta.len(), 2);
        assert_eq!(page.meta[0].get("charSet").and_then(AttrValue::as_str), Some("UTF-8"));
        assert_eq!(page.meta[1].get("name").and_then(AttrValue::as_str), Some("viewport"));

        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].get("id").and_then(AttrValue::as_str), Some("theme-css"));

        assert_eq!(page.styles, vec![".hero > h1 { color: #fff; }".to_string()]);

        assert_eq!(page.scripts.len(), 2);
        assert_eq!(page.scripts[0].attrs.get("defer"), Some(&AttrValue::Flag(true)));
        assert_eq!(page.scripts[0].inline, None);
        assert_eq!(page.scripts[1].inline.as_deref(), Some(r#"var settings = {"a":1};"#));

        assert_eq!(page.body_attrs.get("className").and_then(AttrValue::as_str), Some("home page"));
        assert_eq!(page.body_attrs.get("data-id").and_then(AttrValue::as_str), Some("2"));
        assert_eq!(page.html_attrs.get("lang").and_then(AttrValue::as_str), Some("es-ES"));

        assert!(page.body_html.contains("<h1>Hola</h1>"));
        assert!(page.body_html.contains("Texto &amp; más"));
        assert!(page.body_html.contains("if (a < b) { run(); }"));
        assert!(!page.body_html.contains("<body"));
    }

    #[test]
    fn test_fragment_gets_implied_structure() {
        let dom = parse_html("<p>solo</p>");
        let page = extract_document(&dom.document, "/solo/".to_string()).unwrap();
        assert_eq!(page.title, "");
        assert!(page.meta.is_empty());
        assert_eq!(page.body_html, "<p>solo</p>");
        assert!(page.html_attrs.is_empty());
    }

    #[test]
    fn test_attribute_helpers() {
        let dom = parse_html(r#"<img src="/a.png" srcset="/a.png 1x"><style>a{}</style><style></style>"#);
        let all = elements(&dom.document);
        let img = all.iter().find(|e| is_element(e, "img")).unwrap();

        assert_eq!(attr(img, "src").as_deref(), Some("/a.png"));
        set_attr(img, "src", "/remote-assets/a.png");
        assert_eq!(attr(img, "src").as_deref(), Some("/remote-assets/a.png"));
        assert_eq!(attr(img, "alt"), None);
        assert_eq!(tag_name(img).as_deref(), Some("img"));

        let style = all.iter().find(|e| is_element(e, "style")).unwrap();
        replace_text(style, "b{}");
        assert_eq!(text_of(style), "b{}");
    }
}
