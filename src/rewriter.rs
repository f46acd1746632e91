use anyhow::{Context, Result};
use markup5ever_rcdom::Handle;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use url::Url;

use crate::asset_cache::AssetCache;
use crate::file_manager;
use crate::html_parser::{attr, elements, is_element, replace_text, set_attr, tag_name, text_of};
use crate::site::{self, Site};

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)url\(([^)]+)\)").expect("url() pattern"));

static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:url\()?['"]?([^'")]+)['"]?\)?"#).expect("@import pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Url,
    Import,
}

/// A `url(...)` or `@import` occurrence in stylesheet text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssReference {
    pub start: usize,
    pub end: usize,
    pub target: String,
    pub kind: ReferenceKind,
}

/// Find every `url(...)` and `@import` reference, in text order.
///
/// An `@import url(...)` is reported once, as its `url(...)`.
pub fn scan_stylesheet(text: &str) -> Vec<CssReference> {
    let mut references: Vec<CssReference> = URL_PATTERN
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let inner = cap.get(1)?;
            Some(CssReference {
                start: whole.start(),
                end: whole.end(),
                target: strip_quotes(inner.as_str().trim()).to_string(),
                kind: ReferenceKind::Url,
            })
        })
        .collect();

    let imports: Vec<CssReference> = IMPORT_PATTERN
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let inner = cap.get(1)?;
            let covered = references
                .iter()
                .any(|r| r.start < whole.end() && whole.start() < r.end);
            (!covered).then(|| CssReference {
                start: whole.start(),
                end: whole.end(),
                target: inner.as_str().trim().to_string(),
                kind: ReferenceKind::Import,
            })
        })
        .collect();

    references.extend(imports);
    references.sort_by_key(|r| r.start);
    references
}

fn strip_quotes(raw: &str) -> &str {
    let quotes: &[char] = &['\'', '"'];
    let raw = raw.strip_prefix(quotes).unwrap_or(raw);
    raw.strip_suffix(quotes).unwrap_or(raw)
}

/// A `srcset` candidate: the URL and whatever width/density descriptor follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetCandidate<'a> {
    pub raw: &'a str,
    pub url: &'a str,
    pub descriptor: Option<&'a str>,
}

pub fn split_srcset(raw: &str) -> Vec<SrcsetCandidate<'_>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut pieces = part.splitn(2, char::is_whitespace);
            let url = pieces.next().unwrap_or(part);
            let descriptor = pieces.next().map(str::trim).filter(|d| !d.is_empty());
            SrcsetCandidate {
                raw: part,
                url,
                descriptor,
            }
        })
        .collect()
}

/// Detach the fragment so `icons.svg#a` and `icons.svg#b` share one download.
fn split_fragment(mut url: Url) -> (Url, String) {
    let fragment = url
        .fragment()
        .filter(|f| !f.is_empty())
        .map(|f| format!("#{}", f))
        .unwrap_or_default();
    url.set_fragment(None);
    (url, fragment)
}

/// Path from a stylesheet's directory to `target`, with forward slashes.
fn relative_reference(stylesheet: &Path, target: &Path) -> String {
    let from_dir = stylesheet.parent().unwrap_or_else(|| Path::new(""));
    match pathdiff::diff_paths(target, from_dir) {
        Some(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        None => target.to_string_lossy().into_owned(),
    }
}

/// Rewrites references to internal resources so they point at local copies.
pub struct Rewriter<'a> {
    cache: &'a AssetCache,
}

impl<'a> Rewriter<'a> {
    pub fn new(cache: &'a AssetCache) -> Self {
        Self { cache }
    }

    fn site(&self) -> &Site {
        self.cache.site()
    }

    /// Rewrite a downloaded stylesheet in place. Returns whether it changed.
    pub async fn rewrite_stylesheet_file(&self, path: &Path, stylesheet_url: &Url) -> Result<bool> {
        let Some(_guard) = self.cache.begin_stylesheet(path) else {
            return Ok(false);
        };

        let bytes = fs::read(path).with_context(|| format!("Failed to read stylesheet: {:?}", path))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let updated = self
            .rewrite_stylesheet_text(&text, stylesheet_url, Some(path))
            .await;

        if updated == text {
            return Ok(false);
        }
        file_manager::write_file(path, updated.as_bytes())?;
        Ok(true)
    }

    /// Replace internal `url(...)` and `@import` targets with local paths.
    ///
    /// With a stylesheet file, replacements are relative to that file so the
    /// mirrored tree can be moved; without one (inline `<style>`), they are
    /// absolute public paths. Text without internal references comes back
    /// unchanged.
    pub async fn rewrite_stylesheet_text(
        &self,
        text: &str,
        base_url: &Url,
        stylesheet: Option<&Path>,
    ) -> String {
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;

        for reference in scan_stylesheet(text) {
            if reference.start < cursor {
                continue;
            }
            let Some(local) = self
                .localize_css_reference(&reference.target, base_url, stylesheet)
                .await
            else {
                continue;
            };

            output.push_str(&text[cursor..reference.start]);
            match reference.kind {
                ReferenceKind::Url => output.push_str(&format!("url({})", local)),
                ReferenceKind::Import => output.push_str(&format!("@import url({})", local)),
            }
            cursor = reference.end;
        }

        if cursor == 0 {
            return text.to_string();
        }
        output.push_str(&text[cursor..]);
        output
    }

    async fn localize_css_reference(
        &self,
        target: &str,
        base_url: &Url,
        stylesheet: Option<&Path>,
    ) -> Option<String> {
        if site::is_skippable(target) || self.site().is_mirrored_path(target) {
            return None;
        }
        let resolved = site::resolve(target, base_url)?;
        if !self.site().is_internal(&resolved) {
            return None;
        }

        let (resolved, fragment) = split_fragment(resolved);
        let paths = self.cache.resolve(&resolved).await;
        let local = match stylesheet {
            Some(stylesheet) => relative_reference(stylesheet, &paths.fs_path),
            None => paths.public_path,
        };
        Some(local + &fragment)
    }

    /// Public path of the local copy of an internal resource reference.
    async fn localize_asset(&self, raw: &str, page_url: &Url) -> Option<String> {
        if site::is_skippable(raw) || self.site().is_mirrored_path(raw) {
            return None;
        }
        let resolved = site::resolve(raw, page_url)?;
        if !self.site().is_internal(&resolved) {
            return None;
        }
        let (resolved, fragment) = split_fragment(resolved);
        Some(self.cache.resolve(&resolved).await.public_path + &fragment)
    }

    /// New value for an `href`, or `None` to leave it alone.
    ///
    /// Internal files are mirrored like `src`; internal hyperlinks become
    /// route paths with their query and fragment kept.
    pub async fn rewrite_href(&self, tag: &str, raw: &str, page_url: &Url) -> Option<String> {
        if site::is_skippable(raw) || self.site().is_mirrored_path(raw) {
            return None;
        }
        let resolved = site::resolve(raw, page_url)?;
        if !self.site().is_internal(&resolved) {
            return None;
        }

        if site::looks_like_asset(&resolved) {
            let (resolved, fragment) = split_fragment(resolved);
            return Some(self.cache.resolve(&resolved).await.public_path + &fragment);
        }
        if !tag.eq_ignore_ascii_case("a") {
            return None;
        }

        let route = self
            .site()
            .prefix_base_path(&site::normalize_path(resolved.path()));
        let query = resolved
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{}", q))
            .unwrap_or_default();
        let fragment = resolved
            .fragment()
            .filter(|f| !f.is_empty())
            .map(|f| format!("#{}", f))
            .unwrap_or_default();
        Some(format!("{}{}{}", route, query, fragment))
    }

    /// Rewrite the URL part of each internal `srcset` candidate.
    /// `None` when no candidate changed.
    pub async fn rewrite_srcset(&self, raw: &str, page_url: &Url) -> Option<String> {
        let mut changed = false;
        let mut rewritten = Vec::new();

        for candidate in split_srcset(raw) {
            match self.localize_asset(candidate.url, page_url).await {
                Some(local) => {
                    changed = true;
                    rewritten.push(match candidate.descriptor {
                        Some(descriptor) => format!("{} {}", local, descriptor),
                        None => local,
                    });
                }
                None => rewritten.push(candidate.raw.to_string()),
            }
        }

        changed.then(|| rewritten.join(", "))
    }

    /// Rewrite `src`, `href`, `srcset` and inline `<style>` blocks across a
    /// parsed document.
    pub async fn rewrite_dom(&self, document: &Handle, page_url: &Url) {
        let all = elements(document);

        for element in &all {
            let Some(raw) = attr(element, "src") else { continue };
            if let Some(local) = self.localize_asset(&raw, page_url).await {
                set_attr(element, "src", &local);
            }
        }

        for element in &all {
            let Some(raw) = attr(element, "href") else { continue };
            let tag = tag_name(element).unwrap_or_default();
            if let Some(href) = self.rewrite_href(&tag, &raw, page_url).await {
                set_attr(element, "href", &href);
            }
        }

        for element in &all {
            let Some(raw) = attr(element, "srcset") else { continue };
            if let Some(srcset) = self.rewrite_srcset(&raw, page_url).await {
                set_attr(element, "srcset", &srcset);
            }
        }

        for element in all.iter().filter(|e| is_element(e, "style")) {
            let css = text_of(element);
            if css.trim().is_empty() {
                continue;
            }
            let updated = self.rewrite_stylesheet_text(&css, page_url, None).await;
            if updated != css {
                replace_text(element, &updated);
            }
        }
    }
}
