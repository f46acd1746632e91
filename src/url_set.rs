use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{MirrorConfig, USERS_SITEMAP_MARKER};
use crate::error::MirrorError;
use crate::fetcher::Fetcher;
use crate::site::{self, Site};
use crate::sitemap;

/// Ordered list of URLs with exact-string deduplication.
#[derive(Debug, Default, Clone)]
pub struct UrlList {
    urls: Vec<Url>,
    seen: HashSet<String>,
}

impl UrlList {
    pub fn push(&mut self, url: Url) -> bool {
        if self.seen.insert(url.as_str().to_string()) {
            self.urls.push(url);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.seen.contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.urls.iter()
    }

    pub fn into_vec(self) -> Vec<Url> {
        self.urls
    }
}

impl FromIterator<Url> for UrlList {
    fn from_iter<I: IntoIterator<Item = Url>>(iter: I) -> Self {
        let mut list = UrlList::default();
        for url in iter {
            list.push(url);
        }
        list
    }
}

/// Derives translated-page candidates from pages matching a path pattern.
#[derive(Debug, Clone)]
pub struct VariantRule {
    pattern: Regex,
    prefix: String,
}

impl VariantRule {
    pub fn new(pattern: &str, prefix: &str) -> Result<Self, MirrorError> {
        let compiled = Regex::new(pattern).map_err(|source| MirrorError::VariantPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            prefix: prefix.trim_matches('/').to_string(),
        })
    }

    /// The variant URL for `url`, if the page qualifies for one.
    pub fn candidate(&self, site: &Site, url: &Url) -> Option<Url> {
        if !site.is_internal(url) {
            return None;
        }
        let path = url.path();
        if path.starts_with(&format!("/{}/", self.prefix)) || !self.pattern.is_match(path) {
            return None;
        }
        let variant_path = format!("/{}{}", self.prefix, site::normalize_path(path));
        site.base_url().join(&variant_path).ok()
    }
}

/// Builds the final, ordered list of pages to mirror.
pub struct UrlSetBuilder<'a> {
    site: &'a Site,
    fetcher: &'a Fetcher,
    config: &'a MirrorConfig,
}

impl<'a> UrlSetBuilder<'a> {
    pub fn new(site: &'a Site, fetcher: &'a Fetcher, config: &'a MirrorConfig) -> Self {
        Self {
            site,
            fetcher,
            config,
        }
    }

    pub async fn build(&self) -> Result<Vec<Url>> {
        let urls = self.load_sitemap_urls().await?;
        info!(count = urls.len(), "sitemap pages found");

        let urls = self.add_extra_urls(urls);
        let urls = if self.config.auto_variants {
            let rule = VariantRule::new(&self.config.variant_pattern, &self.config.variant_prefix)?;
            self.add_language_variants(urls, &rule).await
        } else {
            urls
        };

        let mut urls = filter_excluded(urls, &self.config.exclude_paths).into_vec();
        if let Some(limit) = self.config.page_limit() {
            urls.truncate(limit);
        }
        info!(count = urls.len(), "pages to mirror");
        Ok(urls)
    }

    /// Every page listed in the sitemap index's sub-sitemaps, in first-seen order.
    pub async fn load_sitemap_urls(&self) -> Result<UrlList, MirrorError> {
        let index_url = self.site.sitemap_index_url()?;
        let index_xml = self.fetch_sitemap(&index_url).await?;
        let sitemaps = sitemap::parse_sitemap_index(&index_xml).map_err(|reason| {
            MirrorError::SitemapParse {
                url: index_url.to_string(),
                reason,
            }
        })?;

        let mut pages = UrlList::default();
        for loc in sitemaps {
            if loc.contains(USERS_SITEMAP_MARKER) {
                debug!(sitemap = %loc, "skipping users sitemap");
                continue;
            }
            let sitemap_url = index_url
                .join(&loc)
                .map_err(|e| MirrorError::SitemapParse {
                    url: loc.clone(),
                    reason: e.to_string(),
                })?;

            let xml = self.fetch_sitemap(&sitemap_url).await?;
            let locs = sitemap::parse_urlset(&xml).map_err(|reason| MirrorError::SitemapParse {
                url: sitemap_url.to_string(),
                reason,
            })?;
            for page in locs {
                match Url::parse(&page) {
                    Ok(url) => {
                        pages.push(url);
                    }
                    Err(e) => warn!(url = %page, error = %e, "skipping invalid sitemap entry"),
                }
            }
        }

        Ok(pages)
    }

    async fn fetch_sitemap(&self, url: &Url) -> Result<String, MirrorError> {
        self.fetcher
            .fetch_text(url)
            .await
            .map_err(|source| MirrorError::Sitemap {
                url: url.to_string(),
                source: Box::new(source),
            })
    }

    /// Union in operator-supplied URLs and paths. Invalid entries are dropped.
    pub fn add_extra_urls(&self, mut urls: UrlList) -> UrlList {
        for extra in &self.config.extra_urls {
            match Url::parse(extra) {
                Ok(url) => {
                    urls.push(url);
                }
                Err(_) => warn!(entry = %extra, "skipping invalid extra URL"),
            }
        }

        for extra_path in &self.config.extra_paths {
            let normalized = if extra_path.starts_with('/') {
                extra_path.clone()
            } else {
                format!("/{}", extra_path)
            };
            match self.site.base_url().join(&normalized) {
                Ok(url) => {
                    urls.push(url);
                }
                Err(_) => warn!(entry = %extra_path, "skipping invalid extra path"),
            }
        }

        urls
    }

    /// Probe for translated twins of qualifying pages and keep those that exist.
    pub async fn add_language_variants(&self, mut urls: UrlList, rule: &VariantRule) -> UrlList {
        let mut candidates = UrlList::default();
        for url in urls.iter() {
            if let Some(candidate) = rule.candidate(self.site, url) {
                if !urls.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }

        for candidate in candidates.into_vec() {
            let probe = self.fetcher.probe(&candidate).await;
            debug!(url = %candidate, probe = ?probe, "variant probe");
            if probe.exists() {
                urls.push(candidate);
            }
        }

        urls
    }
}

/// Drop URLs whose normalized path is excluded.
pub fn filter_excluded(urls: UrlList, exclude_paths: &[String]) -> UrlList {
    if exclude_paths.is_empty() {
        return urls;
    }
    let excluded: HashSet<String> = exclude_paths
        .iter()
        .map(|path| site::normalize_path(path))
        .collect();

    urls.into_vec()
        .into_iter()
        .filter(|url| !excluded.contains(&site::normalize_path(url.path())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site {
        Site::new("https://example.org", "", "/remote-assets").unwrap()
    }

    fn list(urls: &[&str]) -> UrlList {
        urls.iter().map(|u| Url::parse(u).unwrap()).collect()
    }

    fn strings(urls: &UrlList) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_url_list_deduplicates_in_order() {
        let urls = list(&[
            "https://example.org/b/",
            "https://example.org/a/",
            "https://example.org/b/",
        ]);
        assert_eq!(strings(&urls), vec!["https://example.org/b/", "https://example.org/a/"]);
    }

    #[test]
    fn test_exclusion_ignores_trailing_slash_variation() {
        let urls = list(&[
            "https://example.org/category/sin-categoria",
            "https://example.org/category/sin-categoria/",
            "https://example.org/category/noticias/",
        ]);
        let filtered = filter_excluded(urls, &["category/sin-categoria".to_string()]);
        assert_eq!(strings(&filtered), vec!["https://example.org/category/noticias/"]);
    }

    #[test]
    fn test_exclusion_without_rules_keeps_everything() {
        let urls = list(&["https://example.org/a/"]);
        assert_eq!(filter_excluded(urls, &[]).len(), 1);
    }

    #[test]
    fn test_extra_urls_and_paths() {
        let site = site();
        let fetcher = Fetcher::new("SiteMirror/test", None).unwrap();
        let mut config = MirrorConfig::new("https://example.org", "content", "public");
        config.extra_urls = vec![
            "https://example.org/extra/".to_string(),
            "not a url".to_string(),
        ];
        config.extra_paths = vec!["en/contacto/".to_string(), "/en/".to_string()];

        let builder = UrlSetBuilder::new(&site, &fetcher, &config);
        let urls = builder.add_extra_urls(list(&["https://example.org/en/"]));

        assert_eq!(
            strings(&urls),
            vec![
                "https://example.org/en/",
                "https://example.org/extra/",
                "https://example.org/en/contacto/",
            ]
        );
    }

    #[test]
    fn test_variant_candidates() {
        let site = site();
        let rule = VariantRule::new(crate::config::DEFAULT_VARIANT_PATTERN, "en").unwrap();

        let candidate = |raw: &str| rule.candidate(&site, &Url::parse(raw).unwrap()).map(|u| u.to_string());

        assert_eq!(
            candidate("https://example.org/articulo-demo/").as_deref(),
            Some("https://example.org/en/articulo-demo/")
        );
        assert_eq!(
            candidate("https://example.org/articulo-demo").as_deref(),
            Some("https://example.org/en/articulo-demo/")
        );
        assert_eq!(candidate("https://example.org/en/articulo-demo/"), None);
        assert_eq!(candidate("https://example.org/contacto/"), None);
        assert_eq!(candidate("https://example.org/articulo-demo/comments/"), None);
        assert_eq!(candidate("https://other.org/articulo-demo/"), None);
    }

    #[test]
    fn test_custom_variant_rule() {
        let site = site();
        let rule = VariantRule::new(r"^/proyecto-[^/]+/?$", "/fr/").unwrap();
        let url = Url::parse("https://example.org/proyecto-agua/").unwrap();
        assert_eq!(
            rule.candidate(&site, &url).map(|u| u.to_string()).as_deref(),
            Some("https://example.org/fr/proyecto-agua/")
        );
    }

    #[test]
    fn test_invalid_variant_pattern() {
        assert!(matches!(
            VariantRule::new("(unclosed", "en"),
            Err(MirrorError::VariantPattern { .. })
        ));
    }
}
