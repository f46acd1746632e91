use anyhow::Result;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use tracing::{info, warn};
use url::Url;

use crate::asset_cache::AssetCache;
use crate::config::MirrorConfig;
use crate::fetcher::Fetcher;
use crate::file_manager::{document_path, FileManager, MANIFEST_FILE};
use crate::html_parser::HtmlParser;
use crate::site::{self, Site};
use crate::url_set::UrlSetBuilder;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub routes: Vec<String>,
    pub assets: usize,
}

/// Drives a full mirroring run: discover pages, scrape each one in order,
/// write its document, then write the route manifest.
pub struct WebsiteMirror {
    config: MirrorConfig,
    site: Site,
    fetcher: Fetcher,
    content: FileManager,
    cache: AssetCache,
}

impl WebsiteMirror {
    pub fn new(config: MirrorConfig) -> Result<Self> {
        let site = Site::new(&config.base_url, &config.base_path, &config.asset_prefix)?;
        let fetcher = Fetcher::new(&config.user_agent, config.timeout)?;
        let content = FileManager::new(&config.content_root)?;
        let assets = FileManager::new(&config.public_dir)?;
        let cache = AssetCache::new(site.clone(), fetcher.clone(), assets);

        Ok(Self {
            config,
            site,
            fetcher,
            content,
            cache,
        })
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub async fn discover(&self) -> Result<Vec<Url>> {
        UrlSetBuilder::new(&self.site, &self.fetcher, &self.config)
            .build()
            .await
    }

    /// Run the whole pipeline. Any page failure aborts the run before the
    /// manifest is written.
    pub async fn mirror_site(&self) -> Result<MirrorReport> {
        info!(base_url = %self.site.base_url(), "starting mirror");
        let urls = self.discover().await?;

        let progress_bar = ProgressBar::new(urls.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar().template("{spinner} [{bar:30}] {pos}/{len} {msg}")?,
        );

        let scraper = HtmlParser::new(&self.fetcher, &self.cache);
        let mut routes = Vec::with_capacity(urls.len());
        let mut seen = HashSet::new();

        for url in &urls {
            let route = site::route_for(url);
            if !seen.insert(route.clone()) {
                warn!(url = %url, route = %route, "route already mirrored, skipping");
                progress_bar.inc(1);
                continue;
            }

            progress_bar.set_message(format!("Scraping: {}", url));
            info!(url = %url, route = %route, "scraping");
            let page = scraper.scrape(url).await?;
            self.content.save_json(&document_path(&route), &page)?;

            routes.push(route);
            progress_bar.inc(1);
        }

        self.content.save_json(MANIFEST_FILE, &routes)?;
        progress_bar.finish_with_message(format!("{}", "All pages mirrored".green()));
        info!(routes = routes.len(), assets = self.cache.len(), "mirror complete");

        Ok(MirrorReport {
            routes,
            assets: self.cache.len(),
        })
    }
}
