use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    parse_list, with_defaults, MirrorConfig, DEFAULT_ASSET_PREFIX, DEFAULT_BASE_URL,
    DEFAULT_EXCLUDE_PATHS, DEFAULT_EXTRA_PATHS, DEFAULT_USER_AGENT, DEFAULT_VARIANT_PATTERN,
    DEFAULT_VARIANT_PREFIX,
};

#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    about = "Mirror a content-managed website into static route documents and local assets",
    version,
    long_about = "Reads the site's sitemap, scrapes every page into a structured document, downloads every internally hosted asset the pages reference, and rewrites references to point at the local copies."
)]
pub struct MirrorCommand {
    /// Site to mirror
    #[arg(long, env = "SCRAPE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Sub-path the mirror will be deployed under
    #[arg(long, env = "BASE_PATH", default_value = "")]
    pub base_path: String,

    /// Maximum number of pages to mirror (0 = unlimited)
    #[arg(long, env = "SCRAPE_MAX_PAGES", default_value = "0")]
    pub max_pages: usize,

    /// Probe for English versions of article pages (only "false" disables it)
    #[arg(
        long,
        env = "SCRAPE_AUTO_EN_VARIANTS",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = parse_enabled
    )]
    pub auto_en_variants: bool,

    /// Extra absolute URLs to mirror (comma-separated)
    #[arg(long, env = "SCRAPE_EXTRA_URLS", default_value = "")]
    pub extra_urls: String,

    /// Extra site paths to mirror, added to the built-in list (comma-separated)
    #[arg(long, env = "SCRAPE_EXTRA_PATHS", default_value = "")]
    pub extra_paths: String,

    /// Site paths to leave out, added to the built-in list (comma-separated)
    #[arg(long, env = "SCRAPE_EXCLUDE_PATHS", default_value = "")]
    pub exclude_paths: String,

    /// Directory for route documents and the manifest
    #[arg(long, env = "CONTENT_ROOT", default_value = "./content")]
    pub content_root: PathBuf,

    /// Directory for downloaded assets
    #[arg(long, env = "PUBLIC_DIR", default_value = "./public/remote-assets")]
    pub public_dir: PathBuf,

    /// Public URL path the asset directory is served from
    #[arg(long, env = "SCRAPE_ASSET_PREFIX", default_value = DEFAULT_ASSET_PREFIX)]
    pub asset_prefix: String,

    /// Path pattern of pages that may have a language variant
    #[arg(long, env = "SCRAPE_VARIANT_PATTERN", default_value = DEFAULT_VARIANT_PATTERN)]
    pub variant_pattern: String,

    /// Language segment inserted in front of variant paths
    #[arg(long, env = "SCRAPE_VARIANT_PREFIX", default_value = DEFAULT_VARIANT_PREFIX)]
    pub variant_prefix: String,

    /// User agent string to use for requests
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Timeout for requests in seconds (0 = none)
    #[arg(long, default_value = "0")]
    pub timeout: u64,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Any value other than exactly `false` leaves a feature on.
fn parse_enabled(raw: &str) -> Result<bool, String> {
    Ok(raw != "false")
}

impl MirrorCommand {
    pub fn into_config(self) -> MirrorConfig {
        let mut config = MirrorConfig::new(&self.base_url, self.content_root, self.public_dir);
        config.base_path = self.base_path;
        config.max_pages = self.max_pages;
        config.auto_variants = self.auto_en_variants;
        config.variant_pattern = self.variant_pattern;
        config.variant_prefix = self.variant_prefix;
        config.extra_urls = parse_list(&self.extra_urls);
        config.extra_paths = with_defaults(DEFAULT_EXTRA_PATHS, &self.extra_paths);
        config.exclude_paths = with_defaults(DEFAULT_EXCLUDE_PATHS, &self.exclude_paths);
        config.asset_prefix = self.asset_prefix;
        config.user_agent = self.user_agent;
        config.timeout = (self.timeout > 0).then(|| Duration::from_secs(self.timeout));
        config
    }
}
