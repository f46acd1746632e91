use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.medicalopenworld.org";
pub const DEFAULT_ASSET_PREFIX: &str = "/remote-assets";
pub const DEFAULT_USER_AGENT: &str = "SiteMirror/1.0";

/// Per-article paths that may have a translated twin.
pub const DEFAULT_VARIANT_PATTERN: &str = r"^/articulo-[^/]+/?$";
pub const DEFAULT_VARIANT_PREFIX: &str = "en";

/// Sub-sitemaps containing this marker list authors, not pages.
pub const USERS_SITEMAP_MARKER: &str = "wp-sitemap-users";

pub const DEFAULT_EXTRA_PATHS: &[&str] = &[
    "/en/",
    "/en/quienes-somos/",
    "/en/contacto/",
    "/en/actualidad/",
    "/en/te-necesitamos/",
    "/en/proyecto-incunest/",
    "/en/tutoriales/",
    "/en/dona/",
];

pub const DEFAULT_EXCLUDE_PATHS: &[&str] = &["/category/sin-categoria/"];

/// Everything a run needs to know, already merged with built-in defaults.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub base_url: String,
    pub base_path: String,
    /// 0 means unlimited.
    pub max_pages: usize,
    pub auto_variants: bool,
    pub variant_pattern: String,
    pub variant_prefix: String,
    pub extra_urls: Vec<String>,
    pub extra_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub content_root: PathBuf,
    pub public_dir: PathBuf,
    pub asset_prefix: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
}

impl MirrorConfig {
    /// A configuration with no extra, excluded, or variant URLs.
    pub fn new(base_url: &str, content_root: impl Into<PathBuf>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            base_path: String::new(),
            max_pages: 0,
            auto_variants: false,
            variant_pattern: DEFAULT_VARIANT_PATTERN.to_string(),
            variant_prefix: DEFAULT_VARIANT_PREFIX.to_string(),
            extra_urls: Vec::new(),
            extra_paths: Vec::new(),
            exclude_paths: Vec::new(),
            content_root: content_root.into(),
            public_dir: public_dir.into(),
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
        }
    }

    pub fn page_limit(&self) -> Option<usize> {
        (self.max_pages > 0).then_some(self.max_pages)
    }
}

/// Split a comma-separated option, dropping blank entries.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Built-in entries followed by the operator's own.
pub fn with_defaults(defaults: &[&str], extra: &str) -> Vec<String> {
    defaults
        .iter()
        .map(|entry| entry.to_string())
        .chain(parse_list(extra))
        .collect()
}
