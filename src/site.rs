use url::{Origin, Url};

use crate::error::MirrorError;

/// Path segments that mark a platform-hosted file even without a known extension.
const ASSET_DIRECTORIES: &[&str] = &["/wp-content/", "/wp-includes/"];

const ASSET_EXTENSIONS: &[&str] = &[
    "css", "js", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "woff", "woff2", "ttf",
    "otf", "eot", "pdf", "zip", "rar", "mp4", "webm", "mp3", "wav", "ogg", "xml", "json",
];

const SKIPPED_PREFIXES: &[&str] = &["data:", "mailto:", "tel:", "javascript:", "#"];

/// The site under mirror: its origin, where it will be deployed, and where
/// downloaded assets are served from.
#[derive(Debug, Clone)]
pub struct Site {
    base_url: Url,
    origin: Origin,
    base_path: String,
    asset_prefix: String,
}

impl Site {
    pub fn new(base_url: &str, base_path: &str, asset_prefix: &str) -> Result<Self, MirrorError> {
        let base_url =
            Url::parse(base_url).map_err(|_| MirrorError::InvalidBaseUrl(base_url.to_string()))?;
        let origin = base_url.origin();
        if !origin.is_tuple() {
            return Err(MirrorError::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            base_url,
            origin,
            base_path: normalize_base_path(base_path),
            asset_prefix: format!("/{}", asset_prefix.trim_matches('/')),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn is_internal(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    /// Location of the platform's sitemap index, below the base URL's path.
    pub fn sitemap_index_url(&self) -> Result<Url, MirrorError> {
        let mut root = self.base_url.clone();
        root.set_query(None);
        root.set_fragment(None);
        let index = format!("{}/wp-sitemap.xml", root.as_str().trim_end_matches('/'));
        Url::parse(&index).map_err(|_| MirrorError::InvalidBaseUrl(self.base_url.to_string()))
    }

    /// Prefix a local path with the deployment base path.
    ///
    /// Protocol-relative references and anything that is not a local
    /// absolute path are returned unchanged.
    pub fn prefix_base_path(&self, path: &str) -> String {
        if self.base_path.is_empty() || !path.starts_with('/') || path.starts_with("//") {
            return path.to_string();
        }
        format!("{}{}", self.base_path, path)
    }

    /// Public path under which a mirrored asset is served.
    pub fn public_asset_path(&self, relative_path: &str) -> String {
        self.prefix_base_path(&format!("{}/{}", self.asset_prefix, relative_path))
    }

    /// Whether a raw reference already points into the mirrored asset tree.
    pub fn is_mirrored_path(&self, raw: &str) -> bool {
        let root = self.public_asset_path("");
        raw.starts_with(&root) || raw.starts_with(&format!("{}/", self.asset_prefix))
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// References that never name a downloadable resource.
pub fn is_skippable(raw: &str) -> bool {
    raw.is_empty() || SKIPPED_PREFIXES.iter().any(|prefix| raw.starts_with(prefix))
}

pub fn resolve(raw: &str, base: &Url) -> Option<Url> {
    base.join(raw).ok()
}

/// Force a leading and a trailing slash onto a path.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let with_leading = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if with_leading.ends_with('/') {
        with_leading
    } else {
        format!("{}/", with_leading)
    }
}

/// Route under which a page URL is stored.
pub fn route_for(url: &Url) -> String {
    let route = normalize_path(url.path());
    if route == "//" {
        "/".to_string()
    } else {
        route
    }
}

/// Whether a URL names a static file rather than a page.
pub fn looks_like_asset(url: &Url) -> bool {
    let path = url.path();
    if ASSET_DIRECTORIES.iter().any(|dir| path.contains(dir)) {
        return true;
    }
    match extension_of(path) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            ASSET_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Extension of the last path segment, without the dot. Dot files have none.
pub fn extension_of(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < file_name.len() => Some(&file_name[idx + 1..]),
        _ => None,
    }
}
