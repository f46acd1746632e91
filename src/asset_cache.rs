use futures::future::{BoxFuture, FutureExt};
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};
use url::Url;

use crate::fetcher::{Fetched, Fetcher};
use crate::file_manager::{self, FileManager};
use crate::rewriter::Rewriter;
use crate::site::{extension_of, Site};

/// Where a mirrored asset lives on disk and where it is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub fs_path: PathBuf,
    pub public_path: String,
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { bytes: usize },
    Skipped { status: u16 },
    Failed { reason: String },
}

/// Local path for an asset URL, relative to the asset root.
///
/// A query string is folded into the file name as an 8-hex-digit hash so
/// that `style.css?ver=1` and `style.css?ver=2` land in different files.
pub fn derive_relative_path(url: &Url) -> String {
    let path = url.path();
    let clean = path.strip_prefix('/').unwrap_or(path);

    match url.query().filter(|query| !query.is_empty()) {
        None => clean.to_string(),
        Some(query) => {
            let hash = query_hash(&format!("?{}", query));
            match extension_of(clean) {
                Some(ext) => {
                    let stem = &clean[..clean.len() - ext.len() - 1];
                    format!("{}.{}.{}", stem, hash, ext)
                }
                None => format!("{}-{}", clean, hash),
            }
        }
    }
}

pub fn query_hash(search: &str) -> String {
    let digest = Sha1::digest(search.as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Maps remote asset URLs to local copies, downloading each URL at most once
/// per run.
///
/// An entry is reserved before its download starts, so any reference seen
/// while the download (or the rewriting of a downloaded stylesheet) is still
/// in flight resolves to the same paths without fetching again.
pub struct AssetCache {
    site: Site,
    fetcher: Fetcher,
    files: FileManager,
    entries: Mutex<HashMap<String, AssetPaths>>,
    stylesheets_in_progress: Mutex<HashSet<PathBuf>>,
}

enum Reservation {
    Existing(AssetPaths),
    New(AssetPaths),
}

impl AssetCache {
    pub fn new(site: Site, fetcher: Fetcher, files: FileManager) -> Self {
        Self {
            site,
            fetcher,
            files,
            entries: Mutex::new(HashMap::new()),
            stylesheets_in_progress: Mutex::new(HashSet::new()),
        }
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, url: &Url) -> Option<AssetPaths> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url.as_str())
            .cloned()
    }

    pub fn paths_for(&self, url: &Url) -> AssetPaths {
        let relative_path = derive_relative_path(url);
        AssetPaths {
            fs_path: self.files.path_for(&relative_path),
            public_path: self.site.public_asset_path(&relative_path),
            relative_path,
        }
    }

    fn reserve(&self, url: &Url) -> Reservation {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(url.as_str()) {
            return Reservation::Existing(existing.clone());
        }
        let paths = self.paths_for(url);
        entries.insert(url.as_str().to_string(), paths.clone());
        Reservation::New(paths)
    }

    /// Local paths for `url`, downloading it on first sight.
    ///
    /// Always returns the paths, even when the download fails, so that
    /// rewritten markup stays consistent.
    pub fn resolve<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, AssetPaths> {
        async move {
            let paths = match self.reserve(url) {
                Reservation::Existing(paths) => return paths,
                Reservation::New(paths) => paths,
            };

            if let DownloadOutcome::Saved { bytes } = self.download(url, &paths).await {
                debug!(url = %url, bytes, path = ?paths.fs_path, "asset saved");
                if is_stylesheet(&paths.relative_path) {
                    let rewriter = Rewriter::new(self);
                    if let Err(e) = rewriter.rewrite_stylesheet_file(&paths.fs_path, url).await {
                        warn!(url = %url, error = %e, "failed to rewrite stylesheet");
                    }
                }
            }

            paths
        }
        .boxed()
    }

    async fn download(&self, url: &Url, paths: &AssetPaths) -> DownloadOutcome {
        match self.fetcher.fetch_bytes(url).await {
            Fetched::Body(content) => match file_manager::write_file(&paths.fs_path, &content) {
                Ok(()) => DownloadOutcome::Saved {
                    bytes: content.len(),
                },
                Err(e) => {
                    warn!(url = %url, error = %e, "failed to save asset");
                    DownloadOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            },
            Fetched::Status(status) => {
                warn!(url = %url, status = %status, "skipping asset");
                DownloadOutcome::Skipped {
                    status: status.as_u16(),
                }
            }
            Fetched::Failed(reason) => {
                warn!(url = %url, error = %reason, "failed to download asset");
                DownloadOutcome::Failed { reason }
            }
        }
    }

    /// Mark a stylesheet as being rewritten. `None` if it already is.
    pub(crate) fn begin_stylesheet(&self, path: &Path) -> Option<StylesheetGuard<'_>> {
        let mut in_progress = self
            .stylesheets_in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_progress.insert(path.to_path_buf()) {
            return None;
        }
        Some(StylesheetGuard {
            cache: self,
            path: path.to_path_buf(),
        })
    }
}

pub(crate) struct StylesheetGuard<'a> {
    cache: &'a AssetCache,
    path: PathBuf,
}

impl Drop for StylesheetGuard<'_> {
    fn drop(&mut self) {
        self.cache
            .stylesheets_in_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

fn is_stylesheet(relative_path: &str) -> bool {
    extension_of(relative_path).is_some_and(|ext| ext.eq_ignore_ascii_case("css"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_plain_path_is_mirrored() {
        assert_eq!(
            derive_relative_path(&url("https://example.org/wp-content/x.png")),
            "wp-content/x.png"
        );
    }

    #[test]
    fn test_query_variants_get_distinct_stable_names() {
        let v1 = derive_relative_path(&url("https://example.org/wp-content/style.css?ver=1"));
        let v2 = derive_relative_path(&url("https://example.org/wp-content/style.css?ver=2"));
        let v1_again = derive_relative_path(&url("https://example.org/wp-content/style.css?ver=1"));

        assert_ne!(v1, v2);
        assert_eq!(v1, v1_again);
        assert_eq!(v1, "wp-content/style.7a4a2d7a.css");
        assert!(v2.ends_with(".css"));
    }

    #[test]
    fn test_query_without_extension_appends_hash() {
        let path = derive_relative_path(&url("https://example.org/wp-json/oembed?format=xml"));
        assert_eq!(path, "wp-json/oembed-fdd72cff");
    }

    #[test]
    fn test_empty_query_is_ignored() {
        assert_eq!(
            derive_relative_path(&url("https://example.org/wp-content/x.png?")),
            "wp-content/x.png"
        );
    }

    #[test]
    fn test_query_hash_shape() {
        let hash = query_hash("?ver=6.4.2");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_paths_for_combines_roots() {
        let temp_dir = tempdir().unwrap();
        let site = Site::new("https://example.org", "/mirror", "/remote-assets").unwrap();
        let cache = AssetCache::new(
            site,
            Fetcher::new("SiteMirror/test", None).unwrap(),
            FileManager::new(temp_dir.path()).unwrap(),
        );

        let paths = cache.paths_for(&url("https://example.org/wp-content/x.png"));
        assert_eq!(paths.fs_path, temp_dir.path().join("wp-content/x.png"));
        assert_eq!(paths.public_path, "/mirror/remote-assets/wp-content/x.png");
        assert_eq!(paths.relative_path, "wp-content/x.png");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stylesheet_guard_blocks_reentry() {
        let temp_dir = tempdir().unwrap();
        let cache = AssetCache::new(
            Site::new("https://example.org", "", "/remote-assets").unwrap(),
            Fetcher::new("SiteMirror/test", None).unwrap(),
            FileManager::new(temp_dir.path()).unwrap(),
        );
        let path = temp_dir.path().join("a.css");

        let guard = cache.begin_stylesheet(&path);
        assert!(guard.is_some());
        assert!(cache.begin_stylesheet(&path).is_none());
        drop(guard);
        assert!(cache.begin_stylesheet(&path).is_some());
    }

    #[test]
    fn test_is_stylesheet() {
        assert!(is_stylesheet("wp-content/style.1a2b3c4d.css"));
        assert!(is_stylesheet("theme/MAIN.CSS"));
        assert!(!is_stylesheet("wp-content/app.js"));
        assert!(!is_stylesheet("wp-content/css"));
    }
}
