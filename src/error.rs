use reqwest::StatusCode;
use thiserror::Error;

/// Errors that abort a mirroring run.
///
/// Asset downloads and variant probes never produce these; they report
/// through [`crate::asset_cache::DownloadOutcome`] and [`crate::fetcher::Probe`].
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("failed to fetch {url}: {status}")]
    Status { url: String, status: StatusCode },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("sitemap {url} could not be loaded")]
    Sitemap {
        url: String,
        #[source]
        source: Box<MirrorError>,
    },

    #[error("sitemap {url} is not valid XML: {reason}")]
    SitemapParse { url: String, reason: String },

    #[error("invalid variant pattern {pattern:?}")]
    VariantPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl MirrorError {
    /// The remote resource the error is about, when there is one.
    pub fn url(&self) -> Option<&str> {
        match self {
            MirrorError::Status { url, .. }
            | MirrorError::Transport { url, .. }
            | MirrorError::Sitemap { url, .. }
            | MirrorError::SitemapParse { url, .. } => Some(url),
            MirrorError::InvalidBaseUrl(_) | MirrorError::VariantPattern { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sitemap_error_names_the_sitemap() {
        let err = MirrorError::Sitemap {
            url: "https://example.org/wp-sitemap.xml".to_string(),
            source: Box::new(MirrorError::Status {
                url: "https://example.org/wp-sitemap.xml".to_string(),
                status: StatusCode::NOT_FOUND,
            }),
        };

        assert_eq!(err.url(), Some("https://example.org/wp-sitemap.xml"));
        assert!(err.to_string().contains("wp-sitemap.xml"));
    }

    #[test]
    fn test_status_error_message() {
        let err = MirrorError::Status {
            url: "https://example.org/missing/".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch https://example.org/missing/: 500 Internal Server Error"
        );
    }
}
