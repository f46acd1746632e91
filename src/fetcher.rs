use anyhow::Result;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::MirrorError;

/// Result of a best-effort body download.
#[derive(Debug)]
pub enum Fetched {
    Body(Vec<u8>),
    Status(StatusCode),
    Failed(String),
}

/// Result of an existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Found,
    NotFound(StatusCode),
    Error(String),
}

impl Probe {
    /// Only a confirmed success counts; errors are treated as absence.
    pub fn exists(&self) -> bool {
        matches!(self, Probe::Found)
    }
}

/// HTTP access for the whole run. Redirects are followed by the client.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(user_agent)
            .cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Fetch a document that the run cannot do without.
    pub async fn fetch_text(&self, url: &Url) -> Result<String, MirrorError> {
        debug!(url = %url, "fetching");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| MirrorError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|source| MirrorError::Transport {
            url: url.to_string(),
            source,
        })
    }

    /// Download a body without ever failing the caller.
    pub async fn fetch_bytes(&self, url: &Url) -> Fetched {
        let response = match self.client.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => return Fetched::Failed(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return Fetched::Status(status);
        }

        match response.bytes().await {
            Ok(bytes) => Fetched::Body(bytes.to_vec()),
            Err(e) => Fetched::Failed(e.to_string()),
        }
    }

    /// Check whether a page exists, retrying with GET when the server
    /// refuses HEAD.
    pub async fn probe(&self, url: &Url) -> Probe {
        let head = match self.client.head(url.clone()).send().await {
            Ok(resp) => resp.status(),
            Err(e) => return Probe::Error(e.to_string()),
        };
        if head.is_success() {
            return Probe::Found;
        }
        if head != StatusCode::FORBIDDEN && head != StatusCode::METHOD_NOT_ALLOWED {
            return Probe::NotFound(head);
        }

        debug!(url = %url, status = %head, "HEAD refused, retrying with GET");
        match self.client.get(url.clone()).send().await {
            Ok(resp) if resp.status().is_success() => Probe::Found,
            Ok(resp) => Probe::NotFound(resp.status()),
            Err(e) => Probe::Error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new("SiteMirror/test", None).unwrap()
    }

    #[tokio::test]
    async fn test_probe_found_with_head() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/en/articulo-demo/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/en/articulo-demo/", mock_server.uri())).unwrap();
        assert_eq!(fetcher().probe(&url).await, Probe::Found);
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_get_when_head_refused() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/en/articulo-demo/"))
            .respond_with(ResponseTemplate::new(405))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en/articulo-demo/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/en/articulo-demo/", mock_server.uri())).unwrap();
        assert!(fetcher().probe(&url).await.exists());
    }

    #[tokio::test]
    async fn test_probe_not_found_does_not_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/en/missing/", mock_server.uri())).unwrap();
        assert_eq!(
            fetcher().probe(&url).await,
            Probe::NotFound(StatusCode::NOT_FOUND)
        );
    }

    #[tokio::test]
    async fn test_probe_transport_error_is_not_found() {
        // Nothing listens on port 9 of the loopback interface.
        let url = Url::parse("http://127.0.0.1:9/en/articulo-demo/").unwrap();
        let probe = fetcher().probe(&url).await;
        assert!(matches!(probe, Probe::Error(_)));
        assert!(!probe.exists());
    }

    #[tokio::test]
    async fn test_fetch_text_reports_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone/"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/gone/", mock_server.uri())).unwrap();
        let err = fetcher().fetch_text(&url).await.unwrap_err();
        assert!(matches!(err, MirrorError::Status { status: StatusCode::GONE, .. }));
    }

    #[tokio::test]
    async fn test_fetch_bytes_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-content/x.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/wp-content/x.png", mock_server.uri())).unwrap();
        assert!(matches!(
            fetcher().fetch_bytes(&url).await,
            Fetched::Status(StatusCode::NOT_FOUND)
        ));
    }
}
