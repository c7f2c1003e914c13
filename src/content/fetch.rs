//! Remote image retrieval.

use std::time::Duration;

use crate::error::{ConvertError, Result};

/// Checks whether a remote image can be retrieved.
///
/// Only success matters to the sanitizer: the image stays referenced by URL
/// and the renderer downloads it again on its own.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<()>;
}

/// Blocking HTTP fetcher with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::blocking::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvertError::FetchError {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, url: &str) -> Result<()> {
        let fail = |reason: String| ConvertError::FetchError {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .header(reqwest::header::CONNECTION, "close")
            .send()
            .map_err(|e| fail(e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| fail(e.to_string()))?;
        tracing::debug!(url, "Fetched remote image");
        Ok(())
    }
}

/// Fetcher used when remote content is disabled; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetch;

impl ImageFetcher for NoFetch {
    fn fetch(&self, url: &str) -> Result<()> {
        Err(ConvertError::FetchError {
            url: url.to_string(),
            reason: "remote content disabled".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fetch_always_fails() {
        let err = NoFetch.fetch("http://example.com/a.png").unwrap_err();
        assert!(matches!(err, ConvertError::FetchError { .. }));
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpImageFetcher::new(Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_http_fetcher_invalid_url_fails() {
        let fetcher = HttpImageFetcher::new(Duration::from_secs(1)).unwrap();
        assert!(fetcher.fetch("not a url").is_err());
    }
}
