// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote image download with bounded retries.

use std::time::Duration;

use reqwest::Url;
use tracing::debug;
use waypoint_core::WaypointError;
use waypoint_resilience::{RetryPolicy, classify_http_status, classify_transport};

/// Service name used in errors and retry logs.
pub const SERVICE: &str = "download";

/// Largest accepted download.
pub const MAX_DOWNLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Fetches image bytes over HTTP.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Downloader {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, WaypointError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(concat!("waypoint-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WaypointError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            retry,
            timeout,
        })
    }

    /// Download `url`, retrying transient failures.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, WaypointError> {
        let url = Url::parse(url)
            .map_err(|e| WaypointError::bad_request(SERVICE, format!("invalid url {url:?}: {e}")))?;
        self.retry
            .run(SERVICE, None, |attempt| {
                let url = url.clone();
                async move {
                    debug!(url = %url, attempt, "downloading");
                    self.fetch_once(url).await
                }
            })
            .await
    }

    async fn fetch_once(&self, url: Url) -> Result<Vec<u8>, WaypointError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_status(SERVICE, status.as_u16(), &body));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport(SERVICE, e, self.timeout))?;
        if bytes.is_empty() {
            return Err(WaypointError::bad_request(SERVICE, "empty response body"));
        }
        if bytes.len() > MAX_DOWNLOAD_BYTES {
            return Err(WaypointError::bad_request(
                SERVICE,
                format!("{} bytes exceeds the download cap", bytes.len()),
            ));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use waypoint_core::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn downloader() -> Downloader {
        let retry = RetryPolicy {
            base_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        }
        .without_jitter();
        Downloader::new(Duration::from_secs(5), retry).unwrap()
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let bytes = downloader()
            .fetch(&format!("{}/a.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_image_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = downloader()
            .fetch(&format!("{}/gone.jpg", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn invalid_url_is_bad_request() {
        let err = downloader().fetch("not a url").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }
}
