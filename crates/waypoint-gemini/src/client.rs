// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini REST API.
//!
//! [`GeminiClient`] performs exactly one HTTP exchange per call and classifies
//! the outcome. Retries, gating, and accounting live in
//! [`crate::GeminiGateway`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use waypoint_core::WaypointError;
use waypoint_resilience::{classify_http_status, classify_transport};

use crate::types::{
    ApiErrorResponse, EmbedContentRequest, EmbedContentResponse, GenerateContentRequest,
    GenerateContentResponse,
};

/// Service name used in errors, logs, and metrics.
pub const SERVICE: &str = "gemini";

/// HTTP client for Gemini API communication.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a new client. The connect timeout applies to every call; read
    /// timeouts are passed per call.
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        connect_timeout: Duration,
    ) -> Result<Self, WaypointError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| WaypointError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn key_header(&self) -> Result<HeaderValue, WaypointError> {
        let mut value = HeaderValue::from_str(self.api_key.expose_secret())
            .map_err(|e| WaypointError::Config(format!("invalid API key header value: {e}")))?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }

    /// One `generateContent` call.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
        read_timeout: Duration,
    ) -> Result<GenerateContentResponse, WaypointError> {
        self.post(&self.model_url(model, "generateContent"), request, read_timeout)
            .await
    }

    /// One `embedContent` call.
    pub async fn embed_content(
        &self,
        model: &str,
        request: &EmbedContentRequest,
        read_timeout: Duration,
    ) -> Result<EmbedContentResponse, WaypointError> {
        self.post(&self.model_url(model, "embedContent"), request, read_timeout)
            .await
    }

    /// Fetch model metadata. Used as a token-free health check.
    pub async fn get_model(&self, model: &str, timeout: Duration) -> Result<(), WaypointError> {
        let url = format!("{}/v1beta/models/{model}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", self.key_header()?)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e, timeout))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_http_status(SERVICE, status.as_u16(), &error_detail(&body)))
    }

    async fn post<B, R>(&self, url: &str, body: &B, read_timeout: Duration) -> Result<R, WaypointError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.key_header()?)
            .timeout(read_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e, read_timeout))?;

        let status = response.status();
        debug!(status = %status, "gemini response received");

        let text = response
            .text()
            .await
            .map_err(|e| classify_transport(SERVICE, e, read_timeout))?;

        if !status.is_success() {
            return Err(classify_http_status(
                SERVICE,
                status.as_u16(),
                &error_detail(&text),
            ));
        }

        serde_json::from_str(&text)
            .map_err(|e| WaypointError::upstream(SERVICE, format!("malformed response body: {e}")))
    }
}

/// Prefer the structured error message, keep the raw body for reason codes.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) if body.contains("API_KEY_INVALID") => {
            format!("{} ({}) API_KEY_INVALID", api_err.error.message, api_err.error.status)
        }
        Ok(api_err) => format!("{} ({})", api_err.error.message, api_err.error.status),
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use waypoint_core::ErrorKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::types::{Content, Part};

    fn test_client(base_url: &str) -> GeminiClient {
        GeminiClient::new(
            SecretString::from("test-api-key".to_string()),
            base_url,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("Hello")])],
            generation_config: None,
        }
    }

    #[tokio::test]
    async fn generate_sends_key_header_to_model_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-api-key"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Hi there!"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let resp = client
            .generate_content("gemini-2.0-flash", &request(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(resp.text(), "Hi there!");
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED"}
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .generate_content("m", &request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(err.to_string().contains("Permission denied"), "got: {err}");
    }

    #[tokio::test]
    async fn invalid_key_on_400_is_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT",
                    "details": [{"reason": "API_KEY_INVALID"}]
                }
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .generate_content("m", &request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn read_timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .generate_content("m", &request(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn malformed_body_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .generate_content("m", &request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
    }

    #[test]
    fn debug_does_not_print_key() {
        let client = test_client("http://localhost");
        assert!(!format!("{client:?}").contains("test-api-key"));
    }
}
