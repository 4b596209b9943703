// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PostgREST and Storage HTTP client.
//!
//! One HTTP exchange per call, classified into the error taxonomy. The
//! namespace selector becomes the `Accept-Profile`/`Content-Profile` headers
//! here and nowhere else.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use waypoint_core::WaypointError;
use waypoint_core::types::Namespace;
use waypoint_resilience::{classify_http_status, classify_transport};

/// Service name used in errors, logs, and metrics.
pub const SERVICE: &str = "supabase";

/// `Prefer` header asking PostgREST to echo written rows.
pub const RETURN_REPRESENTATION: &str = "return=representation";
/// `Prefer` header for writes whose result is not needed.
pub const RETURN_MINIMAL: &str = "return=minimal";
/// `Prefer` header for slug-keyed upserts.
pub const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// Thin HTTP client over the Supabase REST and Storage APIs.
#[derive(Clone)]
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    key: SecretString,
    namespace: Namespace,
    read_timeout: Duration,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl SupabaseClient {
    pub fn new(
        base_url: &str,
        key: SecretString,
        namespace: Namespace,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, WaypointError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| WaypointError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
            namespace,
            read_timeout,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// A copy of this client selecting another namespace.
    pub fn with_namespace(&self, namespace: Namespace) -> Self {
        Self {
            namespace,
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_headers(&self) -> Result<HeaderMap, WaypointError> {
        let key = self.key.expose_secret();
        let mut apikey = HeaderValue::from_str(key)
            .map_err(|e| WaypointError::Config(format!("invalid database key: {e}")))?;
        apikey.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| WaypointError::Config(format!("invalid database key: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", apikey);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn rest_request(&self, method: Method, url: Url) -> Result<RequestBuilder, WaypointError> {
        let profile = HeaderValue::from_str(self.namespace.as_str())
            .map_err(|e| WaypointError::Config(format!("invalid namespace: {e}")))?;
        Ok(self
            .client
            .request(method, url)
            .headers(self.auth_headers()?)
            .header("Accept-Profile", profile.clone())
            .header("Content-Profile", profile)
            .timeout(self.read_timeout))
    }

    /// `{base}/rest/v1/{path}` with query pairs appended.
    pub fn rest_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, WaypointError> {
        let mut url = Url::parse(&format!("{}/rest/v1/{path}", self.base_url))
            .map_err(|e| WaypointError::Config(format!("invalid database URL: {e}")))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// `GET /rest/v1/{table}` with PostgREST query parameters.
    pub async fn select<R: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<R>, WaypointError> {
        let url = self.rest_url(table, params)?;
        let request = self.rest_request(Method::GET, url)?;
        let body = self.send(request).await?;
        decode(&body)
    }

    /// `POST /rest/v1/{table}` returning the written rows.
    pub async fn insert<B, R>(
        &self,
        table: &str,
        rows: &B,
        prefer: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<R>, WaypointError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.rest_url(table, params)?;
        let request = self
            .rest_request(Method::POST, url)?
            .header("Prefer", prefer)
            .json(rows);
        let body = self.send(request).await?;
        decode(&body)
    }

    /// `POST /rest/v1/{table}` discarding the response body.
    pub async fn insert_minimal<B>(&self, table: &str, rows: &B) -> Result<(), WaypointError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.rest_url(table, &[])?;
        let request = self
            .rest_request(Method::POST, url)?
            .header("Prefer", RETURN_MINIMAL)
            .json(rows);
        self.send(request).await.map(|_| ())
    }

    /// `POST /rest/v1/rpc/{function}`.
    pub async fn rpc<B, R>(&self, function: &str, args: &B) -> Result<R, WaypointError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.rest_url(&format!("rpc/{function}"), &[])?;
        let request = self.rest_request(Method::POST, url)?.json(args);
        let body = self.send(request).await?;
        decode(&body)
    }

    /// `POST /storage/v1/object/{bucket}/{path}` with upsert.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), WaypointError> {
        let url = format!("{}/storage/v1/object/{bucket}/{path}", self.base_url);
        let request = self
            .client
            .post(url)
            .headers(self.auth_headers()?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .timeout(self.read_timeout)
            .body(bytes);
        self.send(request).await.map(|_| ())
    }

    /// Public URL of an object in a public bucket.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }

    /// Bounded `HEAD` request against one table.
    pub async fn ping(&self, table: &str, timeout: Duration) -> Result<(), WaypointError> {
        let url = self.rest_url(table, &[("select", "id".into()), ("limit", "1".into())])?;
        let request = self.rest_request(Method::HEAD, url)?.timeout(timeout);
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, WaypointError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e, self.read_timeout))?;
        let status = response.status();
        debug!(status = %status, namespace = self.namespace.as_str(), "supabase response received");
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(SERVICE, e, self.read_timeout))?;
        if !status.is_success() {
            return Err(classify_http_status(SERVICE, status.as_u16(), &body));
        }
        Ok(body)
    }
}

fn decode<R: DeserializeOwned>(body: &str) -> Result<R, WaypointError> {
    serde_json::from_str(body)
        .map_err(|e| WaypointError::bad_request(SERVICE, format!("unexpected row shape: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use waypoint_core::ErrorKind;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> SupabaseClient {
        SupabaseClient::new(
            &server.uri(),
            SecretString::from("service-role-key".to_string()),
            Namespace::new("travel"),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn select_sends_key_bearer_and_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_signals"))
            .and(query_param("session_id", "eq.s1"))
            .and(header("apikey", "service-role-key"))
            .and(header("authorization", "Bearer service-role-key"))
            .and(header("accept-profile", "travel"))
            .and(header("content-profile", "travel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"a": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .select("user_signals", &[("session_id", "eq.s1".into())])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn rpc_posts_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_posts"))
            .and(body_json(json!({"match_count": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let rows: Vec<Value> = client(&server)
            .rpc("match_posts", &json!({"match_count": 2}))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/a"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/b"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/c"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let c = client(&server);
        let a = c.select::<Value>("a", &[]).await.unwrap_err();
        let b = c.select::<Value>("b", &[]).await.unwrap_err();
        let d = c.select::<Value>("c", &[]).await.unwrap_err();
        assert_eq!(a.kind(), ErrorKind::Auth);
        assert_eq!(b.kind(), ErrorKind::UpstreamTransient);
        assert_eq!(d.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn upload_uses_upsert_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/media/ingested/lake-0a1b2c3d.jpg"))
            .and(header("x-upsert", "true"))
            .and(header("content-type", "image/jpeg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "media/ingested/lake-0a1b2c3d.jpg"})))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server);
        c.upload("media", "ingested/lake-0a1b2c3d.jpg", vec![0xff, 0xd8], "image/jpeg")
            .await
            .unwrap();
        assert_eq!(
            c.public_url("media", "ingested/lake-0a1b2c3d.jpg"),
            format!("{}/storage/v1/object/public/media/ingested/lake-0a1b2c3d.jpg", server.uri())
        );
    }

    #[test]
    fn with_namespace_switches_profile_only() {
        let c = SupabaseClient::new(
            "https://db.example.co/",
            SecretString::from("k".to_string()),
            Namespace::default(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let other = c.with_namespace(Namespace::new("staging"));
        assert_eq!(c.namespace().as_str(), "public");
        assert_eq!(other.namespace().as_str(), "staging");
        assert_eq!(other.base_url(), "https://db.example.co");
        assert!(!format!("{other:?}").contains("\"k\""));
    }
}
