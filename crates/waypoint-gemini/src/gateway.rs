// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The LLM gateway: every model call in the process goes through here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::SecretString;
use tracing::{debug, info, warn};
use waypoint_config::model::GeminiConfig;
use waypoint_core::traits::{
    EmbedRequest, EmbedTask, GenerateRequest, Generation, LlmProvider, PluginAdapter, UsageSink,
};
use waypoint_core::types::{AdapterType, HealthStatus, TokenUsage, UsageRecord};
use waypoint_core::{EMBEDDING_DIM, WaypointError};
use waypoint_resilience::{ConcurrencyGate, Deadline, RetryPolicy, attempt_timeout, bounded};

use crate::client::{GeminiClient, SERVICE};
use crate::types::{
    Content, EmbedContentRequest, GenerateContentRequest, GenerationConfig, Part,
};

/// Model and timeout settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub generation_model: String,
    pub vision_model: String,
    pub embedding_model: String,
    pub agent_models: HashMap<String, String>,
    pub generate_timeout: Duration,
    pub embed_timeout: Duration,
}

impl GatewaySettings {
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self {
            generation_model: config.generation_model.clone(),
            vision_model: config.vision_model.clone(),
            embedding_model: config.embedding_model.clone(),
            agent_models: config.agent_models.clone(),
            generate_timeout: Duration::from_secs(config.generate_timeout_secs),
            embed_timeout: Duration::from_secs(config.embed_timeout_secs),
        }
    }
}

/// Gemini-backed [`LlmProvider`] with retries, gating, and usage accounting.
pub struct GeminiGateway {
    client: GeminiClient,
    settings: GatewaySettings,
    retry: RetryPolicy,
    gate: ConcurrencyGate,
    usage: Option<Arc<dyn UsageSink>>,
}

impl GeminiGateway {
    /// Creates a gateway from configuration and a resolved API key.
    pub fn new(
        config: &GeminiConfig,
        api_key: SecretString,
        retry: RetryPolicy,
        gate: ConcurrencyGate,
    ) -> Result<Self, WaypointError> {
        let client = GeminiClient::new(
            api_key,
            &config.base_url,
            Duration::from_secs(config.connect_timeout_secs),
        )?;
        info!(
            generation_model = config.generation_model,
            embedding_model = config.embedding_model,
            llm_permits = gate.permits(),
            "gemini gateway initialized"
        );
        Ok(Self {
            client,
            settings: GatewaySettings::from_config(config),
            retry,
            gate,
            usage: None,
        })
    }

    /// Hands every successful generation's token counts to `sink`.
    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage = Some(sink);
        self
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Explicit model, then per-agent override, then the vision or generation default.
    pub fn resolve_model(&self, request: &GenerateRequest) -> String {
        if let Some(model) = &request.model {
            return model.clone();
        }
        if let Some(model) = self.settings.agent_models.get(&request.agent) {
            return model.clone();
        }
        if request.image.is_some() {
            self.settings.vision_model.clone()
        } else {
            self.settings.generation_model.clone()
        }
    }

    fn build_request(request: &GenerateRequest) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = &request.image {
            parts.push(Part::inline(image.mime_type.clone(), BASE64.encode(&image.data)));
        }
        parts.push(Part::text(request.prompt.clone()));

        let generation_config = if request.json_output || request.temperature.is_some() {
            Some(GenerationConfig {
                temperature: request.temperature,
                response_mime_type: request
                    .json_output
                    .then(|| "application/json".to_string()),
            })
        } else {
            None
        };

        GenerateContentRequest {
            contents: vec![Content::user(parts)],
            generation_config,
        }
    }

    fn record_usage(&self, agent: &str, model: &str, usage: TokenUsage, session_id: Option<String>) {
        let Some(sink) = self.usage.clone() else {
            return;
        };
        let record = UsageRecord::new(agent, model, usage, session_id);
        tokio::spawn(async move {
            if let Err(e) = sink.record(record).await {
                warn!(error = %e, "failed to write usage record");
            }
        });
    }
}

fn outcome_label(result: &Result<impl Sized, WaypointError>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(e) => e.kind().to_string(),
    }
}

#[async_trait]
impl PluginAdapter for GeminiGateway {
    fn name(&self) -> &str {
        SERVICE
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Llm
    }

    async fn health_check(&self) -> Result<HealthStatus, WaypointError> {
        match self
            .client
            .get_model(&self.settings.generation_model, Duration::from_secs(10))
            .await
        {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) if e.is_fatal() => Ok(HealthStatus::Unhealthy(e.to_string())),
            Err(e) => Ok(HealthStatus::Degraded(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), WaypointError> {
        debug!("gemini gateway shutting down");
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for GeminiGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, WaypointError> {
        let model = self.resolve_model(&request);
        let body = Self::build_request(&request);
        let deadline = request.deadline.or_else(Deadline::current);
        let deadline = deadline.as_ref();
        let configured = self.settings.generate_timeout;
        let agent = request.agent.as_str();
        let started = Instant::now();

        let result = self
            .retry
            .run(SERVICE, deadline, |attempt| {
                let (model, body) = (&model, &body);
                async move {
                    let read_timeout = attempt_timeout(SERVICE, configured, deadline)?;
                    bounded(SERVICE, deadline, async {
                        let _permit = self.gate.acquire().await?;
                        debug!(
                            agent,
                            model = %model,
                            attempt,
                            read_timeout_ms = read_timeout.as_millis() as u64,
                            "generate"
                        );
                        self.client.generate_content(model, body, read_timeout).await
                    })
                    .await
                }
            })
            .await;

        let result = result.and_then(|response| {
            let text = response.text();
            if text.trim().is_empty() {
                let reason = response
                    .prompt_feedback
                    .as_ref()
                    .and_then(|f| f.block_reason.clone())
                    .or_else(|| response.candidates.first().and_then(|c| c.finish_reason.clone()))
                    .unwrap_or_else(|| "no candidates".to_string());
                return Err(WaypointError::parse(format!(
                    "model returned no text ({reason})"
                )));
            }
            let meta = response.usage_metadata.unwrap_or_default();
            Ok(Generation {
                text,
                usage: TokenUsage {
                    prompt_tokens: meta.prompt_token_count,
                    completion_tokens: meta.candidates_token_count,
                    total_tokens: meta.total_token_count,
                },
                model: model.clone(),
            })
        });

        metrics::counter!(
            "waypoint_llm_calls_total",
            "agent" => request.agent.clone(),
            "outcome" => outcome_label(&result),
        )
        .increment(1);
        metrics::histogram!("waypoint_llm_latency_seconds", "agent" => request.agent.clone())
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(generation) => {
                debug!(
                    agent = %request.agent,
                    model = %generation.model,
                    total_tokens = generation.usage.total_tokens,
                    "generation complete"
                );
                self.record_usage(
                    &request.agent,
                    &generation.model,
                    generation.usage,
                    request.session_id.clone(),
                );
            }
            Err(e) => warn!(agent = %request.agent, kind = %e.kind(), error = %e, "generation failed"),
        }
        result
    }

    async fn embed(&self, request: EmbedRequest) -> Result<Vec<f32>, WaypointError> {
        if request.text.trim().is_empty() {
            return Err(WaypointError::bad_request(SERVICE, "cannot embed empty text"));
        }
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.settings.embedding_model.clone());
        let body = EmbedContentRequest {
            model: format!("models/{model}"),
            content: Content {
                role: None,
                parts: vec![Part::text(request.text.clone())],
            },
            task_type: request.task.as_str().to_string(),
            title: match request.task {
                EmbedTask::RetrievalDocument => request.title.clone(),
                EmbedTask::RetrievalQuery => None,
            },
            output_dimensionality: EMBEDDING_DIM,
        };
        let deadline = request.deadline.or_else(Deadline::current);
        let deadline = deadline.as_ref();
        let configured = self.settings.embed_timeout;
        let agent = request.agent.as_str();

        let result = self
            .retry
            .run(SERVICE, deadline, |attempt| {
                let (model, body) = (&model, &body);
                async move {
                    let read_timeout = attempt_timeout(SERVICE, configured, deadline)?;
                    bounded(SERVICE, deadline, async {
                        let _permit = self.gate.acquire().await?;
                        debug!(agent, model = %model, attempt, "embed");
                        self.client.embed_content(model, body, read_timeout).await
                    })
                    .await
                }
            })
            .await
            .and_then(|response| {
                let values = response.embedding.values;
                if values.len() != EMBEDDING_DIM {
                    return Err(WaypointError::bad_request(
                        SERVICE,
                        format!(
                            "embedding model returned dimension {}, expected {EMBEDDING_DIM}",
                            values.len()
                        ),
                    ));
                }
                Ok(values)
            });

        metrics::counter!(
            "waypoint_embed_calls_total",
            "agent" => request.agent.clone(),
            "outcome" => outcome_label(&result),
        )
        .increment(1);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use waypoint_core::ErrorKind;
    use waypoint_core::traits::InlineImage;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<UsageRecord>>);

    #[async_trait]
    impl UsageSink for RecordingSink {
        async fn record(&self, record: UsageRecord) -> Result<(), WaypointError> {
            self.0.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn gateway(server: &MockServer) -> GeminiGateway {
        let retry = RetryPolicy {
            base_delay: Duration::from_millis(10),
            ..RetryPolicy::default()
        }
        .without_jitter();
        gateway_with_retry(server, retry)
    }

    fn gateway_with_retry(server: &MockServer, retry: RetryPolicy) -> GeminiGateway {
        let mut config = GeminiConfig {
            base_url: server.uri(),
            ..GeminiConfig::default()
        };
        config
            .agent_models
            .insert("judge".into(), "gemini-2.0-pro".into());
        GeminiGateway::new(
            &config,
            SecretString::from("test-key".to_string()),
            retry,
            ConcurrencyGate::new("llm", 2),
        )
        .unwrap()
    }

    fn ok_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{"content": {"parts": [{"text": text}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 8, "totalTokenCount": 20}
        })
    }

    #[tokio::test]
    async fn generate_returns_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("{\"a\":1}")))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let gw = gateway(&server).with_usage_sink(sink.clone());
        let generation = gw
            .generate(GenerateRequest::new("persona", "hi").with_session(Some("s1".into())))
            .await
            .unwrap();
        assert_eq!(generation.text, "{\"a\":1}");
        assert_eq!(generation.usage.total_tokens, 20);
        assert_eq!(generation.model, "gemini-2.0-flash");

        // Usage is written on a spawned task.
        for _ in 0..50 {
            if !sink.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].agent_name, "persona");
        assert_eq!(records[0].session_id.as_deref(), Some("s1"));
        assert_eq!(records[0].prompt_tokens, 12);
    }

    #[tokio::test]
    async fn generate_retries_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("after retry")))
            .mount(&server)
            .await;

        let generation = gateway(&server)
            .generate(GenerateRequest::new("synth", "hi"))
            .await
            .unwrap();
        assert_eq!(generation.text, "after retry");
    }

    #[tokio::test]
    async fn generate_exhausts_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = gateway(&server)
            .generate(GenerateRequest::new("synth", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
    }

    #[tokio::test]
    async fn generate_stops_retrying_when_backoff_overruns_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;
        let retry = RetryPolicy {
            base_delay: Duration::from_millis(200),
            ..RetryPolicy::default()
        }
        .without_jitter();

        // 200 ms backoff fits into 300 ms, the 400 ms one does not.
        let request = GenerateRequest::new("persona", "hi")
            .with_deadline(Deadline::after(Duration::from_millis(300)));
        let err = gateway_with_retry(&server, retry)
            .generate(request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
    }

    #[tokio::test]
    async fn slow_generation_is_cut_at_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body("too late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let started = Instant::now();
        let request = GenerateRequest::new("persona", "hi")
            .with_deadline(Deadline::after(Duration::from_millis(300)));
        let err = gateway(&server).generate(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn embed_uses_the_ambient_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"embedding": {"values": vec![0.01f32; EMBEDDING_DIM]}}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let gw = gateway(&server);
        let started = Instant::now();
        let err = Deadline::after(Duration::from_millis(300))
            .scope(gw.embed(EmbedRequest::query("retrieval", "fjords")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn generate_does_not_retry_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = gateway(&server)
            .generate(GenerateRequest::new("persona", "hi"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn generate_does_not_retry_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "Invalid JSON payload", "status": "INVALID_ARGUMENT"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = gateway(&server)
            .generate(GenerateRequest::new("persona", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn agent_override_and_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-pro:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let generation = gateway(&server)
            .generate(GenerateRequest::new("judge", "score").expect_json())
            .await
            .unwrap();
        assert_eq!(generation.model, "gemini-2.0-pro");
    }

    #[tokio::test]
    async fn vision_request_inlines_base64_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [{"inlineData": {"mimeType": "image/jpeg", "data": "AQID"}}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("a lake at dawn")))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerateRequest::new("ingest", "describe").with_image(InlineImage {
            mime_type: "image/jpeg".into(),
            data: vec![1, 2, 3],
        });
        let generation = gateway(&server).generate(request).await.unwrap();
        assert_eq!(generation.text, "a lake at dawn");
    }

    #[tokio::test]
    async fn empty_candidates_are_parse_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .generate(GenerateRequest::new("persona", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn embed_requests_fixed_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:embedContent"))
            .and(body_partial_json(json!({
                "model": "models/text-embedding-004",
                "taskType": "RETRIEVAL_DOCUMENT",
                "title": "Hallstatt",
                "outputDimensionality": 768
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embedding": {"values": vec![0.01f32; EMBEDDING_DIM]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let v = gateway(&server)
            .embed(EmbedRequest::document("ingest", "lake village").with_title("Hallstatt"))
            .await
            .unwrap();
        assert_eq!(v.len(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn embed_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embedding": {"values": [0.1, 0.2, 0.3]}
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .embed(EmbedRequest::query("retrieval", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn embed_rejects_empty_text_without_calling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = gateway(&server)
            .embed(EmbedRequest::query("retrieval", "   "))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn health_check_reports_auth_failure_as_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models/gemini-2.0-flash"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let status = gateway(&server).health_check().await.unwrap();
        assert!(matches!(status, HealthStatus::Unhealthy(_)));
    }
}
