// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Waypoint.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use waypoint_core::redact::REDACTED;

/// Top-level Waypoint configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WaypointConfig {
    /// HTTP surface settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Generative and embedding model settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Database, storage, and namespace settings.
    #[serde(default)]
    pub supabase: SupabaseConfig,

    /// Web search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Process-wide concurrency gates.
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Retry policy for every outbound call.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Reasoning pipeline settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Knowledge store and design log settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Media ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| REDACTED)
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Requests allowed per remote address per minute.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Bounded event buffer for streaming responses.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
            rate_limit_per_minute: default_rate_limit(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rate_limit() -> u32 {
    10
}

fn default_stream_buffer() -> usize {
    32
}

/// Gemini API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key. Usually supplied through `GEMINI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model used for text generation.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    /// Model used for image description.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Read timeout for generation in seconds.
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,

    /// Read timeout for embeddings in seconds.
    #[serde(default = "default_embed_timeout")]
    pub embed_timeout_secs: u64,

    /// Per-agent model overrides, keyed by agent name.
    #[serde(default)]
    pub agent_models: HashMap<String, String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            generation_model: default_generation_model(),
            vision_model: default_vision_model(),
            embedding_model: default_embedding_model(),
            connect_timeout_secs: default_connect_timeout(),
            generate_timeout_secs: default_generate_timeout(),
            embed_timeout_secs: default_embed_timeout(),
            agent_models: HashMap::new(),
        }
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("base_url", &self.base_url)
            .field("generation_model", &self.generation_model)
            .field("vision_model", &self.vision_model)
            .field("embedding_model", &self.embedding_model)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("generate_timeout_secs", &self.generate_timeout_secs)
            .field("embed_timeout_secs", &self.embed_timeout_secs)
            .field("agent_models", &self.agent_models)
            .finish()
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_vision_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_generate_timeout() -> u64 {
    60
}

fn default_embed_timeout() -> u64 {
    30
}

/// Supabase (PostgREST + storage) configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SupabaseConfig {
    /// Project URL. Usually supplied through `SUPABASE_URL`.
    #[serde(default)]
    pub url: Option<String>,

    /// Service-role key, preferred over the anon key.
    #[serde(default)]
    pub service_role_key: Option<String>,

    /// Anon key, used when no service-role key is configured.
    #[serde(default)]
    pub anon_key: Option<String>,

    /// Schema selected on every request.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Storage bucket for uploaded media.
    #[serde(default = "default_bucket")]
    pub storage_bucket: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Read timeout in seconds.
    #[serde(default = "default_db_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_role_key: None,
            anon_key: None,
            schema: default_schema(),
            storage_bucket: default_bucket(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_db_read_timeout(),
        }
    }
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_role_key", &redacted(&self.service_role_key))
            .field("anon_key", &redacted(&self.anon_key))
            .field("schema", &self.schema)
            .field("storage_bucket", &self.storage_bucket)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_bucket() -> String {
    "media".to_string()
}

fn default_db_read_timeout() -> u64 {
    30
}

/// Web search configuration.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Tavily key. Web scouting is disabled when absent.
    #[serde(default)]
    pub tavily_api_key: Option<String>,
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("tavily_api_key", &redacted(&self.tavily_api_key))
            .finish()
    }
}

/// Concurrency gate sizes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// Concurrent LLM calls across the process.
    #[serde(default = "default_llm_permits")]
    pub llm_permits: usize,

    /// Concurrent database calls across the process.
    #[serde(default = "default_db_permits")]
    pub db_permits: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            llm_permits: default_llm_permits(),
            db_permits: default_db_permits(),
        }
    }
}

fn default_llm_permits() -> usize {
    2
}

fn default_db_permits() -> usize {
    5
}

/// Retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Lower jitter factor.
    #[serde(default = "default_jitter_min")]
    pub jitter_min: f64,

    /// Upper jitter factor.
    #[serde(default = "default_jitter_max")]
    pub jitter_max: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            jitter_min: default_jitter_min(),
            jitter_max: default_jitter_max(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter_min() -> f64 {
    0.5
}

fn default_jitter_max() -> f64 {
    1.5
}

/// Reasoning pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Overall deadline for one recommendation, in seconds.
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,

    /// Share of the deadline persona inference may use before falling back
    /// to the neutral persona, in seconds.
    #[serde(default = "default_stage_budget")]
    pub persona_budget_secs: u64,

    /// Share of the deadline consensus may use before the advisory
    /// fallback, in seconds.
    #[serde(default = "default_stage_budget")]
    pub validate_budget_secs: u64,

    /// Minimum similarity for post candidates.
    #[serde(default = "default_post_threshold")]
    pub post_threshold: f32,

    /// Minimum similarity for media candidates.
    #[serde(default = "default_media_threshold")]
    pub media_threshold: f32,

    /// Candidates per retrieval.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Signals read per request.
    #[serde(default = "default_signal_limit")]
    pub signal_limit: usize,

    /// Signals summarized into the persona prompt.
    #[serde(default = "default_summary_signals")]
    pub summary_signals: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline(),
            persona_budget_secs: default_stage_budget(),
            validate_budget_secs: default_stage_budget(),
            post_threshold: default_post_threshold(),
            media_threshold: default_media_threshold(),
            top_k: default_top_k(),
            signal_limit: default_signal_limit(),
            summary_signals: default_summary_signals(),
        }
    }
}

fn default_deadline() -> u64 {
    30
}

fn default_stage_budget() -> u64 {
    10
}

fn default_post_threshold() -> f32 {
    0.5
}

fn default_media_threshold() -> f32 {
    0.4
}

fn default_top_k() -> usize {
    5
}

fn default_signal_limit() -> usize {
    20
}

fn default_summary_signals() -> usize {
    10
}

/// Knowledge store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Minimum similarity for related entries.
    #[serde(default = "default_memory_threshold")]
    pub threshold: f32,

    /// Entries returned per lookup.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Directory design logs are written to.
    #[serde(default = "default_design_log_dir")]
    pub design_log_dir: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            threshold: default_memory_threshold(),
            top_k: default_top_k(),
            design_log_dir: default_design_log_dir(),
        }
    }
}

fn default_memory_threshold() -> f32 {
    0.5
}

fn default_design_log_dir() -> String {
    "docs/design-log".to_string()
}

/// Media ingestion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Items per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches, in seconds.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Items processed concurrently within a batch.
    #[serde(default = "default_ingest_concurrency")]
    pub max_concurrency: usize,

    /// Maximum output width in pixels.
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// JPEG quality (1-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Download timeout in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Also write a row into the public site's media table.
    #[serde(default = "default_true")]
    pub dual_write: bool,

    /// Storage folder for uploaded media.
    #[serde(default = "default_ingest_folder")]
    pub folder: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cooldown_secs: default_cooldown(),
            max_concurrency: default_ingest_concurrency(),
            max_width: default_max_width(),
            jpeg_quality: default_jpeg_quality(),
            download_timeout_secs: default_download_timeout(),
            dual_write: default_true(),
            folder: default_ingest_folder(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_cooldown() -> u64 {
    2
}

fn default_ingest_concurrency() -> usize {
    3
}

fn default_max_width() -> u32 {
    1920
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_download_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_ingest_folder() -> String {
    "ingested".to_string()
}
