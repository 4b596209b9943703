// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM provider trait: text generation, vision, and embeddings.

use async_trait::async_trait;

use crate::deadline::Deadline;
use crate::error::WaypointError;
use crate::traits::adapter::PluginAdapter;
use crate::types::TokenUsage;

/// An image sent inline with a generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// A single generation call.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Logical caller, used for usage accounting and per-agent model overrides.
    pub agent: String,
    pub prompt: String,
    /// Explicit model id; `None` resolves through the per-agent map.
    pub model: Option<String>,
    /// Ask the provider for a JSON response body.
    pub json_output: bool,
    pub temperature: Option<f32>,
    pub image: Option<InlineImage>,
    pub session_id: Option<String>,
    /// Bounds retries and each attempt's read timeout. `None` falls back to
    /// the ambient [`Deadline::current`].
    pub deadline: Option<Deadline>,
}

impl GenerateRequest {
    pub fn new(agent: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            prompt: prompt.into(),
            model: None,
            json_output: false,
            temperature: None,
            image: None,
            session_id: None,
            deadline: None,
        }
    }

    pub fn expect_json(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// The text and token counts of a successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Embedding task hint sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedTask {
    RetrievalQuery,
    RetrievalDocument,
}

impl EmbedTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedTask::RetrievalQuery => "RETRIEVAL_QUERY",
            EmbedTask::RetrievalDocument => "RETRIEVAL_DOCUMENT",
        }
    }
}

/// A single embedding call.
#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub agent: String,
    pub text: String,
    pub task: EmbedTask,
    pub model: Option<String>,
    /// Document title, only meaningful for `RetrievalDocument`.
    pub title: Option<String>,
    pub deadline: Option<Deadline>,
}

impl EmbedRequest {
    pub fn query(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            text: text.into(),
            task: EmbedTask::RetrievalQuery,
            model: None,
            title: None,
            deadline: None,
        }
    }

    pub fn document(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            task: EmbedTask::RetrievalDocument,
            ..Self::query(agent, text)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Adapter for generative and embedding model access.
///
/// Implementations own timeouts, retries, rate shaping and usage accounting;
/// callers only see classified [`WaypointError`]s. Implementations must not
/// run past the request's deadline, explicit or ambient.
#[async_trait]
pub trait LlmProvider: PluginAdapter {
    /// Generates text (or JSON text) for the request.
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, WaypointError>;

    /// Embeds text into a vector of dimension [`crate::EMBEDDING_DIM`].
    async fn embed(&self, request: EmbedRequest) -> Result<Vec<f32>, WaypointError>;
}
