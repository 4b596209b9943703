// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-request reasoning state machine.
//!
//! ```text
//! INIT -> FETCH_SIGNALS -> INFER_PERSONA -> RETRIEVE -> VALIDATE -> SYNTHESIZE -> DONE
//!                                  any fatal step, timeout or synthesis error -> FALLBACK -> DONE
//! ```
//!
//! [`Orchestrator::recommend`] and [`Orchestrator::recommend_stream`] share
//! one pipeline; the streaming form pushes [`StreamEvent`]s into a bounded
//! channel as transitions happen.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use waypoint_config::model::OrchestratorConfig;
use waypoint_core::persona::{Persona, RequestMode, blend_factor};
use waypoint_core::recommendation::{ConsensusResult, Recommendation};
use waypoint_core::traits::{LlmProvider, SignalStore, VectorIndex};
use waypoint_core::types::{Candidate, CandidateKind, Signal};
use waypoint_core::{ErrorKind, WaypointError};
use waypoint_resilience::Deadline;

use crate::consensus::ConsensusAgent;
use crate::persona::PersonaAgent;
use crate::retrieval::RetrievalAgent;
use crate::synthesis::SynthesisAgent;

/// Confidence ceiling when neither retrieval produced candidates.
pub const EMPTY_CEILING: f32 = 0.5;

/// Confidence ceiling when one retrieval is empty or consensus rejected the set.
pub const PARTIAL_CEILING: f32 = 0.7;

/// Orchestrator stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    FetchSignals,
    InferPersona,
    Retrieve,
    Validate,
    Synthesize,
    Done,
    Fallback,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::FetchSignals => write!(f, "fetch_signals"),
            Stage::InferPersona => write!(f, "infer_persona"),
            Stage::Retrieve => write!(f, "retrieve"),
            Stage::Validate => write!(f, "validate"),
            Stage::Synthesize => write!(f, "synthesize"),
            Stage::Done => write!(f, "done"),
            Stage::Fallback => write!(f, "fallback"),
        }
    }
}

/// Tunables for one orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub deadline: Duration,
    /// Longest persona inference may take before the neutral persona is used.
    pub persona_budget: Duration,
    /// Longest consensus may take before the advisory fallback is used.
    pub validate_budget: Duration,
    pub post_threshold: f32,
    pub media_threshold: f32,
    pub top_k: usize,
    pub signal_limit: usize,
    pub summary_signals: usize,
}

impl OrchestratorSettings {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            deadline: Duration::from_secs(config.deadline_secs),
            persona_budget: Duration::from_secs(config.persona_budget_secs),
            validate_budget: Duration::from_secs(config.validate_budget_secs),
            post_threshold: config.post_threshold,
            media_threshold: config.media_threshold,
            top_k: config.top_k,
            signal_limit: config.signal_limit,
            summary_signals: config.summary_signals,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

/// Input to one recommendation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendRequest {
    pub session_id: String,
    pub query: String,
    pub user_id: Option<String>,
}

impl RecommendRequest {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// What happened during one run. Logged and measured, never returned to
/// HTTP callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub alpha: f32,
    pub mode: RequestMode,
    pub signal_count: usize,
    /// Stages that used a local fallback.
    pub degraded: Vec<Stage>,
    /// Last stage reached: `Done` on success, `Fallback` otherwise.
    pub terminal: Stage,
    pub fatal: Option<ErrorKind>,
    pub timed_out: bool,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub post_count: usize,
    pub media_count: usize,
    pub consensus: Option<ConsensusResult>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            mode: RequestMode::ColdStart,
            signal_count: 0,
            degraded: Vec::new(),
            terminal: Stage::Init,
            fatal: None,
            timed_out: false,
            cancelled: false,
            elapsed: Duration::ZERO,
            post_count: 0,
            media_count: 0,
            consensus: None,
        }
    }
}

impl Trace {
    fn degrade(&mut self, stage: Stage) {
        if !self.degraded.contains(&stage) {
            self.degraded.push(stage);
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.terminal == Stage::Fallback
    }

    /// Metric label for the run: `ok`, `degraded` or `fallback`.
    pub fn outcome(&self) -> &'static str {
        if self.is_fallback() {
            "fallback"
        } else if self.degraded.is_empty() {
            "ok"
        } else {
            "degraded"
        }
    }
}

/// A recommendation plus how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationOutcome {
    pub recommendation: Recommendation,
    pub trace: Trace,
}

/// One line of the streaming response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Status {
        stage: Stage,
    },
    Analysis {
        persona: Persona,
        alpha: f32,
        mode: RequestMode,
    },
    Token {
        text: String,
    },
    Result {
        recommendation: Recommendation,
    },
}

/// Why the pipeline stopped early.
enum Abort {
    Fatal(Stage, WaypointError),
    Synthesis(WaypointError),
    Cancelled,
}

type Events<'a> = Option<&'a mpsc::Sender<StreamEvent>>;

async fn emit(events: Events<'_>, event: StreamEvent) -> Result<(), Abort> {
    match events {
        Some(tx) => tx.send(event).await.map_err(|_| Abort::Cancelled),
        None => Ok(()),
    }
}

async fn enter(trace: &mut Trace, events: Events<'_>, stage: Stage) -> Result<(), Abort> {
    trace.terminal = stage;
    debug!(stage = %stage, "orchestrator transition");
    emit(events, StreamEvent::Status { stage }).await
}

/// Applies the confidence ceilings for sparse or rejected evidence.
pub fn cap_confidence(
    confidence: f32,
    post_count: usize,
    media_count: usize,
    consensus: &ConsensusResult,
) -> f32 {
    let mut ceiling: f32 = 1.0;
    match (post_count == 0, media_count == 0) {
        (true, true) => ceiling = ceiling.min(EMPTY_CEILING),
        (true, false) | (false, true) => ceiling = ceiling.min(PARTIAL_CEILING),
        (false, false) => {}
    }
    if !consensus.is_validated {
        ceiling = ceiling.min(PARTIAL_CEILING);
    }
    confidence.min(ceiling)
}

/// Keeps only judge picks that name a retrieved candidate.
pub fn retain_known_matches(
    consensus: &mut ConsensusResult,
    posts: &[Candidate],
    media: &[Candidate],
) {
    let known: HashSet<&str> = posts
        .iter()
        .chain(media.iter())
        .map(|c| c.id.as_str())
        .collect();
    consensus.top_matches.retain(|id| known.contains(id.as_str()));
}

/// Whitespace-delimited chunks that concatenate back to `content`.
pub fn token_chunks(content: &str) -> impl Iterator<Item = &str> {
    content.split_inclusive(char::is_whitespace)
}

/// Drives the agents for one request at a time; cheap to share behind `Arc`.
pub struct Orchestrator {
    signals: Arc<dyn SignalStore>,
    persona: PersonaAgent,
    retrieval: RetrievalAgent,
    consensus: ConsensusAgent,
    synthesis: SynthesisAgent,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        signals: Arc<dyn SignalStore>,
        index: Arc<dyn VectorIndex>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            signals,
            persona: PersonaAgent::new(llm.clone(), settings.summary_signals),
            retrieval: RetrievalAgent::new(llm.clone(), index),
            consensus: ConsensusAgent::new(llm.clone()),
            synthesis: SynthesisAgent::new(llm),
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Produce a recommendation. Never fails: every error path ends in the
    /// fallback payload.
    pub async fn recommend(&self, request: RecommendRequest) -> RecommendationOutcome {
        self.execute(&request, None).await
    }

    /// Same as [`recommend`](Self::recommend), emitting progress into
    /// `events`. Dropping the receiver cancels the run.
    pub async fn recommend_stream(
        &self,
        request: RecommendRequest,
        events: mpsc::Sender<StreamEvent>,
    ) -> RecommendationOutcome {
        self.execute(&request, Some(&events)).await
    }

    async fn execute(&self, request: &RecommendRequest, events: Events<'_>) -> RecommendationOutcome {
        let deadline = Deadline::after(self.settings.deadline);
        let mut trace = Trace::default();

        let result = {
            let run = deadline.scope(self.pipeline(request, &deadline, events, &mut trace));
            let watched = async {
                match events {
                    Some(tx) => tokio::select! {
                        result = run => result,
                        _ = tx.closed() => Err(Abort::Cancelled),
                    },
                    None => run.await,
                }
            };
            tokio::time::timeout_at(deadline.instant(), watched).await
        };

        let recommendation = match result {
            Ok(Ok(recommendation)) => Some(recommendation),
            Ok(Err(Abort::Fatal(stage, e))) => {
                warn!(stage = %stage, kind = %e.kind(), error = %e, "fatal error, answering with fallback");
                trace.fatal = Some(e.kind());
                None
            }
            Ok(Err(Abort::Synthesis(e))) => {
                warn!(kind = %e.kind(), error = %e, "synthesis failed, answering with fallback");
                if e.is_fatal() {
                    trace.fatal = Some(e.kind());
                }
                None
            }
            Ok(Err(Abort::Cancelled)) => {
                trace.cancelled = true;
                None
            }
            Err(_) => {
                warn!(
                    stage = %trace.terminal,
                    budget_ms = deadline.budget().as_millis() as u64,
                    "deadline exceeded, answering with fallback"
                );
                trace.timed_out = true;
                None
            }
        };

        let recommendation = match recommendation {
            Some(recommendation) => {
                trace.terminal = Stage::Done;
                recommendation
            }
            None => {
                trace.terminal = Stage::Fallback;
                Recommendation::fallback(&request.query)
            }
        };
        trace.elapsed = deadline.elapsed();

        if !trace.cancelled {
            self.finish_stream(events, &trace, &recommendation).await;
        }
        self.report(request, &trace);

        RecommendationOutcome {
            recommendation,
            trace,
        }
    }

    async fn finish_stream(&self, events: Events<'_>, trace: &Trace, recommendation: &Recommendation) {
        let Some(tx) = events else {
            return;
        };
        let mut terminal = Vec::with_capacity(3);
        if trace.is_fallback() {
            terminal.push(StreamEvent::Status {
                stage: Stage::Fallback,
            });
        }
        terminal.push(StreamEvent::Status { stage: Stage::Done });
        terminal.push(StreamEvent::Result {
            recommendation: recommendation.clone(),
        });
        for event in terminal {
            if tx.send(event).await.is_err() {
                debug!("stream receiver closed before the terminal result");
                return;
            }
        }
    }

    fn report(&self, request: &RecommendRequest, trace: &Trace) {
        let outcome = if trace.cancelled {
            "cancelled"
        } else {
            trace.outcome()
        };
        metrics::counter!("waypoint_recommendations_total", "outcome" => outcome).increment(1);
        metrics::counter!("waypoint_request_mode_total", "mode" => trace.mode.as_str()).increment(1);
        metrics::histogram!("waypoint_recommendation_latency_seconds")
            .record(trace.elapsed.as_secs_f64());

        let degraded: Vec<String> = trace.degraded.iter().map(Stage::to_string).collect();
        info!(
            session_id = %request.session_id,
            user_id = request.user_id.as_deref().unwrap_or("-"),
            mode = %trace.mode,
            alpha = trace.alpha,
            signals = trace.signal_count,
            posts = trace.post_count,
            media = trace.media_count,
            degraded = ?degraded,
            terminal = %trace.terminal,
            outcome,
            elapsed_ms = trace.elapsed.as_millis() as u64,
            "recommendation complete"
        );
    }

    async fn pipeline(
        &self,
        request: &RecommendRequest,
        deadline: &Deadline,
        events: Events<'_>,
        trace: &mut Trace,
    ) -> Result<Recommendation, Abort> {
        let session = Some(request.session_id.as_str());

        enter(trace, events, Stage::FetchSignals).await?;
        let signals = self.fetch_signals(&request.session_id, trace).await;
        trace.signal_count = signals.len();
        trace.alpha = blend_factor(signals.len());
        trace.mode = RequestMode::from_signal_count(signals.len());

        enter(trace, events, Stage::InferPersona).await?;
        let inference = self
            .persona
            .infer(
                &request.query,
                &signals,
                trace.mode,
                trace.alpha,
                session,
                Some(deadline.narrowed(self.settings.persona_budget)),
            )
            .await
            .map_err(|e| Abort::Fatal(Stage::InferPersona, e))?;
        if inference.degraded {
            trace.degrade(Stage::InferPersona);
        }
        let persona = inference.persona;
        emit(
            events,
            StreamEvent::Analysis {
                persona: persona.clone(),
                alpha: trace.alpha,
                mode: trace.mode,
            },
        )
        .await?;

        enter(trace, events, Stage::Retrieve).await?;
        let k = self.settings.top_k;
        let (posts, media) = tokio::join!(
            self.retrieval.retrieve(
                &request.query,
                &persona,
                CandidateKind::Post,
                self.settings.post_threshold,
                k,
            ),
            self.retrieval.retrieve(
                &request.query,
                &persona,
                CandidateKind::Media,
                self.settings.media_threshold,
                k,
            ),
        );
        let posts = posts.map_err(|e| Abort::Fatal(Stage::Retrieve, e))?;
        let media = media.map_err(|e| Abort::Fatal(Stage::Retrieve, e))?;
        if posts.degraded || media.degraded {
            trace.degrade(Stage::Retrieve);
        }
        let (posts, media) = (posts.candidates, media.candidates);
        trace.post_count = posts.len();
        trace.media_count = media.len();

        enter(trace, events, Stage::Validate).await?;
        let mut consensus = self
            .consensus
            .validate(
                &persona,
                &posts,
                &media,
                session,
                Some(deadline.narrowed(self.settings.validate_budget)),
            )
            .await
            .map_err(|e| Abort::Fatal(Stage::Validate, e))?;
        if consensus.fallback {
            trace.degrade(Stage::Validate);
        }
        retain_known_matches(&mut consensus, &posts, &media);
        trace.consensus = Some(consensus.clone());

        enter(trace, events, Stage::Synthesize).await?;
        let draft = self
            .synthesis
            .synthesize(
                &request.query,
                &persona,
                &posts,
                &media,
                &consensus,
                session,
                Some(*deadline),
            )
            .await
            .map_err(Abort::Synthesis)?;

        let recommendation = Recommendation {
            confidence: cap_confidence(draft.confidence, posts.len(), media.len(), &consensus),
            content: draft.content,
            reasoning: draft.reasoning,
            constraints: persona.constraints(),
            lifestyle_vibe: persona.vibe,
        };

        for chunk in token_chunks(&recommendation.content) {
            emit(
                events,
                StreamEvent::Token {
                    text: chunk.to_string(),
                },
            )
            .await?;
        }
        Ok(recommendation)
    }

    async fn fetch_signals(&self, session_id: &str, trace: &mut Trace) -> Vec<Signal> {
        match self
            .signals
            .recent_signals(session_id, self.settings.signal_limit)
            .await
        {
            Ok(signals) => signals,
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "signal fetch failed, continuing cold");
                trace.degrade(Stage::FetchSignals);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use waypoint_core::recommendation::FALLBACK_REASONING;
    use waypoint_core::types::EventType;
    use waypoint_test_utils::{InMemoryIndex, InMemorySignalStore, ScriptedLlm};

    use super::*;
    use crate::{consensus, persona, synthesis};

    fn persona_json() -> serde_json::Value {
        json!({
            "vibe": "Alpine Slow Living",
            "budget_tier": "Mid-range",
            "pace": "Slow",
            "social_density": "Low",
            "intent": "wants quiet",
            "confidence": 0.8,
            "keywords": ["village"]
        })
    }

    fn orchestrator(llm: Arc<ScriptedLlm>, signals: Arc<InMemorySignalStore>) -> Orchestrator {
        Orchestrator::new(
            llm,
            signals,
            Arc::new(InMemoryIndex::new()),
            OrchestratorSettings::default(),
        )
    }

    #[test]
    fn stage_display_is_snake_case() {
        assert_eq!(Stage::FetchSignals.to_string(), "fetch_signals");
        assert_eq!(
            serde_json::to_value(StreamEvent::Status {
                stage: Stage::InferPersona
            })
            .unwrap(),
            json!({"type": "status", "stage": "infer_persona"})
        );
    }

    #[test]
    fn ceilings_stack() {
        let ok = ConsensusResult {
            score: 0.9,
            is_validated: true,
            critique: String::new(),
            top_matches: vec![],
            refining_instructions: String::new(),
            fallback: false,
        };
        let rejected = ConsensusResult {
            is_validated: false,
            ..ok.clone()
        };
        assert_eq!(cap_confidence(0.95, 2, 2, &ok), 0.95);
        assert_eq!(cap_confidence(0.95, 0, 2, &ok), PARTIAL_CEILING);
        assert_eq!(cap_confidence(0.95, 0, 0, &ok), EMPTY_CEILING);
        assert_eq!(cap_confidence(0.95, 3, 3, &rejected), PARTIAL_CEILING);
        assert_eq!(cap_confidence(0.95, 0, 0, &rejected), EMPTY_CEILING);
        assert_eq!(cap_confidence(0.2, 0, 0, &rejected), 0.2);
    }

    #[test]
    fn unknown_matches_are_dropped() {
        let mut c = ConsensusResult::advisory_fallback();
        c.top_matches = vec!["m1".into(), "ghost".into(), "p1".into()];
        let posts = vec![Candidate::new("p1", CandidateKind::Post, 0.9)];
        let media = vec![Candidate::new("m1", CandidateKind::Media, 0.9)];
        retain_known_matches(&mut c, &posts, &media);
        assert_eq!(c.top_matches, vec!["m1", "p1"]);
    }

    #[test]
    fn token_chunks_rebuild_content() {
        let content = "Stay in  Gimmelwald.\nWalk early.";
        let chunks: Vec<&str> = token_chunks(content).collect();
        assert_eq!(chunks.concat(), content);
        assert_eq!(chunks[0], "Stay ");
    }

    #[tokio::test]
    async fn signal_failure_degrades_to_cold_start() {
        let llm = Arc::new(ScriptedLlm::new());
        let signals = Arc::new(InMemorySignalStore::new());
        signals
            .fail_with(|| WaypointError::upstream("supabase", "503"))
            .await;
        llm.push_json(persona::AGENT, &persona_json()).await;
        llm.push_json(consensus::AGENT, &json!({"consensus_score": 0.4, "is_validated": false}))
            .await;
        llm.push_json(synthesis::AGENT, &json!({"content": "Try Wengen.", "confidence": 0.9}))
            .await;

        let out = orchestrator(llm, signals)
            .recommend(RecommendRequest::new("s1", "quiet alps"))
            .await;
        assert_eq!(out.trace.mode, RequestMode::ColdStart);
        assert_eq!(out.trace.alpha, 1.0);
        assert!(out.trace.degraded.contains(&Stage::FetchSignals));
        assert_eq!(out.trace.terminal, Stage::Done);
        assert_eq!(out.trace.outcome(), "degraded");
        assert_eq!(out.recommendation.lifestyle_vibe, "Alpine Slow Living");
        assert_eq!(
            out.recommendation.constraints,
            vec!["budget:Mid-range", "pace:Slow", "density:Low"]
        );
        assert_eq!(out.recommendation.confidence, EMPTY_CEILING);
    }

    #[tokio::test]
    async fn warm_signals_set_alpha() {
        let llm = Arc::new(ScriptedLlm::new());
        let signals = Arc::new(InMemorySignalStore::new());
        for _ in 0..4 {
            signals
                .append_signal(&Signal::new("s1", EventType::Click))
                .await
                .unwrap();
        }
        llm.push_json(persona::AGENT, &persona_json()).await;
        llm.push_json(consensus::AGENT, &json!({"consensus_score": 0.8})).await;
        llm.push_json(synthesis::AGENT, &json!({"content": "c"})).await;

        let out = orchestrator(llm.clone(), signals)
            .recommend(RecommendRequest::new("s1", "q"))
            .await;
        assert_eq!(out.trace.mode, RequestMode::WarmStart);
        assert!((out.trace.alpha - 0.6).abs() < 1e-6);
        assert!(llm.calls(persona::AGENT).await == 1);
    }

    #[tokio::test]
    async fn fatal_persona_error_returns_fallback() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_error(persona::AGENT, || WaypointError::Auth {
            service: "gemini".into(),
            message: "revoked".into(),
        })
        .await;
        let out = orchestrator(llm.clone(), Arc::new(InMemorySignalStore::new()))
            .recommend(RecommendRequest::new("s1", "beaches"))
            .await;
        assert!(out.recommendation.is_fallback());
        assert_eq!(out.recommendation.reasoning, FALLBACK_REASONING);
        assert_eq!(out.trace.fatal, Some(ErrorKind::Auth));
        assert_eq!(out.trace.terminal, Stage::Fallback);
        assert_eq!(llm.calls(synthesis::AGENT).await, 0);
    }

    #[tokio::test]
    async fn stream_emits_transitions_then_result() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_json(persona::AGENT, &persona_json()).await;
        llm.push_json(consensus::AGENT, &json!({"consensus_score": 0.8})).await;
        llm.push_json(synthesis::AGENT, &json!({"content": "Go north now"})).await;
        let orch = orchestrator(llm, Arc::new(InMemorySignalStore::new()));

        let (tx, mut rx) = mpsc::channel(64);
        let out = orch
            .recommend_stream(RecommendRequest::new("s1", "q"), tx)
            .await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        let stages: Vec<Stage> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Status { stage } => Some(*stage),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                Stage::FetchSignals,
                Stage::InferPersona,
                Stage::Retrieve,
                Stage::Validate,
                Stage::Synthesize,
                Stage::Done
            ]
        );
        assert!(matches!(events[2], StreamEvent::Analysis { .. }));
        let tokens: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, "Go north now");
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Result {
                recommendation: out.recommendation
            })
        );
    }

    #[tokio::test]
    async fn closed_receiver_cancels() {
        let llm = Arc::new(ScriptedLlm::new());
        let orch = orchestrator(llm.clone(), Arc::new(InMemorySignalStore::new()));
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let out = orch
            .recommend_stream(RecommendRequest::new("s1", "q"), tx)
            .await;
        assert!(out.trace.cancelled);
        assert!(out.recommendation.is_fallback());
        assert_eq!(llm.requests().await.len(), 0);
    }
}
