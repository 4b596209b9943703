// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gemini gateway for Waypoint.
//!
//! [`GeminiGateway`] implements [`LlmProvider`](waypoint_core::LlmProvider)
//! on top of the Gemini REST API: text and vision generation, JSON mode,
//! and 768-dimension retrieval embeddings. Every call passes through the
//! shared `llm` concurrency gate and the retry policy, and successful
//! generations are handed to an optional usage sink.

pub mod blocking;
pub mod client;
pub mod gateway;
pub mod types;

pub use blocking::BlockingGateway;
pub use client::{GeminiClient, SERVICE};
pub use gateway::{GatewaySettings, GeminiGateway};
