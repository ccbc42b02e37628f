// ABOUTME: Upstream model client layer for AI personality analysis
// ABOUTME: Defines message types, the typed model outcome, and the provider contract
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Upstream Model Client
//!
//! This module talks to the configured chat-completion endpoint that performs
//! personality analysis over a chat transcript. Two modes are supported:
//!
//! - **Blocking**: one request, one [`ModelOutcome`].
//! - **Streaming**: SSE-decoded content deltas relayed as [`StreamEvent`]s,
//!   terminated by a final [`StreamEvent::Outcome`].
//!
//! The model is an untrusted text generator. Its output is carried as a
//! [`ModelOutcome`] (`Parsed` when the accumulated text is valid JSON,
//! `Unparsed` otherwise) and must always pass through
//! [`normalize::normalize`] before persistence. Transport, credential, and
//! upstream-status failures are the `Err` arm of the surrounding `Result` —
//! there is no error variant hidden inside the outcome itself.

pub mod ark;
pub mod normalize;
pub mod prompts;
pub mod sse_parser;

pub use ark::ArkProvider;
pub use normalize::{normalize, AnalysisDocument, NormalizedAnalysis};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::errors::AppResult;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
}

impl MessageRole {
    /// Convert to string representation for API calls
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

// ============================================================================
// Outcome Types
// ============================================================================

/// Running token usage totals reported by the upstream stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Total tokens consumed so far
    pub total_tokens: u32,
    /// Completion tokens generated so far
    pub completion_tokens: u32,
}

/// What the model produced, after the call (or stream) finished
///
/// `Parsed` means the assistant content was valid JSON; `Unparsed` preserves
/// the text verbatim for the normalizer's tolerant extraction path. In both
/// cases `raw` is the unmodified upstream payload, kept for auditing.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutcome {
    /// Assistant content parsed as JSON
    Parsed {
        /// The parsed JSON value
        value: Value,
        /// The original content string
        raw: String,
        /// Final token totals (zero when the upstream reported none)
        usage: UsageTotals,
    },
    /// Assistant content that failed to parse as JSON
    Unparsed {
        /// The original content string
        raw: String,
        /// Final token totals (zero when the upstream reported none)
        usage: UsageTotals,
    },
}

impl ModelOutcome {
    /// The unmodified upstream payload
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Parsed { raw, .. } | Self::Unparsed { raw, .. } => raw,
        }
    }

    /// Final token totals for the call
    #[must_use]
    pub const fn usage(&self) -> UsageTotals {
        match self {
            Self::Parsed { usage, .. } | Self::Unparsed { usage, .. } => *usage,
        }
    }
}

/// An incremental event from a streaming analysis call
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A non-empty content delta arrived
    Content {
        /// The delta text
        delta: String,
        /// Cumulative content length (characters) including this delta
        content_length: usize,
        /// Latest known token totals
        usage: UsageTotals,
    },
    /// The stream ended; carries the accumulated result
    Outcome(ModelOutcome),
}

/// Stream type for streaming analysis calls
pub type AnalysisStream = Pin<Box<dyn Stream<Item = AppResult<StreamEvent>> + Send>>;

// ============================================================================
// Provider Trait
// ============================================================================

/// Contract for the upstream analysis model
///
/// The production implementation is [`ArkProvider`]; tests substitute a
/// scripted stub. `api_key` is the per-call credential override — `None`
/// falls back to the provider's configured key.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Perform a blocking analysis call over the given transcript
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is available, on transport
    /// failure, or when the upstream returns a non-2xx status.
    async fn complete(&self, transcript: &str, api_key: Option<&str>) -> AppResult<ModelOutcome>;

    /// Perform a streaming analysis call over the given transcript
    ///
    /// Content deltas are yielded as they arrive; the final item is a
    /// [`StreamEvent::Outcome`]. Mid-stream transport failures surface as an
    /// `Err` item and terminate the stream.
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is available, on transport
    /// failure, or when the upstream returns a non-2xx status before any
    /// frame is delivered.
    async fn complete_stream(
        &self,
        transcript: &str,
        api_key: Option<&str>,
    ) -> AppResult<AnalysisStream>;
}
