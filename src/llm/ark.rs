// ABOUTME: OpenAI-compatible chat-completion client for the configured Ark endpoint
// ABOUTME: Supports blocking and SSE-streaming analysis calls with typed outcomes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Ark Provider
//!
//! Client for the OpenAI-compatible `/chat/completions` endpoint that runs
//! the personality analysis. Configuration ([`ArkConfig`]) is injected at
//! construction; the caller may override the credential per call.
//!
//! Every call is single-attempt: no retries, no backoff. The upstream call
//! is not idempotent (generation is paid for even when the response is
//! discarded), so failures are surfaced to the orchestrator as typed errors
//! instead of being retried here.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::prompts::{analysis_user_prompt, ANALYST_SYSTEM_PROMPT};
use super::sse_parser::{SseEvent, SseLineBuffer};
use super::{
    AnalysisProvider, AnalysisStream, ChatMessage, ModelOutcome, StreamEvent, UsageTotals,
};
use crate::config::ArkConfig;
use crate::errors::{AppError, AppResult};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Connection timeout for the upstream endpoint
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Request timeout for blocking analysis calls
const BLOCKING_TIMEOUT_SECS: u64 = 120;

/// Request timeout for streaming analysis calls (total generation time is
/// longer than a blocking response's first byte)
const STREAMING_TIMEOUT_SECS: u64 = 180;

/// Sampling temperature, fixed for reproducible analysis texture
const TEMPERATURE: f32 = 0.7;

/// Maximum output size in tokens
const MAX_TOKENS: u32 = 4096;

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

/// Chat-completion request body
#[derive(Debug, Serialize)]
struct ArkRequest {
    model: String,
    messages: Vec<ArkMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Message structure for the wire format
#[derive(Debug, Serialize)]
struct ArkMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for ArkMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

/// Blocking response body
#[derive(Debug, Deserialize)]
struct ArkResponse {
    choices: Vec<ArkChoice>,
    #[serde(default)]
    usage: Option<ArkUsage>,
}

/// Choice in a blocking response
#[derive(Debug, Deserialize)]
struct ArkChoice {
    message: ArkResponseMessage,
}

/// Assistant message in a blocking response
#[derive(Debug, Deserialize)]
struct ArkResponseMessage {
    content: Option<String>,
}

/// Usage statistics frame
#[derive(Debug, Deserialize)]
struct ArkUsage {
    #[serde(default)]
    total_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl From<&ArkUsage> for UsageTotals {
    fn from(usage: &ArkUsage) -> Self {
        Self {
            total_tokens: usage.total_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

/// Streaming chunk frame
#[derive(Debug, Deserialize)]
struct ArkStreamFrame {
    #[serde(default)]
    choices: Vec<ArkStreamChoice>,
    #[serde(default)]
    usage: Option<ArkUsage>,
}

/// Choice in a streaming chunk
#[derive(Debug, Deserialize)]
struct ArkStreamChoice {
    #[serde(default)]
    delta: ArkDelta,
}

/// Delta content in a streaming chunk
#[derive(Debug, Default, Deserialize)]
struct ArkDelta {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Chat-completion client for the configured Ark endpoint
pub struct ArkProvider {
    client: Client,
    config: ArkConfig,
}

impl ArkProvider {
    /// Create a new provider with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ArkConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Build the chat-completions URL
    fn api_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    /// Resolve the credential for one call: caller override, then configured
    /// key, else fail before any network activity
    fn resolve_api_key(&self, api_key: Option<&str>) -> AppResult<String> {
        api_key
            .filter(|k| !k.is_empty())
            .map(ToOwned::to_owned)
            .or_else(|| self.config.api_key.clone())
            .ok_or_else(AppError::missing_credential)
    }

    /// Build the two-message request body for a transcript
    fn build_request(&self, transcript: &str, stream: bool) -> ArkRequest {
        let messages = vec![
            ChatMessage::system(ANALYST_SYSTEM_PROMPT),
            ChatMessage::user(analysis_user_prompt(transcript)),
        ];

        ArkRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(ArkMessage::from).collect(),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: stream.then_some(true),
        }
    }

    /// Interpret one decoded SSE frame, updating totals and the accumulator
    ///
    /// Returns a content event when the frame carried a non-empty delta.
    /// Frames that fail to parse are skipped, not fatal.
    fn apply_frame(
        json_str: &str,
        content: &mut String,
        content_length: &mut usize,
        usage: &mut UsageTotals,
    ) -> Option<StreamEvent> {
        let frame: ArkStreamFrame = match serde_json::from_str(json_str) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Skipping unparseable stream frame: {e}");
                return None;
            }
        };

        if let Some(frame_usage) = &frame.usage {
            *usage = frame_usage.into();
        }

        let delta = frame
            .choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .unwrap_or_default();

        if delta.is_empty() {
            return None;
        }

        content.push_str(delta);
        *content_length += delta.chars().count();

        Some(StreamEvent::Content {
            delta: delta.to_owned(),
            content_length: *content_length,
            usage: *usage,
        })
    }

    /// Parse the accumulated buffer into the final outcome
    fn finish(content: String, usage: UsageTotals) -> ModelOutcome {
        match serde_json::from_str::<Value>(&content) {
            Ok(value) => ModelOutcome::Parsed {
                value,
                raw: content,
                usage,
            },
            Err(_) => {
                warn!("Model returned non-JSON content ({} chars)", content.len());
                ModelOutcome::Unparsed {
                    raw: content,
                    usage,
                }
            }
        }
    }
}

#[async_trait]
impl AnalysisProvider for ArkProvider {
    async fn complete(&self, transcript: &str, api_key: Option<&str>) -> AppResult<ModelOutcome> {
        let key = self.resolve_api_key(api_key)?;
        let request = self.build_request(transcript, false);

        debug!(
            model = %self.config.model,
            transcript_chars = transcript.chars().count(),
            "Sending blocking analysis request"
        );

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(key)
            .timeout(Duration::from_secs(BLOCKING_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(AppError::upstream(status.as_u16(), body));
        }

        let parsed: ArkResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::upstream(
                status.as_u16(),
                format!("unexpected response shape: {e}: {body}"),
            )
        })?;

        let usage = parsed
            .usage
            .as_ref()
            .map(UsageTotals::from)
            .unwrap_or_default();

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(Self::finish(content, usage))
    }

    async fn complete_stream(
        &self,
        transcript: &str,
        api_key: Option<&str>,
    ) -> AppResult<AnalysisStream> {
        let key = self.resolve_api_key(api_key)?;
        let request = self.build_request(transcript, true);

        debug!(
            model = %self.config.model,
            transcript_chars = transcript.chars().count(),
            "Sending streaming analysis request"
        );

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(key)
            .timeout(Duration::from_secs(STREAMING_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(status.as_u16(), body));
        }

        let mut byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut parser = SseLineBuffer::new();
            let mut content = String::new();
            let mut content_length = 0usize;
            let mut usage = UsageTotals::default();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(AppError::network(format!("Stream read error: {e}")));
                        return;
                    }
                };

                for event in parser.feed(&bytes) {
                    match event {
                        SseEvent::Data(json_str) => {
                            if let Some(update) = Self::apply_frame(
                                &json_str,
                                &mut content,
                                &mut content_length,
                                &mut usage,
                            ) {
                                yield Ok(update);
                            }
                        }
                        // Terminal sentinel; the byte stream closes right after
                        SseEvent::Done => {}
                    }
                }
            }

            for event in parser.flush() {
                if let SseEvent::Data(json_str) = event {
                    if let Some(update) = Self::apply_frame(
                        &json_str,
                        &mut content,
                        &mut content_length,
                        &mut usage,
                    ) {
                        yield Ok(update);
                    }
                }
            }

            yield Ok(StreamEvent::Outcome(Self::finish(content, usage)));
        };

        Ok(Box::pin(stream))
    }
}
