// ABOUTME: Orchestrates one analyze-and-persist cycle for a contact
// ABOUTME: Fetches the transcript, calls the model, normalizes, and upserts transactionally
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use super::transcript::{render_transcript, MIN_TRANSCRIPT_CHARS};
use super::{AnalysisScope, ProgressEvent};
use crate::database::{AnalysisRecord, ChatLineRecord, Database};
use crate::errors::{AppError, AppResult};
use crate::llm::{normalize, AnalysisProvider, StreamEvent, UsageTotals};

/// Result of a successful blocking analysis cycle
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// The persisted analysis record
    pub record: AnalysisRecord,
    /// Number of chat lines analyzed
    pub message_count: usize,
}

/// Analysis pipeline orchestrator
///
/// Stateless per invocation; holds the database handle and the model
/// provider. Concurrent invocations for the same contact race on the upsert
/// (last write wins) — an accepted limitation for the single-user
/// deployment, not a guarantee.
pub struct AnalysisEngine {
    database: Database,
    provider: Arc<dyn AnalysisProvider>,
}

impl AnalysisEngine {
    /// Create a new engine
    #[must_use]
    pub fn new(database: Database, provider: Arc<dyn AnalysisProvider>) -> Self {
        Self { database, provider }
    }

    /// Load and serialize the transcript for one invocation
    ///
    /// Applies the pre-network gates: contact existence, empty selection,
    /// empty transcript, and (selected mode only) the minimum usable length.
    async fn fetch_transcript(
        database: &Database,
        contact_id: i64,
        scope: &AnalysisScope,
    ) -> AppResult<(Vec<ChatLineRecord>, String)> {
        database
            .contacts()
            .get(contact_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Contact {contact_id}")))?;

        let lines = match scope {
            AnalysisScope::FullHistory => {
                database.chat_lines().list_for_contact(contact_id).await?
            }
            AnalysisScope::Selected(line_ids) => {
                if line_ids.is_empty() {
                    return Err(AppError::invalid_input(
                        "No chat lines selected for analysis",
                    ));
                }
                database
                    .chat_lines()
                    .list_selected(contact_id, line_ids)
                    .await?
            }
        };

        if lines.is_empty() {
            return Err(match scope {
                AnalysisScope::FullHistory => {
                    AppError::empty_transcript("No chat lines to analyze")
                }
                AnalysisScope::Selected(_) => {
                    AppError::empty_transcript("None of the selected chat lines were found")
                }
            });
        }

        let transcript = render_transcript(&lines);

        if matches!(scope, AnalysisScope::Selected(_))
            && transcript.chars().count() < MIN_TRANSCRIPT_CHARS
        {
            return Err(AppError::transcript_too_short(format!(
                "Selected chat lines total fewer than {MIN_TRANSCRIPT_CHARS} characters"
            )));
        }

        Ok((lines, transcript))
    }

    /// Run one blocking analysis cycle
    ///
    /// # Errors
    ///
    /// Returns an error on any pre-network gate, credential resolution,
    /// upstream call, or storage failure. Malformed model output is not an
    /// error; it persists as a defaulted document.
    pub async fn analyze(
        &self,
        contact_id: i64,
        scope: AnalysisScope,
        api_key: Option<&str>,
    ) -> AppResult<AnalysisOutcome> {
        let (lines, transcript) =
            Self::fetch_transcript(&self.database, contact_id, &scope).await?;

        let outcome = self.provider.complete(&transcript, api_key).await?;
        let normalized = normalize(outcome);

        let record = self
            .database
            .analysis()
            .upsert(contact_id, &normalized)
            .await?;

        info!(
            contact_id,
            message_count = lines.len(),
            total_tokens = normalized.usage.total_tokens,
            "Analysis persisted"
        );

        Ok(AnalysisOutcome {
            record,
            message_count: lines.len(),
        })
    }

    /// Run one streaming analysis cycle
    ///
    /// Every upstream content delta is forwarded immediately as a
    /// [`ProgressEvent::ContentUpdate`]; the stream ends with exactly one
    /// terminal event (`complete` on success, `error` otherwise). Failures
    /// are carried inside the stream rather than returned, so the caller
    /// can serialize every outcome the same way.
    pub fn analyze_stream(
        &self,
        contact_id: i64,
        scope: AnalysisScope,
        api_key: Option<String>,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let database = self.database.clone();
        let provider = Arc::clone(&self.provider);

        async_stream::stream! {
            let (lines, transcript) =
                match Self::fetch_transcript(&database, contact_id, &scope).await {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        yield ProgressEvent::Error { message: e.to_string() };
                        return;
                    }
                };

            let mut llm_stream =
                match provider.complete_stream(&transcript, api_key.as_deref()).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        yield ProgressEvent::Error { message: e.to_string() };
                        return;
                    }
                };

            let mut outcome = None;
            let mut last_usage = UsageTotals::default();

            while let Some(item) = llm_stream.next().await {
                match item {
                    Ok(StreamEvent::Content { content_length, usage, .. }) => {
                        last_usage = usage;
                        yield ProgressEvent::ContentUpdate {
                            content_length,
                            total_tokens: usage.total_tokens,
                            completion_tokens: usage.completion_tokens,
                        };
                    }
                    Ok(StreamEvent::Outcome(final_outcome)) => {
                        outcome = Some(final_outcome);
                    }
                    Err(e) => {
                        warn!(contact_id, "Streaming analysis failed: {e}");
                        yield ProgressEvent::Error { message: e.to_string() };
                        return;
                    }
                }
            }

            let Some(outcome) = outcome else {
                yield ProgressEvent::Error {
                    message: "The upstream stream ended without a result".to_owned(),
                };
                return;
            };

            // The upstream reports final usage in a trailing frame with no
            // content; relay it so progress counters settle before complete
            let final_usage = outcome.usage();
            if final_usage != last_usage {
                yield ProgressEvent::TokenUpdate {
                    total_tokens: final_usage.total_tokens,
                    completion_tokens: final_usage.completion_tokens,
                };
            }

            let normalized = normalize(outcome);

            let record = match database.analysis().upsert(contact_id, &normalized).await {
                Ok(record) => record,
                Err(e) => {
                    yield ProgressEvent::Error { message: e.to_string() };
                    return;
                }
            };

            info!(
                contact_id,
                message_count = lines.len(),
                total_tokens = final_usage.total_tokens,
                "Streaming analysis persisted"
            );

            yield ProgressEvent::Complete {
                analysis: record,
                message_count: lines.len(),
                total_tokens: final_usage.total_tokens,
                completion_tokens: final_usage.completion_tokens,
            };
        }
    }
}
