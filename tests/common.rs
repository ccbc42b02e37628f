// ABOUTME: Shared fixtures for integration tests
// ABOUTME: In-memory database resources and a scripted stub for the upstream model
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use rapport_server::{
    config::{ArkConfig, ServerConfig},
    database::{Database, NewChatLine},
    errors::{AppError, AppResult},
    llm::{AnalysisProvider, AnalysisStream, ModelOutcome, StreamEvent, UsageTotals},
    server::ServerResources,
};

/// What the scripted provider should do when called
#[derive(Debug, Clone)]
pub enum ScriptedBehavior {
    /// Emit these content deltas, then the optional usage totals, then finish
    Stream {
        deltas: Vec<String>,
        usage: Option<UsageTotals>,
    },
    /// Fail the call before any content is produced
    Fail(String),
}

/// Stub provider driven by a fixed script
///
/// Counts invocations so tests can assert that pre-network gates fire
/// before any upstream call.
pub struct ScriptedProvider {
    behavior: ScriptedBehavior,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(behavior: ScriptedBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// Provider emitting the given deltas with no usage frames
    pub fn with_deltas(deltas: &[&str]) -> Self {
        Self::new(ScriptedBehavior::Stream {
            deltas: deltas.iter().map(ToString::to_string).collect(),
            usage: None,
        })
    }

    /// Number of times the provider was invoked
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn full_content(deltas: &[String]) -> String {
        deltas.concat()
    }

    fn outcome(deltas: &[String], usage: UsageTotals) -> ModelOutcome {
        let content = Self::full_content(deltas);
        match serde_json::from_str(&content) {
            Ok(value) => ModelOutcome::Parsed {
                value,
                raw: content,
                usage,
            },
            Err(_) => ModelOutcome::Unparsed {
                raw: content,
                usage,
            },
        }
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    async fn complete(&self, _transcript: &str, _api_key: Option<&str>) -> AppResult<ModelOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            ScriptedBehavior::Stream { deltas, usage } => {
                Ok(Self::outcome(deltas, usage.unwrap_or_default()))
            }
            ScriptedBehavior::Fail(message) => Err(AppError::upstream(500, message.clone())),
        }
    }

    async fn complete_stream(
        &self,
        _transcript: &str,
        _api_key: Option<&str>,
    ) -> AppResult<AnalysisStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            ScriptedBehavior::Stream { deltas, usage } => {
                let deltas = deltas.clone();
                let usage = *usage;

                let stream = async_stream::stream! {
                    let mut content_length = 0usize;
                    let running = UsageTotals::default();

                    for delta in &deltas {
                        content_length += delta.chars().count();
                        yield Ok(StreamEvent::Content {
                            delta: delta.clone(),
                            content_length,
                            usage: running,
                        });
                    }

                    yield Ok(StreamEvent::Outcome(Self::outcome(
                        &deltas,
                        usage.unwrap_or_default(),
                    )));
                };

                Ok(Box::pin(stream))
            }
            ScriptedBehavior::Fail(message) => Err(AppError::upstream(500, message.clone())),
        }
    }
}

/// Build test server resources over an in-memory database
pub async fn create_test_resources(
    provider: Arc<ScriptedProvider>,
) -> anyhow::Result<Arc<ServerResources>> {
    create_test_resources_in(provider, PathBuf::from("exports")).await
}

/// Build test server resources with a specific export directory
pub async fn create_test_resources_in(
    provider: Arc<ScriptedProvider>,
    export_dir: PathBuf,
) -> anyhow::Result<Arc<ServerResources>> {
    let database = Database::new("sqlite::memory:").await?;

    let config = ServerConfig {
        http_port: 0,
        database_url: "sqlite::memory:".to_owned(),
        export_dir,
        ark: ArkConfig {
            api_key: Some("test-key".to_owned()),
            endpoint: "https://ark.example.com/api/v3".to_owned(),
            model: "test-model".to_owned(),
        },
    };

    Ok(Arc::new(ServerResources::new(database, provider, config)))
}

/// Create a contact and return its id
pub async fn create_test_contact(database: &Database, name: &str) -> anyhow::Result<i64> {
    let contact = database.contacts().create(name, None, "", "").await?;
    Ok(contact.id)
}

/// Append one chat line for a date and return its id
pub async fn add_test_line(
    database: &Database,
    contact_id: i64,
    speaker: &str,
    content: &str,
    chat_date: &str,
) -> anyhow::Result<i64> {
    database
        .chat_lines()
        .append_lines(
            contact_id,
            chat_date,
            &[NewChatLine {
                speaker: speaker.to_owned(),
                content: content.to_owned(),
            }],
        )
        .await?;

    let lines = database.chat_lines().list_for_contact(contact_id).await?;
    Ok(lines
        .iter()
        .rev()
        .find(|l| l.chat_date == chat_date && l.content == content)
        .map(|l| l.id)
        .expect("line just inserted"))
}

/// The model payload used by the end-to-end scenario
pub const SCENARIO_ANALYSIS_JSON: &str = r#"{"summary":"友好","core_traits":{},"behavior_preferences":{},"social_interaction":{},"cognitive_thinking":{},"interests":[],"dos_and_donts":{}}"#;
