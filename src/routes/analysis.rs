// ABOUTME: Analysis route handlers for blocking and streaming invocations
// ABOUTME: Streaming responses relay pipeline progress as newline-delimited JSON events
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Analysis routes
//!
//! Four trigger flavors: full-history and selected-subset, each blocking and
//! streaming. Streaming responses are `application/x-ndjson` — one JSON
//! event object per line, `type`-discriminated, terminated by a single
//! `complete` or `error` event. Events are written as the pipeline produces
//! them, never buffered, so the caller's progress indicator tracks real
//! generation latency.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};

use crate::analysis::{AnalysisScope, ProgressEvent};
use crate::database::AnalysisRecord;
use crate::errors::{AppError, AppResult};
use crate::server::ServerResources;

/// Content type for the streaming event protocol
const NDJSON: &str = "application/x-ndjson";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for full-history analysis
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    /// Per-call credential override
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Request body for selected-subset analysis
#[derive(Debug, Deserialize)]
pub struct AnalyzeSelectedRequest {
    /// Chat line ids to analyze
    #[serde(default)]
    pub message_ids: Vec<i64>,
    /// Per-call credential override
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Response wrapping a persisted analysis
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// The persisted analysis record
    pub analysis: AnalysisRecord,
    /// Number of chat lines analyzed (selected-subset responses only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
}

// ============================================================================
// Analysis Routes
// ============================================================================

/// Analysis routes handler
pub struct AnalysisRoutes;

impl AnalysisRoutes {
    /// Create all analysis routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/contacts/:contact_id/analyze", post(Self::analyze))
            .route(
                "/api/contacts/:contact_id/analyze/stream",
                post(Self::analyze_stream),
            )
            .route(
                "/api/contacts/:contact_id/analyze-selected",
                post(Self::analyze_selected),
            )
            .route(
                "/api/contacts/:contact_id/analyze-selected/stream",
                post(Self::analyze_selected_stream),
            )
            .route(
                "/api/contacts/:contact_id/analysis",
                get(Self::get_analysis),
            )
            .with_state(resources)
    }

    /// Blocking full-history analysis
    async fn analyze(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
        request: Option<Json<AnalyzeRequest>>,
    ) -> AppResult<Json<AnalysisResponse>> {
        let api_key = request.and_then(|Json(r)| r.api_key);

        let outcome = resources
            .engine()
            .analyze(contact_id, AnalysisScope::FullHistory, api_key.as_deref())
            .await?;

        Ok(Json(AnalysisResponse {
            analysis: outcome.record,
            message_count: None,
        }))
    }

    /// Streaming full-history analysis
    async fn analyze_stream(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
        request: Option<Json<AnalyzeRequest>>,
    ) -> Response {
        let api_key = request.and_then(|Json(r)| r.api_key);
        let events = resources
            .engine()
            .analyze_stream(contact_id, AnalysisScope::FullHistory, api_key);

        ndjson_response(events)
    }

    /// Blocking selected-subset analysis
    async fn analyze_selected(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
        Json(request): Json<AnalyzeSelectedRequest>,
    ) -> AppResult<Json<AnalysisResponse>> {
        let outcome = resources
            .engine()
            .analyze(
                contact_id,
                AnalysisScope::Selected(request.message_ids),
                request.api_key.as_deref(),
            )
            .await?;

        Ok(Json(AnalysisResponse {
            analysis: outcome.record,
            message_count: Some(outcome.message_count),
        }))
    }

    /// Streaming selected-subset analysis
    async fn analyze_selected_stream(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
        Json(request): Json<AnalyzeSelectedRequest>,
    ) -> Response {
        let events = resources.engine().analyze_stream(
            contact_id,
            AnalysisScope::Selected(request.message_ids),
            request.api_key,
        );

        ndjson_response(events)
    }

    /// Fetch the stored analysis for a contact
    async fn get_analysis(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
    ) -> AppResult<Json<AnalysisResponse>> {
        let analysis = resources
            .database
            .analysis()
            .get(contact_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Analysis for contact {contact_id}")))?;

        Ok(Json(AnalysisResponse {
            analysis,
            message_count: None,
        }))
    }
}

/// Serialize a progress event stream as newline-terminated JSON objects
fn ndjson_response(events: impl Stream<Item = ProgressEvent> + Send + 'static) -> Response {
    let body = events.map(|event| {
        let line = serde_json::to_string(&event).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Failed to encode event: {e}"}}"#)
        });
        Ok::<_, Infallible>(format!("{line}\n"))
    });

    Response::builder()
        .header(CONTENT_TYPE, NDJSON)
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| {
            AppError::internal("Failed to build streaming response").into_response()
        })
}
