// ABOUTME: Export download route handlers for chat logs and analysis reports
// ABOUTME: Streams generated files back with attachment content disposition
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Export routes

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::database::ContactRecord;
use crate::errors::{AppError, AppResult};
use crate::export::{AnalysisFormat, AnalysisSections, ChatLogFormat, ExportFile};
use crate::server::ServerResources;

// ============================================================================
// Query Types
// ============================================================================

/// Query parameters for chat log export
#[derive(Debug, Default, Deserialize)]
pub struct ChatLogExportQuery {
    /// Comma-separated format list (`xlsx`, `csv`); defaults to `xlsx`
    #[serde(default)]
    pub formats: Option<String>,
    /// Add an empty analysis-notes column to the spreadsheet
    #[serde(default)]
    pub include_analysis: Option<String>,
    /// Inclusive start date filter (`YYYY-MM-DD`)
    #[serde(default)]
    pub start_date: Option<String>,
    /// Inclusive end date filter (`YYYY-MM-DD`)
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Query parameters for analysis report export
#[derive(Debug, Default, Deserialize)]
pub struct AnalysisExportQuery {
    /// Comma-separated format list (`xlsx`, `json`, `text`); defaults to `xlsx`
    #[serde(default)]
    pub formats: Option<String>,
    /// Include the personality dimension sheet/section (default true)
    #[serde(default)]
    pub include_personality: Option<String>,
    /// Include the interest keyword sheet/section (default true)
    #[serde(default)]
    pub include_interests: Option<String>,
    /// Include the dos-and-donts sheet/section (default true)
    #[serde(default)]
    pub include_guide: Option<String>,
}

fn flag(value: Option<&str>, default: bool) -> bool {
    value.map_or(default, |v| v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Export Routes
// ============================================================================

/// Export routes handler
pub struct ExportRoutes;

impl ExportRoutes {
    /// Create all export routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/contacts/:contact_id/export/chat-lines",
                get(Self::export_chat_lines),
            )
            .route(
                "/api/contacts/:contact_id/export/analysis",
                get(Self::export_analysis),
            )
            .with_state(resources)
    }

    async fn get_contact(
        resources: &ServerResources,
        contact_id: i64,
    ) -> AppResult<ContactRecord> {
        resources
            .database
            .contacts()
            .get(contact_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Contact {contact_id}")))
    }

    /// Download a contact's chat log
    async fn export_chat_lines(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
        Query(query): Query<ChatLogExportQuery>,
    ) -> AppResult<Response> {
        let contact = Self::get_contact(&resources, contact_id).await?;

        let lines = resources
            .database
            .chat_lines()
            .list_between(
                contact_id,
                query.start_date.as_deref(),
                query.end_date.as_deref(),
            )
            .await?;

        if lines.is_empty() {
            return Err(AppError::invalid_input("No chat lines to export"));
        }

        let mut formats: Vec<ChatLogFormat> = query
            .formats
            .as_deref()
            .unwrap_or("xlsx")
            .split(',')
            .filter_map(ChatLogFormat::parse)
            .collect();
        formats.dedup();
        if formats.is_empty() {
            formats.push(ChatLogFormat::Xlsx);
        }

        let include_analysis = flag(query.include_analysis.as_deref(), false);

        let file =
            resources
                .export
                .export_chat_lines(&lines, &contact.name, &formats, include_analysis)?;

        file_response(file).await
    }

    /// Download a contact's analysis report
    async fn export_analysis(
        State(resources): State<Arc<ServerResources>>,
        Path(contact_id): Path<i64>,
        Query(query): Query<AnalysisExportQuery>,
    ) -> AppResult<Response> {
        let contact = Self::get_contact(&resources, contact_id).await?;

        let analysis = resources
            .database
            .analysis()
            .get(contact_id)
            .await?
            .ok_or_else(|| AppError::invalid_input("No analysis result to export"))?;

        let mut formats: Vec<AnalysisFormat> = query
            .formats
            .as_deref()
            .unwrap_or("xlsx")
            .split(',')
            .filter_map(AnalysisFormat::parse)
            .collect();
        formats.dedup();
        if formats.is_empty() {
            formats.push(AnalysisFormat::Xlsx);
        }

        let sections = AnalysisSections {
            personality: flag(query.include_personality.as_deref(), true),
            interests: flag(query.include_interests.as_deref(), true),
            guide: flag(query.include_guide.as_deref(), true),
        };

        let file = resources
            .export
            .export_analysis(&analysis, &contact.name, &formats, sections)?;

        file_response(file).await
    }
}

/// Serve a generated file as an attachment download
async fn file_response(file: ExportFile) -> AppResult<Response> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|e| AppError::internal(format!("Failed to read export file: {e}")))?;

    // RFC 5987 encoding keeps non-ASCII filenames valid in the header
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&file.filename)
    );

    Response::builder()
        .header(CONTENT_TYPE, file.content_type)
        .header(CONTENT_DISPOSITION, disposition)
        .body(Body::from(bytes))
        .map_err(|e| AppError::internal(format!("Failed to build download response: {e}")))
}
