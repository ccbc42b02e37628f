// ABOUTME: Analysis pipeline orchestration for contact personality profiling
// ABOUTME: Defines the invocation scope and the progress event protocol
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Analysis Pipeline
//!
//! One analysis cycle runs `FETCH_TRANSCRIPT → CALL_MODEL → NORMALIZE →
//! UPSERT_RESULT`, in blocking or streaming flavor. The streaming flavor
//! relays every upstream content delta to the caller as a
//! [`ProgressEvent::ContentUpdate`] the moment it is decoded; the cycle ends
//! with a single terminal [`ProgressEvent::Complete`] or
//! [`ProgressEvent::Error`].

pub mod engine;
pub mod transcript;

pub use engine::{AnalysisEngine, AnalysisOutcome};
pub use transcript::{render_transcript, MIN_TRANSCRIPT_CHARS};

use serde::{Deserialize, Serialize};

use crate::database::AnalysisRecord;

/// Which chat lines one analysis invocation covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisScope {
    /// The contact's whole chat history
    FullHistory,
    /// A caller-selected subset of line ids
    Selected(Vec<i64>),
}

/// One event in a streaming analysis response
///
/// Serialized as newline-terminated JSON objects with a `type` discriminator.
/// `Error` and `Complete` are terminal: nothing follows them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A content delta was decoded from the upstream stream
    ContentUpdate {
        /// Cumulative generated length in characters
        content_length: usize,
        /// Latest known total token count
        total_tokens: u32,
        /// Latest known completion token count
        completion_tokens: u32,
    },
    /// Token totals changed without new content (the upstream reports final
    /// usage in a trailing frame)
    TokenUpdate {
        /// Latest known total token count
        total_tokens: u32,
        /// Latest known completion token count
        completion_tokens: u32,
    },
    /// The cycle failed; terminal
    Error {
        /// Human-readable failure description
        message: String,
    },
    /// The cycle finished and the result was persisted; terminal
    Complete {
        /// The persisted analysis record
        analysis: AnalysisRecord,
        /// Number of chat lines analyzed
        message_count: usize,
        /// Final total token count
        total_tokens: u32,
        /// Final completion token count
        completion_tokens: u32,
    },
}
