// ABOUTME: Speaker-tagged transcript rendering for the analysis prompt
// ABOUTME: The bracketed date/speaker format is the contract the system prompt expects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Transcript serialization
//!
//! Each chat line renders as `[date]【我】content` for the local user and
//! `[date]【对方】content` for the contact, joined with `\n` in chronological
//! order. The system prompt describes exactly this format to the model;
//! changing it silently degrades analysis quality.

use crate::database::ChatLineRecord;

/// Minimum usable transcript length (characters) for selected-subset analysis
///
/// Below this the model cannot produce a meaningful profile.
pub const MIN_TRANSCRIPT_CHARS: usize = 50;

/// Render chat lines into the transcript sent to the model
///
/// Lines must already be in chronological order; this function preserves
/// input order exactly.
#[must_use]
pub fn render_transcript(lines: &[ChatLineRecord]) -> String {
    lines
        .iter()
        .map(|line| {
            if line.is_self() {
                format!("[{}]【我】{}", line.chat_date, line.content)
            } else {
                format!("[{}]【对方】{}", line.chat_date, line.content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
