// ABOUTME: Database operations for the per-contact analysis result
// ABOUTME: Implements the transactional query-then-update-or-insert upsert
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::errors::{AppError, AppResult};
use crate::llm::NormalizedAnalysis;

// ============================================================================
// Database Record Types
// ============================================================================

/// Database representation of an analysis result
///
/// The structured fields each hold a separately JSON-encoded sub-structure;
/// `raw_response` is the unmodified upstream payload kept for auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Unique analysis ID
    pub id: i64,
    /// Contact this analysis belongs to (unique)
    pub contact_id: i64,
    /// Personality tendencies (JSON object)
    pub core_traits: String,
    /// Interests and habits (JSON object)
    pub behavior_preferences: String,
    /// Interaction patterns (JSON object)
    pub social_interaction: String,
    /// Knowledge and values (JSON object)
    pub cognitive_thinking: String,
    /// One-line characterization (plain text)
    pub summary: String,
    /// Interest keywords (JSON array)
    pub interests: String,
    /// Relationship guidance (JSON object)
    pub dos_and_donts: String,
    /// Suggested topics (JSON array)
    pub topic_suggestions: String,
    /// Gift ideas (JSON array)
    pub gift_suggestions: String,
    /// Unparsed upstream payload
    pub raw_response: String,
    /// When the analysis was first created (RFC 3339)
    pub created_at: String,
    /// When the analysis was last refreshed (RFC 3339)
    pub updated_at: String,
}

/// The JSON-encoded column values for one normalized analysis
struct EncodedFields {
    core_traits: String,
    behavior_preferences: String,
    social_interaction: String,
    cognitive_thinking: String,
    interests: String,
    dos_and_donts: String,
    topic_suggestions: String,
    gift_suggestions: String,
}

impl EncodedFields {
    fn encode(normalized: &NormalizedAnalysis) -> AppResult<Self> {
        let doc = &normalized.document;
        let encode = |value: &serde_json::Value| {
            serde_json::to_string(value)
                .map_err(|e| AppError::serialization(format!("Failed to encode field: {e}")))
        };

        Ok(Self {
            core_traits: encode(&doc.core_traits)?,
            behavior_preferences: encode(&doc.behavior_preferences)?,
            social_interaction: encode(&doc.social_interaction)?,
            cognitive_thinking: encode(&doc.cognitive_thinking)?,
            interests: encode(&doc.interests)?,
            dos_and_donts: encode(&doc.dos_and_donts)?,
            topic_suggestions: encode(&doc.topic_suggestions)?,
            gift_suggestions: encode(&doc.gift_suggestions)?,
        })
    }
}

// ============================================================================
// Analysis Manager
// ============================================================================

/// Analysis result database operations manager
pub struct AnalysisManager {
    pool: SqlitePool,
}

impl AnalysisManager {
    /// Create a new analysis manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the analysis result for a contact
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get(&self, contact_id: i64) -> AppResult<Option<AnalysisRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, contact_id, core_traits, behavior_preferences, social_interaction,
                   cognitive_thinking, summary, interests, dos_and_donts,
                   topic_suggestions, gift_suggestions, raw_response, created_at, updated_at
            FROM analysis_results
            WHERE contact_id = $1
            ",
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get analysis: {e}")))?;

        Ok(row.map(|r| Self::record_from_row(&r)))
    }

    /// Write a normalized analysis for a contact
    ///
    /// Query-then-update-or-insert: an existing row is overwritten in place
    /// (update semantics, no versioning), otherwise a new row is created.
    /// The parent contact's `updated_at` is refreshed in the same
    /// transaction so both rows become visible together.
    ///
    /// # Errors
    ///
    /// Returns an error if field encoding or a database operation fails
    pub async fn upsert(
        &self,
        contact_id: i64,
        normalized: &NormalizedAnalysis,
    ) -> AppResult<AnalysisRecord> {
        let fields = EncodedFields::encode(normalized)?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let existing_id: Option<i64> =
            sqlx::query(r"SELECT id FROM analysis_results WHERE contact_id = $1")
                .bind(contact_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to query analysis: {e}")))?
                .map(|r| r.get("id"));

        if let Some(id) = existing_id {
            sqlx::query(
                r"
                UPDATE analysis_results
                SET core_traits = $1, behavior_preferences = $2, social_interaction = $3,
                    cognitive_thinking = $4, summary = $5, interests = $6, dos_and_donts = $7,
                    topic_suggestions = $8, gift_suggestions = $9, raw_response = $10,
                    updated_at = $11
                WHERE id = $12
                ",
            )
            .bind(&fields.core_traits)
            .bind(&fields.behavior_preferences)
            .bind(&fields.social_interaction)
            .bind(&fields.cognitive_thinking)
            .bind(&normalized.document.summary)
            .bind(&fields.interests)
            .bind(&fields.dos_and_donts)
            .bind(&fields.topic_suggestions)
            .bind(&fields.gift_suggestions)
            .bind(&normalized.raw_response)
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to update analysis: {e}")))?;
        } else {
            sqlx::query(
                r"
                INSERT INTO analysis_results
                    (contact_id, core_traits, behavior_preferences, social_interaction,
                     cognitive_thinking, summary, interests, dos_and_donts,
                     topic_suggestions, gift_suggestions, raw_response, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
                ",
            )
            .bind(contact_id)
            .bind(&fields.core_traits)
            .bind(&fields.behavior_preferences)
            .bind(&fields.social_interaction)
            .bind(&fields.cognitive_thinking)
            .bind(&normalized.document.summary)
            .bind(&fields.interests)
            .bind(&fields.dos_and_donts)
            .bind(&fields.topic_suggestions)
            .bind(&fields.gift_suggestions)
            .bind(&normalized.raw_response)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert analysis: {e}")))?;
        }

        sqlx::query(r"UPDATE contacts SET updated_at = $1 WHERE id = $2")
            .bind(&now)
            .bind(contact_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to touch contact: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit analysis: {e}")))?;

        self.get(contact_id)
            .await?
            .ok_or_else(|| AppError::internal("Analysis row missing after upsert"))
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> AnalysisRecord {
        AnalysisRecord {
            id: row.get("id"),
            contact_id: row.get("contact_id"),
            core_traits: row.get("core_traits"),
            behavior_preferences: row.get("behavior_preferences"),
            social_interaction: row.get("social_interaction"),
            cognitive_thinking: row.get("cognitive_thinking"),
            summary: row.get("summary"),
            interests: row.get("interests"),
            dos_and_donts: row.get("dos_and_donts"),
            topic_suggestions: row.get("topic_suggestions"),
            gift_suggestions: row.get("gift_suggestions"),
            raw_response: row.get("raw_response"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
