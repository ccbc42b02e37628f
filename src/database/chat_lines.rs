// ABOUTME: Database operations for chat line records
// ABOUTME: Handles bulk append and the ordered reads consumed by the analysis pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::errors::{AppError, AppResult};

// ============================================================================
// Database Record Types
// ============================================================================

/// Database representation of one chat line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLineRecord {
    /// Unique line ID
    pub id: i64,
    /// Contact this line belongs to
    pub contact_id: i64,
    /// Speaker label; `我` marks the local user, anything else the contact
    pub speaker: String,
    /// Message text
    pub content: String,
    /// Calendar date the message was exchanged (`YYYY-MM-DD`)
    pub chat_date: String,
    /// When the line was recorded (RFC 3339)
    pub created_at: String,
}

impl ChatLineRecord {
    /// Whether this line was spoken by the local user
    #[must_use]
    pub fn is_self(&self) -> bool {
        self.speaker == "我"
    }
}

/// Input for one line in a bulk append
#[derive(Debug, Clone, Deserialize)]
pub struct NewChatLine {
    /// Speaker label
    pub speaker: String,
    /// Message text
    pub content: String,
}

// ============================================================================
// Chat Line Manager
// ============================================================================

/// Chat line database operations manager
pub struct ChatLineManager {
    pool: SqlitePool,
}

impl ChatLineManager {
    /// Create a new chat line manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append lines for a contact in one transaction, bumping the contact's
    /// `updated_at`
    ///
    /// Returns the number of lines written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn append_lines(
        &self,
        contact_id: i64,
        chat_date: &str,
        lines: &[NewChatLine],
    ) -> AppResult<usize> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        for line in lines {
            sqlx::query(
                r"
                INSERT INTO chat_lines (contact_id, speaker, content, chat_date, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(contact_id)
            .bind(&line.speaker)
            .bind(&line.content)
            .bind(chat_date)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to insert chat line: {e}")))?;
        }

        sqlx::query(r"UPDATE contacts SET updated_at = $1 WHERE id = $2")
            .bind(&now)
            .bind(contact_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to touch contact: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit chat lines: {e}")))?;

        Ok(lines.len())
    }

    /// List all lines for a contact in chronological order
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_for_contact(&self, contact_id: i64) -> AppResult<Vec<ChatLineRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, contact_id, speaker, content, chat_date, created_at
            FROM chat_lines
            WHERE contact_id = $1
            ORDER BY chat_date, created_at, id
            ",
        )
        .bind(contact_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list chat lines: {e}")))?;

        Ok(rows.iter().map(Self::record_from_row).collect())
    }

    /// List a caller-selected subset of lines, still in chronological order
    ///
    /// Unknown ids are silently dropped; ids belonging to other contacts are
    /// excluded by the `contact_id` filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_selected(
        &self,
        contact_id: i64,
        line_ids: &[i64],
    ) -> AppResult<Vec<ChatLineRecord>> {
        if line_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; line_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, contact_id, speaker, content, chat_date, created_at
             FROM chat_lines
             WHERE contact_id = ? AND id IN ({placeholders})
             ORDER BY chat_date, created_at, id"
        );

        let mut query = sqlx::query(&sql).bind(contact_id);
        for id in line_ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list selected chat lines: {e}")))?;

        Ok(rows.iter().map(Self::record_from_row).collect())
    }

    /// List lines within an optional date window, for export
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_between(
        &self,
        contact_id: i64,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> AppResult<Vec<ChatLineRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, contact_id, speaker, content, chat_date, created_at
            FROM chat_lines
            WHERE contact_id = $1
              AND ($2 IS NULL OR chat_date >= $2)
              AND ($3 IS NULL OR chat_date <= $3)
            ORDER BY chat_date, created_at, id
            ",
        )
        .bind(contact_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list chat lines: {e}")))?;

        Ok(rows.iter().map(Self::record_from_row).collect())
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> ChatLineRecord {
        ChatLineRecord {
            id: row.get("id"),
            contact_id: row.get("contact_id"),
            speaker: row.get("speaker"),
            content: row.get("content"),
            chat_date: row.get("chat_date"),
            created_at: row.get("created_at"),
        }
    }
}
