// ABOUTME: Database operations for contact records
// ABOUTME: Handles contact CRUD with derived chat statistics for listings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::errors::{AppError, AppResult};

/// Default avatar used when a contact is created without one
pub const DEFAULT_AVATAR: &str =
    "https://ui-avatars.com/api/?name=?&background=random&color=fff&size=128";

// ============================================================================
// Database Record Types
// ============================================================================

/// Database representation of a contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Unique contact ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub avatar: String,
    /// Free-text notes
    pub notes: String,
    /// Comma-separated tags
    pub tags: String,
    /// When the contact was created (RFC 3339)
    pub created_at: String,
    /// When the contact was last updated (RFC 3339)
    pub updated_at: String,
}

/// Contact with derived chat statistics, for listings and API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSummary {
    /// The contact record fields
    #[serde(flatten)]
    pub contact: ContactRecord,
    /// Total chat lines stored for this contact
    pub chat_count: i64,
    /// Number of distinct chat dates
    pub active_days: i64,
    /// Whether an analysis result exists
    pub has_analysis: bool,
}

/// Partial update for a contact; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
    /// New display name
    pub name: Option<String>,
    /// New avatar URL
    pub avatar: Option<String>,
    /// New notes
    pub notes: Option<String>,
    /// New tags
    pub tags: Option<String>,
}

// ============================================================================
// Contact Manager
// ============================================================================

/// Contact database operations manager
pub struct ContactManager {
    pool: SqlitePool,
}

impl ContactManager {
    /// Create a new contact manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new contact
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create(
        &self,
        name: &str,
        avatar: Option<&str>,
        notes: &str,
        tags: &str,
    ) -> AppResult<ContactRecord> {
        let now = chrono::Utc::now().to_rfc3339();
        let avatar = match avatar {
            Some(a) if !a.is_empty() => a,
            _ => DEFAULT_AVATAR,
        };

        let result = sqlx::query(
            r"
            INSERT INTO contacts (name, avatar, notes, tags, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ",
        )
        .bind(name)
        .bind(avatar)
        .bind(notes)
        .bind(tags)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create contact: {e}")))?;

        Ok(ContactRecord {
            id: result.last_insert_rowid(),
            name: name.to_owned(),
            avatar: avatar.to_owned(),
            notes: notes.to_owned(),
            tags: tags.to_owned(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a contact by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get(&self, contact_id: i64) -> AppResult<Option<ContactRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, name, avatar, notes, tags, created_at, updated_at
            FROM contacts
            WHERE id = $1
            ",
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get contact: {e}")))?;

        Ok(row.map(|r| Self::record_from_row(&r)))
    }

    /// Get a contact with derived statistics
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn summary(&self, contact_id: i64) -> AppResult<Option<ContactSummary>> {
        let row = sqlx::query(
            r"
            SELECT c.id, c.name, c.avatar, c.notes, c.tags, c.created_at, c.updated_at,
                   COUNT(l.id) AS chat_count,
                   COUNT(DISTINCT l.chat_date) AS active_days,
                   EXISTS(SELECT 1 FROM analysis_results a WHERE a.contact_id = c.id) AS has_analysis
            FROM contacts c
            LEFT JOIN chat_lines l ON l.contact_id = c.id
            WHERE c.id = $1
            GROUP BY c.id
            ",
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get contact summary: {e}")))?;

        Ok(row.map(|r| Self::summary_from_row(&r)))
    }

    /// List all contacts with statistics, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list(&self) -> AppResult<Vec<ContactSummary>> {
        let rows = sqlx::query(
            r"
            SELECT c.id, c.name, c.avatar, c.notes, c.tags, c.created_at, c.updated_at,
                   COUNT(l.id) AS chat_count,
                   COUNT(DISTINCT l.chat_date) AS active_days,
                   EXISTS(SELECT 1 FROM analysis_results a WHERE a.contact_id = c.id) AS has_analysis
            FROM contacts c
            LEFT JOIN chat_lines l ON l.contact_id = c.id
            GROUP BY c.id
            ORDER BY c.updated_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list contacts: {e}")))?;

        Ok(rows.iter().map(Self::summary_from_row).collect())
    }

    /// Apply a partial update to a contact, bumping `updated_at`
    ///
    /// Returns the updated record, or `None` when the contact does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update(
        &self,
        contact_id: i64,
        update: &ContactUpdate,
    ) -> AppResult<Option<ContactRecord>> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            UPDATE contacts
            SET name = COALESCE($1, name),
                avatar = COALESCE($2, avatar),
                notes = COALESCE($3, notes),
                tags = COALESCE($4, tags),
                updated_at = $5
            WHERE id = $6
            ",
        )
        .bind(update.name.as_deref())
        .bind(update.avatar.as_deref())
        .bind(update.notes.as_deref())
        .bind(update.tags.as_deref())
        .bind(&now)
        .bind(contact_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update contact: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(contact_id).await
    }

    /// Delete a contact; chat lines and analysis cascade
    ///
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete(&self, contact_id: i64) -> AppResult<bool> {
        let result = sqlx::query(r"DELETE FROM contacts WHERE id = $1")
            .bind(contact_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete contact: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> ContactRecord {
        ContactRecord {
            id: row.get("id"),
            name: row.get("name"),
            avatar: row.get("avatar"),
            notes: row.get("notes"),
            tags: row.get("tags"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn summary_from_row(row: &sqlx::sqlite::SqliteRow) -> ContactSummary {
        ContactSummary {
            contact: Self::record_from_row(row),
            chat_count: row.get("chat_count"),
            active_days: row.get("active_days"),
            has_analysis: row.get::<i64, _>("has_analysis") != 0,
        }
    }
}
