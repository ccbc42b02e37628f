// ABOUTME: Database management for contacts, chat lines, and analysis results
// ABOUTME: Owns the SQLite pool and the idempotent startup migrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Database Management
//!
//! SQLite storage for the single-user deployment. Tables are created on
//! startup with idempotent DDL; there is no separate migration tool.
//! Domain-specific query logic lives in manager structs
//! ([`ContactManager`], [`ChatLineManager`], [`AnalysisManager`],
//! [`StatsManager`]), each holding a clone of the pool.

mod analysis;
mod chat_lines;
mod contacts;
mod stats;

pub use analysis::{AnalysisManager, AnalysisRecord};
pub use chat_lines::{ChatLineManager, ChatLineRecord, NewChatLine};
pub use contacts::{ContactManager, ContactRecord, ContactSummary, ContactUpdate};
pub use stats::{ActivityDay, DashboardStats, Insights, StatsManager};

use anyhow::Result;
use sqlx::{Pool, Sqlite, SqlitePool};

/// Database handle wrapping the shared SQLite pool
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema cannot be created.
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:") && !in_memory {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        // An in-memory SQLite database exists per connection; a wider pool
        // would hand out empty databases
        let pool = if in_memory {
            sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .connect(&connection_options)
                .await?
        } else {
            SqlitePool::connect(&connection_options).await?
        };

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                avatar TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chat_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contact_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
                speaker TEXT NOT NULL,
                content TEXT NOT NULL,
                chat_date TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_chat_lines_contact_date
            ON chat_lines(contact_id, chat_date)
            ",
        )
        .execute(&self.pool)
        .await?;

        // One analysis per contact, enforced by the UNIQUE constraint
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS analysis_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contact_id INTEGER NOT NULL UNIQUE REFERENCES contacts(id) ON DELETE CASCADE,
                core_traits TEXT NOT NULL DEFAULT '{}',
                behavior_preferences TEXT NOT NULL DEFAULT '{}',
                social_interaction TEXT NOT NULL DEFAULT '{}',
                cognitive_thinking TEXT NOT NULL DEFAULT '{}',
                summary TEXT NOT NULL DEFAULT '',
                interests TEXT NOT NULL DEFAULT '[]',
                dos_and_donts TEXT NOT NULL DEFAULT '{}',
                topic_suggestions TEXT NOT NULL DEFAULT '[]',
                gift_suggestions TEXT NOT NULL DEFAULT '[]',
                raw_response TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Contact operations manager
    #[must_use]
    pub fn contacts(&self) -> ContactManager {
        ContactManager::new(self.pool.clone())
    }

    /// Chat line operations manager
    #[must_use]
    pub fn chat_lines(&self) -> ChatLineManager {
        ChatLineManager::new(self.pool.clone())
    }

    /// Analysis result operations manager
    #[must_use]
    pub fn analysis(&self) -> AnalysisManager {
        AnalysisManager::new(self.pool.clone())
    }

    /// Dashboard statistics manager
    #[must_use]
    pub fn stats(&self) -> StatsManager {
        StatsManager::new(self.pool.clone())
    }
}
