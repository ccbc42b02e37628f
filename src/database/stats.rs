// ABOUTME: Dashboard statistics queries over contacts, chat lines, and analyses
// ABOUTME: Produces the aggregate numbers and activity series for the home view
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::errors::{AppError, AppResult};

/// Window for the "active relationships" and activity series queries
const ACTIVITY_WINDOW_DAYS: i64 = 30;

// ============================================================================
// Result Types
// ============================================================================

/// Chat line count for one calendar day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDay {
    /// Date (`YYYY-MM-DD`)
    pub date: String,
    /// Lines recorded on that date
    pub count: i64,
}

/// Aggregate insights shown when contacts exist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insights {
    /// Average chat lines per contact, one decimal
    pub avg_messages_per_contact: String,
    /// Name of the contact with the most chat lines
    pub most_active_contact: String,
    /// Percentage of contacts with an analysis
    pub analysis_coverage: i64,
}

/// Dashboard statistics payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Total contacts
    pub total_contacts: i64,
    /// Total chat lines
    pub total_messages: i64,
    /// Total analysis results
    pub total_analyses: i64,
    /// Contacts created since the start of the current month
    pub new_this_month: i64,
    /// Contacts updated within the activity window
    pub active_relationships: i64,
    /// Percentage of contacts with an analysis
    pub analysis_rate: i64,
    /// Chat line counts per day over the activity window
    pub activity: Vec<ActivityDay>,
    /// Aggregate insights; absent when there are no contacts
    pub insights: Option<Insights>,
}

// ============================================================================
// Stats Manager
// ============================================================================

/// Dashboard statistics manager
pub struct StatsManager {
    pool: SqlitePool,
}

impl StatsManager {
    /// Create a new stats manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Compute the dashboard statistics
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails
    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let now = Utc::now();

        let total_contacts = self.count(r"SELECT COUNT(*) AS n FROM contacts").await?;
        let total_messages = self.count(r"SELECT COUNT(*) AS n FROM chat_lines").await?;
        let total_analyses = self
            .count(r"SELECT COUNT(*) AS n FROM analysis_results")
            .await?;

        let month_start = format!("{}", now.format("%Y-%m-01T00:00:00"));
        let new_this_month = self
            .count_bound(
                r"SELECT COUNT(*) AS n FROM contacts WHERE created_at >= $1",
                &month_start,
            )
            .await?;

        let window_start = (now - Duration::days(ACTIVITY_WINDOW_DAYS)).to_rfc3339();
        let active_relationships = self
            .count_bound(
                r"SELECT COUNT(*) AS n FROM contacts WHERE updated_at >= $1",
                &window_start,
            )
            .await?;

        let analysis_rate = if total_contacts > 0 {
            total_analyses * 100 / total_contacts
        } else {
            0
        };

        let activity = self.activity_series(ACTIVITY_WINDOW_DAYS).await?;

        let insights = if total_contacts > 0 {
            #[allow(clippy::cast_precision_loss)]
            let avg = total_messages as f64 / total_contacts as f64;
            Some(Insights {
                avg_messages_per_contact: format!("{avg:.1}"),
                most_active_contact: self
                    .most_active_contact()
                    .await?
                    .unwrap_or_else(|| "-".to_owned()),
                analysis_coverage: analysis_rate,
            })
        } else {
            None
        };

        Ok(DashboardStats {
            total_contacts,
            total_messages,
            total_analyses,
            new_this_month,
            active_relationships,
            analysis_rate,
            activity,
            insights,
        })
    }

    /// Chat line counts for each of the last `days` calendar days, oldest
    /// first, zero-filled
    async fn activity_series(&self, days: i64) -> AppResult<Vec<ActivityDay>> {
        let today = Utc::now().date_naive();
        let window_start = (today - Duration::days(days - 1)).format("%Y-%m-%d").to_string();

        let rows = sqlx::query(
            r"
            SELECT chat_date, COUNT(*) AS n
            FROM chat_lines
            WHERE chat_date >= $1
            GROUP BY chat_date
            ",
        )
        .bind(&window_start)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query activity: {e}")))?;

        let counts: HashMap<String, i64> = rows
            .into_iter()
            .map(|r| (r.get("chat_date"), r.get("n")))
            .collect();

        let series = (0..days)
            .map(|offset| {
                let date = (today - Duration::days(days - 1 - offset))
                    .format("%Y-%m-%d")
                    .to_string();
                let count = counts.get(&date).copied().unwrap_or(0);
                ActivityDay { date, count }
            })
            .collect();

        Ok(series)
    }

    /// Name of the contact with the most chat lines, if any lines exist
    async fn most_active_contact(&self) -> AppResult<Option<String>> {
        let row = sqlx::query(
            r"
            SELECT c.name, COUNT(l.id) AS n
            FROM contacts c
            JOIN chat_lines l ON l.contact_id = c.id
            GROUP BY c.id
            ORDER BY n DESC
            LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query most active contact: {e}")))?;

        Ok(row.map(|r| r.get("name")))
    }

    async fn count(&self, sql: &str) -> AppResult<i64> {
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count: {e}")))?;
        Ok(row.get("n"))
    }

    async fn count_bound(&self, sql: &str, bound: &str) -> AppResult<i64> {
        let row = sqlx::query(sql)
            .bind(bound)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count: {e}")))?;
        Ok(row.get("n"))
    }
}
