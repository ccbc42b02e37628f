// ABOUTME: Dashboard statistics route handlers
// ABOUTME: Aggregate numbers and the 30-day activity series for the home view
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Dashboard routes

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::database::DashboardStats;
use crate::errors::AppResult;
use crate::server::ServerResources;

/// Dashboard routes handler
pub struct DashboardRoutes;

impl DashboardRoutes {
    /// Create all dashboard routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/dashboard/stats", get(Self::stats))
            .with_state(resources)
    }

    /// Compute the dashboard statistics
    async fn stats(
        State(resources): State<Arc<ServerResources>>,
    ) -> AppResult<Json<DashboardStats>> {
        let stats = resources.database.stats().dashboard().await?;
        Ok(Json(stats))
    }
}
