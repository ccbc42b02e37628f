// ABOUTME: Server resource wiring and router assembly
// ABOUTME: Builds the axum application from database, provider, and export collaborators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Server composition
//!
//! [`ServerResources`] bundles the shared collaborators handlers need; the
//! provider is held as a trait object so tests can substitute a scripted
//! stub for the real upstream client.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analysis::AnalysisEngine;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::export::ExportManager;
use crate::llm::AnalysisProvider;
use crate::routes::{
    AnalysisRoutes, ContactRoutes, DashboardRoutes, ExportRoutes, HealthRoutes,
};

/// Shared resources handed to every route handler
pub struct ServerResources {
    /// Database handle
    pub database: Database,
    /// Upstream analysis model provider
    pub provider: Arc<dyn AnalysisProvider>,
    /// Export file generator
    pub export: ExportManager,
    /// Server configuration
    pub config: ServerConfig,
}

impl ServerResources {
    /// Bundle the server's collaborators
    #[must_use]
    pub fn new(
        database: Database,
        provider: Arc<dyn AnalysisProvider>,
        config: ServerConfig,
    ) -> Self {
        let export = ExportManager::new(config.export_dir.clone());
        Self {
            database,
            provider,
            export,
            config,
        }
    }

    /// Build an analysis engine over these resources
    #[must_use]
    pub fn engine(&self) -> AnalysisEngine {
        AnalysisEngine::new(self.database.clone(), Arc::clone(&self.provider))
    }
}

/// Assemble the full application router
#[must_use]
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes())
        .merge(ContactRoutes::routes(Arc::clone(&resources)))
        .merge(AnalysisRoutes::routes(Arc::clone(&resources)))
        .merge(ExportRoutes::routes(Arc::clone(&resources)))
        .merge(DashboardRoutes::routes(resources))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
