// ABOUTME: Route module organization for the Rapport HTTP API
// ABOUTME: Provides route definitions organized by domain
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Route modules
//!
//! Each domain module contains route definitions and thin handler functions
//! that delegate to the manager/engine layers.

/// Analysis pipeline routes (blocking and streaming)
pub mod analysis;
/// Contact CRUD and chat line routes
pub mod contacts;
/// Dashboard statistics routes
pub mod dashboard;
/// Export download routes
pub mod export;
/// Health check routes
pub mod health;

pub use analysis::AnalysisRoutes;
pub use contacts::ContactRoutes;
pub use dashboard::DashboardRoutes;
pub use export::ExportRoutes;
pub use health::HealthRoutes;
