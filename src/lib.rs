// ABOUTME: Main library entry point for the Rapport relationship-management API
// ABOUTME: Provides contact storage, AI personality analysis, and report export
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

#![deny(unsafe_code)]

//! # Rapport Server
//!
//! A personal relationship-management HTTP API: stores contacts and their
//! transcribed chat history, runs an LLM-backed personality analysis over a
//! contact's transcript (blocking or streaming), persists one analysis
//! record per contact, and exports chat logs and analysis reports to
//! spreadsheet/CSV/JSON/text files.
//!
//! ## Architecture
//!
//! - **llm**: upstream chat-completion client (blocking + SSE streaming)
//!   and the tolerant response normalizer
//! - **analysis**: the analyze-and-persist pipeline orchestrator
//! - **database**: SQLite storage managers for contacts, chat lines, and
//!   analysis results
//! - **export**: file-based report generation
//! - **routes**: axum HTTP handlers over the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rapport_server::config::ServerConfig;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ServerConfig::from_env()?;
//! println!("Rapport configured: {}", config.summary());
//! # Ok(())
//! # }
//! ```

/// Analysis pipeline orchestration
pub mod analysis;

/// Configuration management
pub mod config;

/// Contact, chat line, and analysis storage
pub mod database;

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Report file generation
pub mod export;

/// Upstream model client and response normalization
pub mod llm;

/// Logging configuration and initialization
pub mod logging;

/// HTTP route handlers
pub mod routes;

/// Server resource wiring and router assembly
pub mod server;
