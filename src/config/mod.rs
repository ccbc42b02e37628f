// ABOUTME: Configuration module organization for the Rapport server
// ABOUTME: Exposes environment-driven configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Configuration management

/// Environment-based server configuration
pub mod environment;

pub use environment::{ArkConfig, ServerConfig};
