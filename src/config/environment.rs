// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! Environment-based configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default HTTP port for the API server
const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default SQLite database URL
const DEFAULT_DATABASE_URL: &str = "sqlite:data/rapport.db";

/// Default directory for generated export files
const DEFAULT_EXPORT_DIR: &str = "exports";

/// Default chat-completion endpoint (Volcano Ark, OpenAI-compatible)
const DEFAULT_ARK_ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// Default model identifier for personality analysis
const DEFAULT_ARK_MODEL: &str = "doubao-seed-1-6-251015";

/// Upstream model client configuration
///
/// Injected into the client at construction time; client logic never reads
/// ambient process state. The API key is optional here because callers may
/// supply a per-request override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArkConfig {
    /// Process-wide API key fallback (`ARK_API_KEY`)
    pub api_key: Option<String>,
    /// Base endpoint URL, without the `/chat/completions` suffix
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
}

impl ArkConfig {
    /// Load upstream model configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("ARK_API_KEY").ok().filter(|k| !k.is_empty()),
            endpoint: env::var("ARK_ENDPOINT").unwrap_or_else(|_| DEFAULT_ARK_ENDPOINT.to_owned()),
            model: env::var("ARK_MODEL").unwrap_or_else(|_| DEFAULT_ARK_MODEL.to_owned()),
        }
    }
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port the API listens on
    pub http_port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Directory export files are written to
    pub export_dir: PathBuf,
    /// Upstream model configuration
    pub ark: ArkConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `HTTP_PORT` is set but not a valid port number.
    pub fn from_env() -> Result<Self> {
        let http_port = match env::var("HTTP_PORT") {
            Ok(port) => port
                .parse::<u16>()
                .with_context(|| format!("Invalid HTTP_PORT value: {port}"))?,
            Err(_) => DEFAULT_HTTP_PORT,
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());

        let export_dir =
            PathBuf::from(env::var("EXPORT_DIR").unwrap_or_else(|_| DEFAULT_EXPORT_DIR.to_owned()));

        Ok(Self {
            http_port,
            database_url,
            export_dir,
            ark: ArkConfig::from_env(),
        })
    }

    /// One-line configuration summary for startup logging
    ///
    /// Never includes the API key.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} database={} export_dir={} model={} api_key={}",
            self.http_port,
            self.database_url,
            self.export_dir.display(),
            self.ark.model,
            if self.ark.api_key.is_some() {
                "configured"
            } else {
                "not configured"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_redacts_api_key() {
        let config = ServerConfig {
            http_port: 8080,
            database_url: "sqlite::memory:".to_owned(),
            export_dir: PathBuf::from("exports"),
            ark: ArkConfig {
                api_key: Some("secret-key".to_owned()),
                endpoint: DEFAULT_ARK_ENDPOINT.to_owned(),
                model: DEFAULT_ARK_MODEL.to_owned(),
            },
        };

        let summary = config.summary();
        assert!(!summary.contains("secret-key"));
        assert!(summary.contains("configured"));
    }
}
