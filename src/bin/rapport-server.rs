// ABOUTME: Server binary for the Rapport relationship-management API
// ABOUTME: Loads configuration, initializes storage, and serves the HTTP router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Rapport Server Binary
//!
//! Starts the HTTP API with environment-driven configuration:
//! `HTTP_PORT`, `DATABASE_URL`, `EXPORT_DIR`, `ARK_API_KEY`, `ARK_ENDPOINT`,
//! `ARK_MODEL`.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use rapport_server::{
    config::ServerConfig,
    database::Database,
    llm::ArkProvider,
    logging,
    server::{build_router, ServerResources},
};

#[derive(Parser)]
#[command(name = "rapport-server")]
#[command(about = "Rapport - personal relationship management API")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Rapport server");
    info!("{}", config.summary());

    let database = Database::new(&config.database_url).await?;
    info!("Database initialized: {}", config.database_url);

    let provider = Arc::new(ArkProvider::new(config.ark.clone())?);
    let resources = Arc::new(ServerResources::new(database, provider, config.clone()));

    let router = build_router(resources);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolve when the process receives a termination signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
