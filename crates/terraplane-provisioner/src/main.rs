// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terraplane Provisioner - Workspace Provisioning Daemon
//!
//! Serves a single provisioning session over stdin/stdout. The control
//! plane spawns one provisioner process per session and speaks the framed
//! session protocol over the pipe pair.

use tracing::{info, warn};

use terraplane_provisioner::config::ServeConfig;
use terraplane_provisioner::server::Provisioner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (to stderr; stdout carries the session protocol)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terraplane_provisioner=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = ServeConfig::from_env()?;

    info!(
        pinned_version = %config.pinned_version,
        exit_timeout = ?config.exit_timeout,
        "Starting Terraplane Provisioner"
    );

    let provisioner = Provisioner::new(config);
    let stream = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
    provisioner.serve(stream).await?;

    info!("Terraplane Provisioner shut down");

    Ok(())
}
