// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session dispatch for incoming provisioning streams.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::error;

use crate::config::ServeConfig;
use crate::session;

/// Accepts provisioning session streams and runs one session per stream.
#[derive(Clone)]
pub struct Provisioner {
    config: Arc<ServeConfig>,
}

impl Provisioner {
    /// Create a provisioner with the given configuration.
    pub fn new(config: ServeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Serve one session on the calling task.
    pub async fn serve<S>(&self, stream: S) -> crate::error::Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        session::run_session(self.config.clone(), stream).await
    }

    /// Spawn a session onto its own task. Transport failures are logged;
    /// provisioning failures were already reported in-band to the peer.
    pub fn spawn_session<S>(&self, stream: S) -> JoinHandle<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let config = self.config.clone();
        tokio::spawn(async move {
            if let Err(e) = session::run_session(config, stream).await {
                error!(error = %e, "session stream failed");
            }
        })
    }
}
