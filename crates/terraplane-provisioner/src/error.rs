// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for terraplane-provisioner.

use thiserror::Error;

/// Provisioning errors.
///
/// Stage errors ([`Init`](ProvisionError::Init), [`Plan`](ProvisionError::Plan),
/// [`Apply`](ProvisionError::Apply), [`Destroy`](ProvisionError::Destroy)) carry
/// a short status description such as `exit status 1` and surface to the caller
/// either inside a `Complete` response or as a stream-level error, depending on
/// the stage and the dry-run flag.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The peer violated the session protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A parameter named an unknown destination scheme.
    #[error("unsupported parameter scheme {scheme} for {name:?}")]
    UnsupportedParameterScheme {
        /// Raw scheme value from the wire.
        scheme: i32,
        /// Name of the offending parameter.
        name: String,
    },

    /// `terraform version` itself failed.
    #[error("terraform version: {0}")]
    Version(String),

    /// The tool binary reported a version other than the pinned one.
    #[error("terraform version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version the server is pinned to.
        expected: String,
        /// Version the binary reported.
        actual: String,
    },

    /// Spawning the tool process failed.
    #[error("start terraform: {0}")]
    Spawn(std::io::Error),

    /// `terraform init` failed.
    #[error("initialize terraform: {0}")]
    Init(String),

    /// `terraform plan` failed.
    #[error("terraform plan: {0}")]
    Plan(String),

    /// `terraform apply` failed.
    #[error("terraform apply: {0}")]
    Apply(String),

    /// `terraform destroy` failed.
    #[error("terraform destroy: {0}")]
    Destroy(String),

    /// Session stream operation failed.
    #[error("stream error: {0}")]
    Stream(#[from] terraplane_protocol::StreamError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type using ProvisionError.
pub type Result<T> = std::result::Result<T, ProvisionError>;
