// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for terraplane-provisioner.

use std::path::PathBuf;
use std::time::Duration;

/// Terraform version the server is pinned to. A binary reporting any other
/// version is rejected before the session starts work.
pub const TERRAFORM_VERSION: &str = "1.1.9";

/// How long a cancelled or draining tool process gets to exit after SIGINT
/// before the whole process group is killed.
pub const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Substrings that mark an environment variable as secret-bearing. Values of
/// matching variables are redacted from session logs, except values shorter
/// than four bytes, which are left as-is.
pub const SECRET_MARKERS: &[&str] = &["SECRET", "TOKEN", "PASSWORD", "PRIVATE_KEY"];

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Path to the terraform binary. `None` resolves `terraform` from PATH.
    pub binary_path: Option<PathBuf>,
    /// Provider plugin cache directory shared across sessions
    pub cache_path: Option<PathBuf>,
    /// Terraform version sessions require from the binary
    pub pinned_version: String,
    /// Grace period between SIGINT and SIGKILL for tool processes
    pub exit_timeout: Duration,
    /// Environment variable name substrings whose values are redacted.
    /// Values shorter than four bytes are not redacted.
    pub secret_markers: Vec<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            cache_path: None,
            pinned_version: TERRAFORM_VERSION.to_string(),
            exit_timeout: DEFAULT_EXIT_TIMEOUT,
            secret_markers: SECRET_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl ServeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let binary_path = std::env::var("TERRAPLANE_TERRAFORM_PATH")
            .ok()
            .map(PathBuf::from);

        let cache_path = std::env::var("TERRAPLANE_CACHE_DIR").ok().map(PathBuf::from);

        let pinned_version = std::env::var("TERRAPLANE_TERRAFORM_VERSION")
            .unwrap_or_else(|_| TERRAFORM_VERSION.to_string());

        let exit_timeout = match std::env::var("TERRAPLANE_EXIT_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| ConfigError::InvalidExitTimeout(v.clone()))?,
            ),
            Err(_) => DEFAULT_EXIT_TIMEOUT,
        };

        Ok(Self {
            binary_path,
            cache_path,
            pinned_version,
            exit_timeout,
            secret_markers: SECRET_MARKERS.iter().map(|m| m.to_string()).collect(),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The exit timeout is not a whole number of seconds.
    #[error("Invalid TERRAPLANE_EXIT_TIMEOUT_SECS: {0}")]
    InvalidExitTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServeConfig::default();
        assert!(config.binary_path.is_none());
        assert_eq!(config.pinned_version, TERRAFORM_VERSION);
        assert_eq!(config.exit_timeout, Duration::from_secs(300));
        assert!(config.secret_markers.iter().any(|m| m == "SECRET"));
    }
}
