// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terraform binary version gate.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ProvisionError, Result};
use crate::supervisor::{self, ToolInvocation};

#[derive(Deserialize)]
struct VersionOutput {
    terraform_version: String,
}

/// Parse the `terraform version -json` output into a bare version string.
pub fn parse_version_output(stdout: &str) -> Result<String> {
    let output: VersionOutput = serde_json::from_str(stdout)?;
    Ok(output.terraform_version)
}

/// Run `terraform version -json` in `workdir` and require an exact match
/// against the pinned version. Runs before any state is touched, so a
/// mismatched binary fails the session with no side effects.
pub async fn verify(binary: &Path, workdir: &Path, pinned: &str) -> Result<()> {
    let captured = supervisor::run_capture(&ToolInvocation {
        binary: binary.to_path_buf(),
        args: vec!["version".to_string(), "-json".to_string()],
        workdir: workdir.to_path_buf(),
        env: Vec::new(),
    })
    .await?;

    if !captured.status.success() {
        return Err(ProvisionError::Version(supervisor::exit_status_text(
            captured.status,
        )));
    }

    let actual = parse_version_output(&captured.stdout)?;
    if actual != pinned {
        return Err(ProvisionError::VersionMismatch {
            expected: pinned.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        let stdout = r#"{"terraform_version":"1.1.9","platform":"linux_amd64","terraform_outdated":true}"#;
        assert_eq!(parse_version_output(stdout).unwrap(), "1.1.9");
    }

    #[test]
    fn test_parse_version_output_rejects_garbage() {
        assert!(parse_version_output("Terraform v1.1.9").is_err());
    }
}
