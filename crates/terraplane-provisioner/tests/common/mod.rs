// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for terraplane-provisioner session tests.
//!
//! Provides a TestContext that wires a session task to an in-memory duplex
//! stream and installs fake terraform binaries driven by marker files in
//! the session working directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

use terraplane_protocol::messages::{
    Complete, Log, ParameterValue, Start, WorkspaceTransition,
};
use terraplane_protocol::{SessionClient, StreamError};
use terraplane_provisioner::config::ServeConfig;
use terraplane_provisioner::server::Provisioner;

/// Fake terraform driven by marker files in the working directory:
///
/// - `fake_version`: version string reported by `version -json`
/// - `fake_init_logs` / `fake_init_exit`: init output and exit code
/// - `fake_main_logs` / `fake_main_exit`: plan/apply/destroy output and exit code
/// - `fake_print_env`: names of env vars to echo, one per line
/// - `fake_state.json`: copied to `terraform.tfstate` on apply/destroy success
/// - `fake_plan.json`: emitted by `show -json`
///
/// Received plan/apply/destroy arguments are recorded in `fake_args.txt`.
const FAKE_TERRAFORM: &str = r#"#!/bin/sh
cmd="$1"
case "$cmd" in
version)
    v="1.1.9"
    [ -f fake_version ] && v="$(cat fake_version)"
    printf '{"terraform_version":"%s","platform":"linux_amd64"}\n' "$v"
    exit 0
    ;;
init)
    [ -f fake_init_logs ] && cat fake_init_logs
    [ -f fake_init_exit ] && exit "$(cat fake_init_exit)"
    exit 0
    ;;
show)
    if [ -f fake_plan.json ]; then cat fake_plan.json; else echo '{}'; fi
    exit 0
    ;;
plan|apply|destroy)
    echo "$@" > fake_args.txt
    if [ -f fake_print_env ]; then
        while read -r name; do
            eval "printf '%s=%s\n' \"$name\" \"\$$name\""
        done < fake_print_env
    fi
    [ -f fake_main_logs ] && cat fake_main_logs
    [ -f fake_main_exit ] && exit "$(cat fake_main_exit)"
    if [ "$cmd" != "plan" ] && [ -f fake_state.json ]; then
        cp fake_state.json terraform.tfstate
    fi
    exit 0
    ;;
*)
    echo "unknown subcommand: $cmd" >&2
    exit 1
    ;;
esac
"#;

/// Fake terraform that hangs until interrupted, then logs and exits 1.
/// `fake_hang_init` moves the hang from apply to init.
const FAKE_TERRAFORM_CANCEL: &str = r#"#!/bin/sh
cmd="$1"
hang() {
    trap 'echo interrupt; echo exit; exit 1' INT
    echo "$1"
    while :; do sleep 0.1; done
}
case "$cmd" in
version)
    printf '{"terraform_version":"1.1.9","platform":"linux_amd64"}\n'
    exit 0
    ;;
init)
    [ -f fake_hang_init ] && hang init_start
    exit 0
    ;;
apply|destroy)
    hang main_start
    ;;
*)
    exit 0
    ;;
esac
"#;

/// Fake terraform that ignores SIGINT entirely; only SIGKILL stops it.
const FAKE_TERRAFORM_STUBBORN: &str = r#"#!/bin/sh
cmd="$1"
case "$cmd" in
version)
    printf '{"terraform_version":"1.1.9","platform":"linux_amd64"}\n'
    exit 0
    ;;
init)
    exit 0
    ;;
apply|destroy)
    trap '' INT
    echo stubborn_start
    while :; do sleep 0.1; done
    ;;
*)
    exit 0
    ;;
esac
"#;

/// Test context holding a running session task and the client half of its
/// stream.
pub struct TestContext {
    pub client: SessionClient<DuplexStream>,
    pub session: JoinHandle<()>,
    pub workdir: PathBuf,
    pub binary: PathBuf,
    _temp_dir: tempfile::TempDir,
}

/// Everything a session produced before its Complete.
pub struct SessionOutcome {
    pub logs: Vec<Log>,
    pub complete: Complete,
}

impl TestContext {
    /// Start a session task with the default config and the standard fake
    /// terraform.
    pub fn new() -> Self {
        Self::with_config(FAKE_TERRAFORM, ServeConfig::default())
    }

    /// Start a session task with a specific fake binary and config.
    pub fn with_config(fake_binary: &str, config: ServeConfig) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("create temp dir");
        let workdir = temp_dir.path().join("work");
        std::fs::create_dir_all(&workdir).expect("create workdir");

        let binary = temp_dir.path().join("terraform");
        write_executable(&binary, fake_binary);

        let (client_io, server_io) = tokio::io::duplex(1 << 20);
        let provisioner = Provisioner::new(config);
        let session = provisioner.spawn_session(server_io);

        Self {
            client: SessionClient::new(client_io),
            session,
            workdir,
            binary,
            _temp_dir: temp_dir,
        }
    }

    /// A Start request pointed at this context's workdir and fake binary.
    pub fn start_request(&self) -> Start {
        Start {
            directory: self.workdir.display().to_string(),
            binary_override: self.binary.display().to_string(),
            ..Default::default()
        }
    }

    /// Write a marker file into the session working directory.
    pub fn write_marker(&self, name: &str, content: &str) {
        std::fs::write(self.workdir.join(name), content).expect("write marker");
    }

    /// Read a file from the session working directory.
    pub fn read_workdir_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.workdir.join(name)).expect("read workdir file")
    }

    /// Receive responses until Complete, collecting logs along the way.
    pub async fn collect_until_complete(&mut self) -> SessionOutcome {
        let mut logs = Vec::new();
        loop {
            let response = self
                .client
                .recv()
                .await
                .expect("session stream failed")
                .expect("stream closed before Complete");
            if let Some(log) = response.as_log() {
                logs.push(log.clone());
            } else if let Some(complete) = response.as_complete() {
                return SessionOutcome {
                    logs,
                    complete: complete.clone(),
                };
            }
        }
    }

    /// Receive responses until a stream-level error frame, collecting logs
    /// along the way. Returns the logs and the remote error message.
    pub async fn collect_until_stream_error(&mut self) -> (Vec<Log>, String) {
        let mut logs = Vec::new();
        loop {
            match self.client.recv().await {
                Ok(Some(response)) => {
                    if let Some(log) = response.as_log() {
                        logs.push(log.clone());
                    } else {
                        panic!("got a terminal response instead of a stream error");
                    }
                }
                Ok(None) => panic!("stream closed without an error frame"),
                Err(StreamError::Remote { message, .. }) => return (logs, message),
                Err(e) => panic!("unexpected stream failure: {e}"),
            }
        }
    }
}

/// Parameter destined for the tool environment.
pub fn env_parameter(name: &str, value: &str) -> ParameterValue {
    ParameterValue {
        destination_scheme:
            terraplane_protocol::messages::ParameterDestination::Environment as i32,
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Parameter destined for a `-var` flag.
pub fn var_parameter(name: &str, value: &str) -> ParameterValue {
    ParameterValue {
        destination_scheme:
            terraplane_protocol::messages::ParameterDestination::ProvisionerVariable as i32,
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// The cancel-focused fake binary.
pub fn cancel_fake() -> &'static str {
    FAKE_TERRAFORM_CANCEL
}

/// The SIGINT-ignoring fake binary.
pub fn stubborn_fake() -> &'static str {
    FAKE_TERRAFORM_STUBBORN
}

/// Config with a short cancellation grace period for cancel tests.
pub fn short_timeout_config(exit_timeout: Duration) -> ServeConfig {
    ServeConfig {
        exit_timeout,
        ..Default::default()
    }
}

fn write_executable(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, content).expect("write fake binary");
    let mut perms = std::fs::metadata(path).expect("stat fake binary").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod fake binary");
}

/// Transition helper; `Start` is the prost default.
pub fn destroy_transition() -> i32 {
    WorkspaceTransition::Destroy as i32
}
