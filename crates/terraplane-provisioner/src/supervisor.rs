// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tool process supervision.
//!
//! Every terraform invocation runs in its own process group so that
//! interrupt and kill signals reach provider plugin subprocesses, not just
//! the terraform binary itself. Stdout and stderr are pumped line by line
//! into a channel; the exit status arrives on a separate oneshot so a
//! session can keep draining output after the process exits.

use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{ProvisionError, Result};

/// Where a line of tool output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// The tool's stdout stream
    Stdout,
    /// The tool's stderr stream
    Stderr,
}

/// One line of tool output.
#[derive(Debug, Clone)]
pub struct OutputLine {
    /// Stream the line arrived on
    pub source: OutputSource,
    /// Line content without the trailing newline
    pub text: String,
}

/// A fully-specified tool invocation.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Binary to execute
    pub binary: PathBuf,
    /// Command-line arguments
    pub args: Vec<String>,
    /// Working directory for the process
    pub workdir: PathBuf,
    /// Extra environment entries, appended to the inherited environment
    pub env: Vec<(String, String)>,
}

impl ToolInvocation {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .current_dir(&self.workdir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());
        cmd
    }
}

/// Handle to a supervised tool process.
pub struct RunningTool {
    /// Process group id, equal to the child pid
    pgid: i32,
    /// Merged stdout/stderr lines. Closes once both pipes reach EOF.
    pub lines: mpsc::Receiver<OutputLine>,
    /// Resolves when the process exits
    pub exit: oneshot::Receiver<std::io::Result<ExitStatus>>,
}

impl RunningTool {
    /// Process group id of the tool.
    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    /// Send SIGINT to the whole process group.
    pub fn interrupt(&self) {
        interrupt_group(self.pgid);
    }

    /// Send SIGKILL to the whole process group.
    pub fn force_kill(&self) {
        kill_group(self.pgid);
    }
}

/// Send SIGINT to a process group.
pub fn interrupt_group(pgid: i32) {
    signal_group(pgid, Signal::SIGINT);
}

/// Send SIGKILL to a process group.
pub fn kill_group(pgid: i32) {
    signal_group(pgid, Signal::SIGKILL);
}

fn signal_group(pgid: i32, signal: Signal) {
    // killpg(0, ..) would signal the provisioner's own process group.
    if pgid <= 0 {
        warn!(pgid, %signal, "refusing to signal a non-positive process group");
        return;
    }
    match killpg(Pid::from_raw(pgid), signal) {
        Ok(()) => debug!(pgid, %signal, "signalled process group"),
        // ESRCH means the group already exited; nothing to signal.
        Err(nix::errno::Errno::ESRCH) => debug!(pgid, %signal, "process group already gone"),
        Err(e) => warn!(pgid, %signal, error = %e, "failed to signal process group"),
    }
}

/// Spawn a tool process under supervision.
pub fn start(invocation: &ToolInvocation) -> Result<RunningTool> {
    let mut cmd = invocation.command();
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(ProvisionError::Spawn)?;

    // The child is its own process group leader, so its pid is the pgid.
    let pgid = child
        .id()
        .map(|id| id as i32)
        .ok_or_else(|| ProvisionError::Spawn(std::io::Error::other("spawned tool has no pid")))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (line_tx, line_rx) = mpsc::channel(256);

    if let Some(stdout) = stdout {
        tokio::spawn(pump_lines(stdout, OutputSource::Stdout, line_tx.clone()));
    }
    if let Some(stderr) = stderr {
        tokio::spawn(pump_lines(stderr, OutputSource::Stderr, line_tx));
    }

    let (exit_tx, exit_rx) = oneshot::channel();
    tokio::spawn(async move {
        let status = child.wait().await;
        // Receiver dropped means the session abandoned the process.
        let _ = exit_tx.send(status);
    });

    Ok(RunningTool {
        pgid,
        lines: line_rx,
        exit: exit_rx,
    })
}

async fn pump_lines<R: AsyncRead + Unpin>(
    stream: R,
    source: OutputSource,
    tx: mpsc::Sender<OutputLine>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(text)) => {
                if tx.send(OutputLine { source, text }).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                debug!(?source, error = %e, "tool output pipe read failed");
                return;
            }
        }
    }
}

/// Run a tool invocation to completion and capture its full output.
///
/// Used for short, non-streamed invocations like `version -json` and
/// `show -json`.
pub async fn run_capture(invocation: &ToolInvocation) -> Result<CapturedOutput> {
    let output = invocation
        .command()
        .output()
        .await
        .map_err(ProvisionError::Spawn)?;

    Ok(CapturedOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Exit status and full output of a captured invocation.
#[derive(Debug)]
pub struct CapturedOutput {
    /// Process exit status
    pub status: ExitStatus,
    /// Complete stdout as UTF-8 (lossy)
    pub stdout: String,
    /// Complete stderr as UTF-8 (lossy)
    pub stderr: String,
}

/// Render an exit status as short status text, e.g. `exit status 1` or
/// `terminated by signal 9`.
pub fn exit_status_text(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        format!("exit status {code}")
    } else if let Some(signal) = status.signal() {
        format!("terminated by signal {signal}")
    } else {
        // On unix every exit carries a code or a signal.
        "exited abnormally".to_string()
    }
}
