// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning session engine.
//!
//! One duplex stream carries exactly one session: a `Start` request, a
//! stream of `Log` responses, and exactly one terminal outcome (a
//! `Complete` response or a stream-level error frame). `Cancel` may arrive
//! at any point and interrupts the running tool without racing the
//! terminal response: the session loop owns both the request channel and
//! the tool process, so the terminal response is sent exactly once, after
//! the cancellation ladder has resolved.

use std::path::PathBuf;
use std::sync::Arc;

use terraplane_protocol::messages::{
    Complete, ProvisionRequest, Start, WorkspaceTransition, provision_request,
};
use terraplane_protocol::{SessionWriter, split_session};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::CancelController;
use crate::config::ServeConfig;
use crate::error::{ProvisionError, Result};
use crate::logs::{LogClassifier, Redactor};
use crate::resources;
use crate::supervisor::{self, OutputLine, OutputSource, ToolInvocation};
use crate::vars;
use crate::version;

/// Name of the state file terraform reads and writes in the session
/// working directory.
const STATE_FILE: &str = "terraform.tfstate";

/// Name of the saved plan produced by dry runs.
const PLAN_FILE: &str = "terraform.tfplan";

/// Serve one provisioning session over a duplex stream.
///
/// Always sends exactly one terminal response before returning, unless the
/// peer disappears first. Errors returned from here are transport
/// failures; provisioning failures are reported in-band.
pub async fn run_session<S>(config: Arc<ServeConfig>, stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let session_id = Uuid::new_v4();
    let (mut reader, mut writer) = split_session(stream);

    // Requests are pumped through a channel so the session loop can poll
    // for Cancel without holding a read future across response writes.
    let (request_tx, mut requests) = mpsc::channel::<ProvisionRequest>(8);
    let reader_task = tokio::spawn(async move {
        loop {
            match reader.recv().await {
                Ok(Some(request)) => {
                    if request_tx.send(request).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "session request stream failed");
                    break;
                }
            }
        }
    });

    let result = serve(&config, session_id, &mut requests, &mut writer).await;
    reader_task.abort();
    result
}

async fn serve<W: AsyncWrite + Unpin>(
    config: &ServeConfig,
    session_id: Uuid,
    requests: &mut mpsc::Receiver<ProvisionRequest>,
    writer: &mut SessionWriter<W>,
) -> Result<()> {
    let start = match requests.recv().await {
        Some(ProvisionRequest {
            request: Some(provision_request::Request::Start(start)),
        }) => start,
        Some(_) => {
            warn!(%session_id, "peer sent a non-Start first message");
            writer
                .send_error("PROTOCOL_ERROR", "first message must be Start")
                .await?;
            return Ok(());
        }
        // Peer closed the stream without ever starting a session.
        None => return Ok(()),
    };

    info!(
        %session_id,
        directory = %start.directory,
        dry_run = start.dry_run,
        transition = ?start.workspace_transition(),
        "session started"
    );

    let dry_run = start.dry_run;
    match drive(config, session_id, &start, requests, writer).await {
        Ok(complete) => {
            info!(%session_id, resources = complete.resources.len(), "session complete");
            writer.send_complete(complete).await?;
        }
        Err(e) if embeds_in_complete(&e, dry_run) => {
            info!(%session_id, error = %e, "session failed");
            writer
                .send_complete(Complete {
                    error: e.to_string(),
                    ..Default::default()
                })
                .await?;
        }
        Err(e) => {
            warn!(%session_id, error = %e, "session failed before provisioning");
            writer.send_error(error_code(&e), e.to_string()).await?;
        }
    }
    Ok(())
}

/// Whether a failure is part of the provisioning outcome (reported inside
/// `Complete`) rather than a stream-level fault. Apply and destroy
/// failures always are; init failures are only when the session would have
/// mutated the workspace, so dry runs keep init faults out of the
/// workspace history.
fn embeds_in_complete(error: &ProvisionError, dry_run: bool) -> bool {
    match error {
        ProvisionError::Apply(_) | ProvisionError::Destroy(_) => true,
        ProvisionError::Init(_) => !dry_run,
        _ => false,
    }
}

fn error_code(error: &ProvisionError) -> &'static str {
    match error {
        ProvisionError::Protocol(_) => "PROTOCOL_ERROR",
        ProvisionError::UnsupportedParameterScheme { .. } => "BAD_PARAMETER",
        ProvisionError::Version(_) | ProvisionError::VersionMismatch { .. } => "VERSION_MISMATCH",
        _ => "PROVISION_FAILURE",
    }
}

async fn drive<W: AsyncWrite + Unpin>(
    config: &ServeConfig,
    session_id: Uuid,
    start: &Start,
    requests: &mut mpsc::Receiver<ProvisionRequest>,
    writer: &mut SessionWriter<W>,
) -> Result<Complete> {
    if start.directory.is_empty() {
        return Err(ProvisionError::Protocol(
            "Start carried no working directory".to_string(),
        ));
    }
    let workdir = PathBuf::from(&start.directory);
    tokio::fs::create_dir_all(&workdir).await?;

    let binary = if start.binary_override.is_empty() {
        config
            .binary_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("terraform"))
    } else {
        PathBuf::from(&start.binary_override)
    };

    // Parameters fail before any tool process is spawned, the version
    // probe included.
    let parameters = vars::translate(&start.parameter_values)?;

    version::verify(&binary, &workdir, &config.pinned_version).await?;

    let mut env: Vec<(String, String)> =
        vec![("TF_IN_AUTOMATION".to_string(), "1".to_string())];
    let cache_dir = if start.cache_directory.is_empty() {
        config.cache_path.clone()
    } else {
        Some(PathBuf::from(&start.cache_directory))
    };
    if let Some(cache_dir) = cache_dir {
        env.push((
            "TF_PLUGIN_CACHE_DIR".to_string(),
            cache_dir.display().to_string(),
        ));
    }
    env.extend(parameters.env.iter().cloned());

    // The tool inherits the provisioner's own environment on top of the
    // injected entries, so both feed the redactor.
    let mut redactor_env: Vec<(String, String)> = std::env::vars().collect();
    redactor_env.extend(env.iter().cloned());
    let redactor = Redactor::from_env(&config.secret_markers, &redactor_env);
    let mut classifier = LogClassifier::new(redactor);

    let transition = start.workspace_transition();

    // Destroying a workspace that was never applied has nothing to tear
    // down; skip the tool entirely.
    if transition == WorkspaceTransition::Destroy && start.prior_state.is_empty() {
        debug!(%session_id, "destroy with no prior state, nothing to do");
        let log = classifier.classify(&OutputLine {
            source: OutputSource::Stdout,
            text: "nothing to do".to_string(),
        });
        writer.send_log(log).await?;
        return Ok(Complete::default());
    }

    if !start.prior_state.is_empty() {
        tokio::fs::write(workdir.join(STATE_FILE), &start.prior_state).await?;
    }

    let mut session = SessionLoop {
        writer,
        classifier: &mut classifier,
        requests,
        cancel: CancelController::new(config.exit_timeout),
    };

    let base = ToolInvocation {
        binary,
        args: Vec::new(),
        workdir: workdir.clone(),
        env,
    };

    session
        .run_stage(
            invocation(&base, &["init", "-no-color", "-input=false"], &[]),
            ProvisionError::Init,
        )
        .await?;

    match (transition, start.dry_run) {
        (_, true) => {
            let mut args = vec!["plan", "-no-color", "-input=false", "-json", "-out", PLAN_FILE];
            if transition == WorkspaceTransition::Destroy {
                args.push("-destroy");
            }
            session
                .run_stage(
                    invocation(&base, &args, &parameters.var_args()),
                    ProvisionError::Plan,
                )
                .await?;

            let show = supervisor::run_capture(&invocation(
                &base,
                &["show", "-json", PLAN_FILE],
                &[],
            ))
            .await?;
            if !show.status.success() {
                return Err(ProvisionError::Plan(supervisor::exit_status_text(
                    show.status,
                )));
            }
            Ok(Complete {
                resources: resources::extract_from_plan(&show.stdout)?,
                ..Default::default()
            })
        }
        (WorkspaceTransition::Destroy, false) => {
            session
                .run_stage(
                    invocation(
                        &base,
                        &["destroy", "-no-color", "-auto-approve", "-input=false", "-json"],
                        &parameters.var_args(),
                    ),
                    ProvisionError::Destroy,
                )
                .await?;
            // All managed resources are gone; the session reports empty
            // state so a repeated destroy short-circuits.
            Ok(Complete::default())
        }
        (WorkspaceTransition::Start, false) => {
            session
                .run_stage(
                    invocation(
                        &base,
                        &["apply", "-no-color", "-auto-approve", "-input=false", "-json"],
                        &parameters.var_args(),
                    ),
                    ProvisionError::Apply,
                )
                .await?;

            let state = match tokio::fs::read(workdir.join(STATE_FILE)).await {
                Ok(state) => state,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            Ok(Complete {
                resources: resources::extract_from_state(&state)?,
                state,
                ..Default::default()
            })
        }
    }
}

fn invocation(base: &ToolInvocation, args: &[&str], extra: &[String]) -> ToolInvocation {
    let mut built = base.clone();
    built.args = args.iter().map(|a| a.to_string()).collect();
    built.args.extend(extra.iter().cloned());
    built
}

/// Outcome of one streamed tool stage.
enum StepOutcome {
    /// The process exited and its output has been fully drained
    Status(std::process::ExitStatus),
    /// The process ignored SIGKILL and was abandoned
    Abandoned,
}

struct SessionLoop<'a, W> {
    writer: &'a mut SessionWriter<W>,
    classifier: &'a mut LogClassifier,
    requests: &'a mut mpsc::Receiver<ProvisionRequest>,
    cancel: CancelController,
}

impl<W: AsyncWrite + Unpin> SessionLoop<'_, W> {
    /// Run one tool stage to completion, mapping a non-zero exit or an
    /// abandoned process into the stage's error.
    async fn run_stage(
        &mut self,
        invocation: ToolInvocation,
        stage_error: fn(String) -> ProvisionError,
    ) -> Result<()> {
        // A cancel that landed while the previous stage was finishing
        // still stops the session; later stages never start.
        if self.cancel.is_cancelled() {
            return Err(stage_error("interrupted".to_string()));
        }
        match self.run_streaming(&invocation).await? {
            StepOutcome::Status(status) if status.success() => Ok(()),
            StepOutcome::Status(status) => {
                Err(stage_error(supervisor::exit_status_text(status)))
            }
            StepOutcome::Abandoned => {
                Err(stage_error("process did not exit after kill".to_string()))
            }
        }
    }

    /// Supervise one tool process: stream its output as logs, service
    /// Cancel requests, and drive the cancellation ladder. Returns once
    /// the process has exited and its output is drained, or once it has
    /// been abandoned.
    async fn run_streaming(&mut self, invocation: &ToolInvocation) -> Result<StepOutcome> {
        let mut tool = supervisor::start(invocation)?;
        let pgid = tool.pgid();

        let mut status: Option<std::io::Result<std::process::ExitStatus>> = None;
        let mut lines_open = true;
        let mut requests_open = true;

        loop {
            if status.is_some() && !lines_open {
                break;
            }
            tokio::select! {
                line = tool.lines.recv(), if lines_open => match line {
                    Some(line) => {
                        let log = self.classifier.classify(&line);
                        self.writer.send_log(log).await?;
                    }
                    None => lines_open = false,
                },
                exit = &mut tool.exit, if status.is_none() => {
                    let exit = exit.unwrap_or_else(|_| {
                        Err(std::io::Error::other("tool wait task dropped"))
                    });
                    self.cancel.disarm();
                    status = Some(exit);
                }
                request = self.requests.recv(), if requests_open => match request {
                    Some(ProvisionRequest {
                        request: Some(provision_request::Request::Cancel(_)),
                    }) => {
                        info!("cancel requested, interrupting tool");
                        self.cancel.cancel(pgid);
                    }
                    Some(ProvisionRequest {
                        request: Some(provision_request::Request::Start(_)),
                    }) => {
                        supervisor::kill_group(pgid);
                        return Err(ProvisionError::Protocol(
                            "received Start while a session is running".to_string(),
                        ));
                    }
                    Some(ProvisionRequest { request: None }) => {}
                    // Peer disconnect counts as cancellation.
                    None => {
                        requests_open = false;
                        info!("peer disconnected, interrupting tool");
                        self.cancel.cancel(pgid);
                    }
                },
                _ = self.cancel.deadline_elapsed() => {
                    if self.cancel.escalate(pgid) {
                        return Ok(StepOutcome::Abandoned);
                    }
                }
            }
        }

        // The loop only breaks once the wait task has reported.
        let exit =
            status.unwrap_or_else(|| Err(std::io::Error::other("tool exited without status")))?;
        Ok(StepOutcome::Status(exit))
    }
}
