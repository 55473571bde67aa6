// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded cancellation for supervised tool processes.
//!
//! Cancellation escalates through a fixed ladder: SIGINT the process group,
//! wait up to the configured exit timeout, SIGKILL the group, wait a short
//! kill timeout, then abandon the process and let the session terminate
//! without it. Each wait is driven by an armed deadline that the session
//! loop polls alongside process exit and output.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use tracing::warn;

use crate::supervisor;

/// How long a SIGKILLed process group gets before it is abandoned.
pub const KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Cancellation ladder position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    /// No cancellation requested
    Running,
    /// SIGINT sent; waiting for a graceful exit
    Interrupting,
    /// SIGKILL sent; waiting for the kernel to reap the group
    Killing,
    /// The process group outlived the kill wait; the session gave up on it
    Abandoned,
}

/// Drives the cancellation ladder for one tool process.
pub struct CancelController {
    state: CancelState,
    exit_timeout: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl CancelController {
    /// Create a controller in the [`CancelState::Running`] state.
    pub fn new(exit_timeout: Duration) -> Self {
        Self {
            state: CancelState::Running,
            exit_timeout,
            deadline: None,
        }
    }

    /// Current ladder position.
    pub fn state(&self) -> CancelState {
        self.state
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.state != CancelState::Running
    }

    /// Request cancellation: interrupt the process group and arm the exit
    /// deadline. Repeat requests are ignored.
    pub fn cancel(&mut self, pgid: i32) {
        if self.is_cancelled() {
            return;
        }
        supervisor::interrupt_group(pgid);
        self.state = CancelState::Interrupting;
        self.deadline = Some(Box::pin(sleep(self.exit_timeout)));
    }

    /// Wait for the armed deadline. Pending forever while no deadline is
    /// armed, so this can sit in a `select!` arm unconditionally.
    pub async fn deadline_elapsed(&mut self) {
        match self.deadline.as_mut() {
            Some(deadline) => deadline.as_mut().await,
            None => pending().await,
        }
    }

    /// Escalate after a deadline fires. Returns `true` once the process has
    /// been abandoned and the session should stop waiting for it.
    pub fn escalate(&mut self, pgid: i32) -> bool {
        match self.state {
            CancelState::Interrupting => {
                warn!("tool ignored interrupt, killing process group");
                supervisor::kill_group(pgid);
                self.state = CancelState::Killing;
                self.deadline = Some(Box::pin(sleep(KILL_TIMEOUT)));
                false
            }
            CancelState::Killing => {
                warn!("tool survived kill, abandoning process group");
                self.state = CancelState::Abandoned;
                self.deadline = None;
                true
            }
            // A stale deadline without a pending escalation is disarmed.
            CancelState::Running | CancelState::Abandoned => {
                self.deadline = None;
                false
            }
        }
    }

    /// The process exited; disarm any pending deadline.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }
}
