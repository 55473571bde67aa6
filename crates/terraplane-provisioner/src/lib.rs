// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terraplane Provisioner - Workspace Provisioning Sessions
//!
//! This crate drives a terraform-compatible binary on behalf of the
//! terraplane control plane. Each duplex stream carries exactly one
//! provisioning session: a `Start` request, streamed `Log` responses, and
//! exactly one terminal outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Control Plane                            │
//! └─────────────────────────────────────────────────────────────────┘
//!                │ Start / Cancel          ▲ Log* / Complete
//!                ▼                         │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │               terraplane-provisioner (This Crate)               │
//! │  ┌──────────┐  ┌────────────┐  ┌──────────┐  ┌──────────────┐   │
//! │  │ Session  │  │ Supervisor │  │  Cancel  │  │   Log        │   │
//! │  │ Engine   │  │            │  │  Ladder  │  │   Classifier │   │
//! │  └──────────┘  └────────────┘  └──────────┘  └──────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//!                │ spawn (own process group)
//!                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            terraform init / plan / apply / destroy              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Session Protocol
//!
//! | Message | Direction | Description |
//! |---------|-----------|-------------|
//! | `Start` | in | Begin a session: directory, transition, parameters, prior state |
//! | `Cancel` | in | Interrupt the running tool; the session still terminates normally |
//! | `Log` | out | One classified, redacted, sequenced line of tool output |
//! | `Complete` | out | Terminal outcome: error text, resources, updated state |
//! | error frame | out | Stream-level failure; no `Complete` follows |
//!
//! # Cancellation Ladder
//!
//! ```text
//! Running ──cancel──▶ Interrupting ──timeout──▶ Killing ──timeout──▶ Abandoned
//!                      (SIGINT)                 (SIGKILL)
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `TERRAPLANE_TERRAFORM_PATH` | No | resolve from PATH | Terraform binary |
//! | `TERRAPLANE_TERRAFORM_VERSION` | No | `1.1.9` | Pinned terraform version |
//! | `TERRAPLANE_CACHE_DIR` | No | - | Provider plugin cache directory |
//! | `TERRAPLANE_EXIT_TIMEOUT_SECS` | No | `300` | SIGINT-to-SIGKILL grace period |
//!
//! # Modules
//!
//! - [`cancel`]: Bounded cancellation ladder for tool processes
//! - [`config`]: Server configuration from environment variables
//! - [`error`]: Error types for provisioning operations
//! - [`logs`]: Log classification and secret redaction
//! - [`resources`]: Resource extraction from state and plan output
//! - [`server`]: Session dispatch over duplex streams
//! - [`session`]: The provisioning session engine
//! - [`supervisor`]: Tool process supervision and signalling
//! - [`vars`]: Parameter translation into variables and environment
//! - [`version`]: Terraform binary version gate

#![deny(missing_docs)]

/// Bounded cancellation ladder for tool processes.
pub mod cancel;

/// Server configuration loaded from environment variables.
pub mod config;

/// Error types for provisioning operations.
pub mod error;

/// Log classification and secret redaction.
pub mod logs;

/// Resource extraction from terraform state and plan output.
pub mod resources;

/// Session dispatch over duplex streams.
pub mod server;

/// The provisioning session engine.
pub mod session;

/// Tool process supervision and signalling.
pub mod supervisor;

/// Parameter translation into variables and environment.
pub mod vars;

/// Terraform binary version gate.
pub mod version;

pub use config::ServeConfig;
pub use error::ProvisionError;
pub use server::Provisioner;
