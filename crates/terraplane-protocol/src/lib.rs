// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terraplane Protocol - framed Protobuf communication layer
//!
//! This crate defines what flows between the control plane and a
//! provisioning session:
//! - Requests: one `Start`, optionally followed by one `Cancel`
//! - Responses: zero or more `Log` messages, then exactly one `Complete`
//! - Stream-level errors: a `SessionError` frame that terminates the
//!   session without a `Complete`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   terraplane-protocol                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Session layer: typed Start/Cancel → Log*/Complete streams  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Serialization: Protobuf (prost)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Framing: 4-byte length + 2-byte type header                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transport underneath is deliberately unspecified: anything that
//! provides an ordered, reliable duplex byte stream (a QUIC stream, a unix
//! socket, stdio pipes, an in-memory duplex in tests) carries the frames.

pub mod frame;
pub mod messages;
pub mod stream;

pub use frame::{Frame, FrameError, FramedStream, MessageType};
pub use messages::{
    Agent, Cancel, Complete, Log, LogLevel, ParameterDestination, ParameterValue,
    ProvisionRequest, ProvisionResponse, Resource, SessionError, Start, WorkspaceTransition,
};
pub use stream::{SessionClient, SessionReader, SessionWriter, StreamError, split_session};
