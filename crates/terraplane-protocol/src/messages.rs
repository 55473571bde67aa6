// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Protobuf message types for the provisioning session protocol.
//!
//! Written as prost derives rather than generated from `.proto` files so
//! the crate builds without a protoc toolchain; the wire encoding is plain
//! proto3 either way, and tag numbers are stable.

/// Where a parameter value is routed when the tool is invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ParameterDestination {
    /// Passed to the tool's variable mechanism (`-var name=value`).
    ProvisionerVariable = 0,
    /// Injected into the child process environment.
    Environment = 1,
}

/// Whether a session provisions or tears down resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum WorkspaceTransition {
    Start = 0,
    Destroy = 1,
}

/// Severity of a single log line surfaced to the control plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

/// A caller-supplied parameter with its routing scheme.
///
/// `destination_scheme` is kept as a raw i32 (proto3 open enum): the engine
/// must be able to reject schemes it does not recognize rather than have
/// them silently collapse to a default.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ParameterValue {
    #[prost(int32, tag = "1")]
    pub destination_scheme: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub value: String,
}

impl ParameterValue {
    /// Decoded destination scheme, if it is one this protocol knows.
    pub fn destination(&self) -> Option<ParameterDestination> {
        ParameterDestination::try_from(self.destination_scheme).ok()
    }
}

/// Opens a provisioning session. Must be the first message on the stream.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Start {
    /// Working directory containing the tool configuration.
    #[prost(string, tag = "1")]
    pub directory: String,
    /// Plugin/artifact cache directory; empty means the server default.
    #[prost(string, tag = "2")]
    pub cache_directory: String,
    /// Explicit tool binary path; empty means the server-resolved binary.
    #[prost(string, tag = "3")]
    pub binary_override: String,
    /// Plan only, never mutate real resources.
    #[prost(bool, tag = "4")]
    pub dry_run: bool,
    /// Opaque prior state blob from the previous session, if any.
    #[prost(bytes = "vec", tag = "5")]
    pub prior_state: Vec<u8>,
    #[prost(message, repeated, tag = "6")]
    pub parameter_values: Vec<ParameterValue>,
    #[prost(enumeration = "WorkspaceTransition", tag = "7")]
    pub transition: i32,
}

impl Start {
    /// Decoded transition, defaulting to `Start` for unknown values the
    /// same way proto3 open enums do.
    pub fn workspace_transition(&self) -> WorkspaceTransition {
        WorkspaceTransition::try_from(self.transition).unwrap_or(WorkspaceTransition::Start)
    }
}

/// Requests cancellation of the in-flight session. Carries no payload.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Cancel {}

/// One classified output line from the supervised tool.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Log {
    #[prost(enumeration = "LogLevel", tag = "1")]
    pub level: i32,
    #[prost(string, tag = "2")]
    pub output: String,
    /// Monotonic per-session sequence number.
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

impl Log {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::try_from(self.level).unwrap_or(LogLevel::Info)
    }
}

pub mod agent {
    /// Authentication descriptor attached to an agent.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Auth {
        /// Opaque pre-issued token.
        #[prost(string, tag = "3")]
        Token(String),
    }
}

/// A runtime endpoint descriptor attached to a provisioned resource.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Agent {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(oneof = "agent::Auth", tags = "3")]
    pub auth: Option<agent::Auth>,
}

/// A provisioned entity extracted from the tool's structured output.
///
/// Agent ordering within a resource follows extraction order and is not
/// guaranteed stable across runs; consumers that need determinism sort by
/// agent name.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Resource {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub r#type: String,
    #[prost(message, repeated, tag = "3")]
    pub agents: Vec<Agent>,
}

/// Terminal result of a session. Exactly one is emitted per session unless
/// the session ends with a stream-level [`SessionError`] instead.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Complete {
    /// Empty on success.
    #[prost(string, tag = "1")]
    pub error: String,
    /// Empty on destroy and on failure.
    #[prost(message, repeated, tag = "2")]
    pub resources: Vec<Resource>,
    /// Updated opaque state blob; empty after a completed destroy.
    #[prost(bytes = "vec", tag = "3")]
    pub state: Vec<u8>,
}

pub mod provision_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1")]
        Start(super::Start),
        #[prost(message, tag = "2")]
        Cancel(super::Cancel),
    }
}

/// Envelope for control-plane → session messages.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProvisionRequest {
    #[prost(oneof = "provision_request::Request", tags = "1, 2")]
    pub request: Option<provision_request::Request>,
}

pub mod provision_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        Log(super::Log),
        #[prost(message, tag = "2")]
        Complete(super::Complete),
    }
}

/// Envelope for session → control-plane messages.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProvisionResponse {
    #[prost(oneof = "provision_response::Response", tags = "1, 2")]
    pub response: Option<provision_response::Response>,
}

impl ProvisionRequest {
    pub fn start(start: Start) -> Self {
        Self {
            request: Some(provision_request::Request::Start(start)),
        }
    }

    pub fn cancel() -> Self {
        Self {
            request: Some(provision_request::Request::Cancel(Cancel {})),
        }
    }
}

impl ProvisionResponse {
    pub fn log(log: Log) -> Self {
        Self {
            response: Some(provision_response::Response::Log(log)),
        }
    }

    pub fn complete(complete: Complete) -> Self {
        Self {
            response: Some(provision_response::Response::Complete(complete)),
        }
    }

    /// The log payload, if this response is one.
    pub fn as_log(&self) -> Option<&Log> {
        match &self.response {
            Some(provision_response::Response::Log(log)) => Some(log),
            _ => None,
        }
    }

    /// The terminal payload, if this response is one.
    pub fn as_complete(&self) -> Option<&Complete> {
        match &self.response {
            Some(provision_response::Response::Complete(complete)) => Some(complete),
            _ => None,
        }
    }
}

/// Payload of an Error frame: the session failed at the stream level and no
/// `Complete` will follow.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SessionError {
    /// Stable machine-readable code, e.g. `PROTOCOL_ERROR`.
    #[prost(string, tag = "1")]
    pub code: String,
    #[prost(string, tag = "2")]
    pub message: String,
}
