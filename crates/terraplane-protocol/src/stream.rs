// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed session streams over the framed wire format.
//!
//! A session stream is a duplex byte stream carrying exactly one
//! provisioning session. The server side splits it into a [`SessionReader`]
//! for incoming requests and a [`SessionWriter`] for outgoing responses, so
//! a reader task can run independently of response writes. The client side
//! ([`SessionClient`]) is used by the control plane and by tests.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::trace;

use crate::frame::{Frame, FrameError, MessageType, read_frame, write_frame};
use crate::messages::{
    Complete, Log, ProvisionRequest, ProvisionResponse, SessionError, Start,
};

/// Errors surfaced by typed session streams
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("unexpected {0:?} frame")]
    UnexpectedFrame(MessageType),

    #[error("session error [{code}]: {message}")]
    Remote { code: String, message: String },
}

/// Reads provisioning requests from the session stream.
pub struct SessionReader<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> SessionReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Receive the next request, or `None` once the peer closes the stream.
    pub async fn recv(&mut self) -> Result<Option<ProvisionRequest>, StreamError> {
        let frame = match read_frame(&mut self.reader).await {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        trace!(message_type = ?frame.message_type, len = frame.payload.len(), "frame received");
        match frame.message_type {
            MessageType::Request => Ok(Some(frame.decode()?)),
            other => Err(StreamError::UnexpectedFrame(other)),
        }
    }
}

/// Writes provisioning responses to the session stream.
pub struct SessionWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> SessionWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send_log(&mut self, log: Log) -> Result<(), StreamError> {
        let frame = Frame::response(&ProvisionResponse::log(log))?;
        write_frame(&mut self.writer, &frame).await?;
        Ok(())
    }

    pub async fn send_complete(&mut self, complete: Complete) -> Result<(), StreamError> {
        let frame = Frame::response(&ProvisionResponse::complete(complete))?;
        write_frame(&mut self.writer, &frame).await?;
        Ok(())
    }

    /// Send a stream-level error. The stream is unusable afterwards.
    pub async fn send_error(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), StreamError> {
        let frame = Frame::error(&SessionError {
            code: code.into(),
            message: message.into(),
        })?;
        write_frame(&mut self.writer, &frame).await?;
        Ok(())
    }
}

/// Split a duplex session stream into its typed halves.
pub fn split_session<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
) -> (SessionReader<ReadHalf<S>>, SessionWriter<WriteHalf<S>>) {
    let (read_half, write_half) = tokio::io::split(stream);
    (SessionReader::new(read_half), SessionWriter::new(write_half))
}

/// Control-plane side of a session stream.
pub struct SessionClient<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SessionClient<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub async fn send_start(&mut self, start: Start) -> Result<(), StreamError> {
        let frame = Frame::request(&ProvisionRequest::start(start))?;
        write_frame(&mut self.stream, &frame).await?;
        Ok(())
    }

    pub async fn send_cancel(&mut self) -> Result<(), StreamError> {
        let frame = Frame::request(&ProvisionRequest::cancel())?;
        write_frame(&mut self.stream, &frame).await?;
        Ok(())
    }

    /// Receive the next response, or `None` once the session closes the
    /// stream. Error frames surface as [`StreamError::Remote`].
    pub async fn recv(&mut self) -> Result<Option<ProvisionResponse>, StreamError> {
        let frame = match read_frame(&mut self.stream).await {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match frame.message_type {
            MessageType::Response => Ok(Some(frame.decode()?)),
            MessageType::Error => {
                let err: SessionError = frame.decode()?;
                Err(StreamError::Remote {
                    code: err.code,
                    message: err.message,
                })
            }
            other => Err(StreamError::UnexpectedFrame(other)),
        }
    }
}
