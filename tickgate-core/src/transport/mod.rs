//! Request/response channel to the external agent.
//!
//! The control loop only sees the [`Transport`] trait: one blocking
//! request/response exchange per call. [`pipe::PipeTransport`] is the
//! production implementation over a pair of named pipes.

#[cfg(unix)]
pub mod fifo;
#[cfg(unix)]
pub mod pipe;

use crate::wire::{ActionRequest, AgentReply, WireError};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from a single request/response exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Channel could not be opened yet (agent not listening). Retried on the next call.
    #[error("channel {} not ready: {source}", path.display())]
    NotReady {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// No reply within the configured bound.
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// Reply could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Reply named an action id outside the catalog.
    #[error("agent chose unknown action id {0}")]
    InvalidAction(i64),
    /// Peer closed its end of the channel.
    #[error("agent closed the channel")]
    Disconnected,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Broken channels are surfaced to the host; everything else is recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Disconnected | TransportError::Io(_))
    }
}

impl From<WireError> for TransportError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::InvalidAction(code) => TransportError::InvalidAction(code),
            other => TransportError::Protocol(other.to_string()),
        }
    }
}

/// Synchronous channel to the decision agent.
pub trait Transport {
    /// Send one request and block for its reply, up to the configured bound.
    fn request_action(&mut self, request: &ActionRequest) -> Result<AgentReply, TransportError>;
}
