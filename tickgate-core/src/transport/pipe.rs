//! Controller side of the named-pipe transport.
//!
//! Requests go out on one FIFO, replies come back on the other, one JSON
//! record per line. Handles are opened lazily on the first request (the agent
//! process may not exist yet) and then held for the lifetime of the client.

use super::fifo::{self, LineRead, LineReader};
use super::{Transport, TransportError};
use crate::config::BridgeConfig;
use crate::wire::{self, ActionRequest, AgentReply};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Client for the agent's pipe pair.
pub struct PipeTransport {
    request_path: PathBuf,
    response_path: PathBuf,
    writer: Option<File>,
    reader: Option<LineReader>,
    timeout: Duration,
    /// Timed-out requests whose replies have not been read yet.
    unanswered: u32,
}

impl PipeTransport {
    pub fn new(
        request_path: impl Into<PathBuf>,
        response_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            request_path: request_path.into(),
            response_path: response_path.into(),
            writer: None,
            reader: None,
            timeout,
            unanswered: 0,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            &config.request_pipe,
            &config.response_pipe,
            config.response_timeout(),
        )
    }

    /// Both handles are open.
    pub fn is_connected(&self) -> bool {
        self.writer.is_some() && self.reader.is_some()
    }

    pub fn request_path(&self) -> &Path {
        &self.request_path
    }

    pub fn response_path(&self) -> &Path {
        &self.response_path
    }

    /// Replies still owed for requests that timed out.
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    /// Open whichever handle is still missing.
    ///
    /// The write end only opens once the agent is reading, so a missing
    /// listener shows up here as `NotReady`.
    fn ensure_open(&mut self) -> Result<(), TransportError> {
        if self.writer.is_none() {
            let file = fifo::open_writer(&self.request_path).map_err(|source| {
                TransportError::NotReady {
                    path: self.request_path.clone(),
                    source,
                }
            })?;
            log::info!("Opened request pipe {}", self.request_path.display());
            self.writer = Some(file);
        }

        if self.reader.is_none() {
            let file = fifo::open_reader(&self.response_path).map_err(|source| {
                TransportError::NotReady {
                    path: self.response_path.clone(),
                    source,
                }
            })?;
            log::info!("Opened response pipe {}", self.response_path.display());
            self.reader = Some(LineReader::new(file));
        }
        Ok(())
    }
}

fn write_error(err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::BrokenPipe {
        TransportError::Disconnected
    } else {
        TransportError::Io(err)
    }
}

impl Transport for PipeTransport {
    fn request_action(&mut self, request: &ActionRequest) -> Result<AgentReply, TransportError> {
        let line = wire::encode_request(request)?;
        let timeout = self.timeout;
        self.ensure_open()?;
        let (Some(writer), Some(reader)) = (self.writer.as_mut(), self.reader.as_mut()) else {
            return Err(TransportError::Disconnected);
        };

        writer.write_all(line.as_bytes()).map_err(write_error)?;
        writer.flush().map_err(write_error)?;
        log::debug!(
            "Sent request: {} legal action(s), retry_count={}",
            request.legal_actions.len(),
            request.retry_count
        );

        // Replies to timed-out requests arrive first, in order.
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let reply = match reader.read_line(Some(remaining)) {
                Ok(LineRead::Line(reply)) => reply,
                Ok(LineRead::TimedOut) => {
                    self.unanswered += 1;
                    return Err(TransportError::Timeout(timeout));
                }
                Ok(LineRead::Eof) => return Err(TransportError::Disconnected),
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    if self.unanswered > 0 {
                        self.unanswered -= 1;
                        log::warn!("Dropped unreadable late reply: {}", e);
                        continue;
                    }
                    return Err(TransportError::Protocol(e.to_string()));
                }
                Err(e) => return Err(TransportError::Io(e)),
            };

            if self.unanswered > 0 {
                self.unanswered -= 1;
                log::warn!("Discarded late reply to a timed-out request: {}", reply);
                continue;
            }
            log::debug!("Received reply: {}", reply);
            return Ok(wire::decode_reply(&reply)?);
        }
    }
}
