//! Agent side of the pipe pair.
//!
//! [`AgentEndpoint`] owns the FIFOs: it creates them, waits for the
//! controller to connect, and then answers one request per line. The first
//! request is always answered with the `"ready"` handshake; after that each
//! request goes to a [`Policy`].
//!
//! The policies here are reference players for wiring and tests. Anything
//! that actually learns lives outside this crate and only needs to speak the
//! same line protocol.

use crate::action::{ActionId, ActionParams};
use crate::transport::fifo;
use crate::wire::{self, ActionRequest, ActionResponse, AgentReply, WireError};
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Chooses a decision for a request.
pub trait Policy {
    fn name(&self) -> &'static str;

    /// Pick one of `request.legal_actions`. `None` leaves the request unanswered.
    fn decide(&mut self, request: &ActionRequest) -> Option<ActionResponse>;
}

/// Largest selection the random policy will make.
const MAX_SELECTION: usize = 5;

/// Uniformly random legal play.
pub struct RandomPolicy {
    rng: rand::rngs::StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    fn random_selection(&mut self, hand_size: usize) -> Vec<u32> {
        if hand_size == 0 {
            return vec![];
        }
        let count = self.rng.gen_range(1..=hand_size.min(MAX_SELECTION));
        let mut picked: Vec<u32> = index::sample(&mut self.rng, hand_size, count)
            .into_iter()
            .map(|i| i as u32 + 1)
            .collect();
        picked.sort_unstable();
        picked
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &'static str {
        "RandomPolicy"
    }

    fn decide(&mut self, request: &ActionRequest) -> Option<ActionResponse> {
        let legal = request.legal_actions.to_vec();
        let action = *legal.choose(&mut self.rng)?;

        let params = if action == ActionId::SelectChoice {
            ActionParams::with_indices(self.random_selection(request.observation.hand.len()))
        } else {
            ActionParams::default()
        };

        Some(ActionResponse { action, params })
    }
}

/// Listening end of the transport.
pub struct AgentEndpoint {
    request_path: PathBuf,
    response_path: PathBuf,
    requests: BufReader<File>,
    responses: File,
    handshake_sent: bool,
}

impl AgentEndpoint {
    /// Create both pipes and block until the controller has connected.
    pub fn listen(
        request_path: impl Into<PathBuf>,
        response_path: impl Into<PathBuf>,
    ) -> Result<Self, AgentError> {
        let request_path = request_path.into();
        let response_path = response_path.into();
        fifo::create_pipes(&[&request_path, &response_path])?;

        log::info!("Waiting for controller on {}", request_path.display());
        // The controller opens the request pipe for writing first, then the
        // response pipe for reading; open in the same order to avoid deadlock.
        let requests = BufReader::new(File::open(&request_path)?);
        let responses = OpenOptions::new().write(true).open(&response_path)?;
        log::info!("Controller connected");

        Ok(Self {
            request_path,
            response_path,
            requests,
            responses,
            handshake_sent: false,
        })
    }

    pub fn request_path(&self) -> &Path {
        &self.request_path
    }

    pub fn response_path(&self) -> &Path {
        &self.response_path
    }

    /// Block for the next request. `Ok(None)` means the controller hung up.
    pub fn wait_for_request(&mut self) -> Result<Option<ActionRequest>, AgentError> {
        let mut line = String::new();
        if self.requests.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let request = wire::decode_request(&line)?;
        log::debug!(
            "Received request: state={} legal={:?} retry_count={}",
            request.observation.state,
            request.legal_actions.to_vec(),
            request.retry_count
        );
        Ok(Some(request))
    }

    /// Write one reply and flush it immediately.
    pub fn send_reply(&mut self, reply: &AgentReply) -> Result<(), AgentError> {
        let line = wire::encode_reply(reply)?;
        self.responses.write_all(line.as_bytes())?;
        self.responses.flush()?;
        log::debug!("Sent reply: {}", line.trim_end());
        Ok(())
    }

    /// Answer requests until the controller disconnects.
    ///
    /// Returns the number of requests seen. Undecodable requests are logged
    /// and skipped.
    pub fn serve<P: Policy + ?Sized>(&mut self, policy: &mut P) -> Result<u64, AgentError> {
        log::info!("Serving decisions with {}", policy.name());
        let mut served = 0;
        loop {
            let request = match self.wait_for_request() {
                Ok(Some(request)) => request,
                Ok(None) => {
                    log::info!("Controller disconnected after {} request(s)", served);
                    return Ok(served);
                }
                Err(AgentError::Wire(e)) => {
                    log::error!("Invalid request: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            served += 1;

            if !self.handshake_sent {
                self.send_reply(&AgentReply::Ready)?;
                self.handshake_sent = true;
                log::info!("Handshake sent");
                continue;
            }

            match policy.decide(&request) {
                Some(response) => {
                    log::info!(
                        "Decided {} {:?} (retry_count={})",
                        response.action,
                        response.params.indices,
                        request.retry_count
                    );
                    self.send_reply(&AgentReply::Decision(response))?;
                }
                None => log::warn!("{} had no decision, leaving request unanswered", policy.name()),
            }
        }
    }
}

impl Drop for AgentEndpoint {
    fn drop(&mut self) {
        if let Err(e) = fifo::remove_pipes(&[&self.request_path, &self.response_path]) {
            log::warn!("Failed to remove pipes: {}", e);
        }
    }
}
