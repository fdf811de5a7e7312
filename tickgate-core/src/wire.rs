//! Wire records and the line-delimited JSON codec.
//!
//! One JSON object per line in each direction:
//!
//! ```text
//! request:  {"observation":{..},"legal_actions":[2,3],"retry_count":0}
//! response: {"action":1,"params":{"indices":[1,3]}}
//! response: {"action":"ready","params":{}}
//! ```
//!
//! Action ids are integers and the handshake sentinel is a string, so the two
//! can never collide.

use crate::action::{ActionId, ActionParams};
use crate::observation::Observation;
use crate::registry::LegalActions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved response value meaning "agent is ready", not a decision.
pub const READY_SENTINEL: &str = "ready";

/// Request sent to the agent. All three fields are required on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub observation: Observation,
    pub legal_actions: LegalActions,
    pub retry_count: u32,
}

/// A decision returned by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub action: ActionId,
    pub params: ActionParams,
}

/// Everything the agent can answer with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    /// Handshake: the agent has come up. Carries no decision.
    Ready,
    Decision(ActionResponse),
}

#[derive(Error, Debug)]
pub enum WireError {
    #[error("empty record")]
    Empty,
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown action sentinel '{0}'")]
    UnknownSentinel(String),
    #[error("unknown action id {0}")]
    InvalidAction(i64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireAction {
    Code(i64),
    Word(String),
}

#[derive(Serialize, Deserialize)]
struct WireReply {
    action: WireAction,
    #[serde(default)]
    params: ActionParams,
}

/// Encode a request as one newline-terminated line.
pub fn encode_request(request: &ActionRequest) -> Result<String, WireError> {
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_request(line: &str) -> Result<ActionRequest, WireError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(WireError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Encode a reply as one newline-terminated line.
pub fn encode_reply(reply: &AgentReply) -> Result<String, WireError> {
    let wire = match reply {
        AgentReply::Ready => WireReply {
            action: WireAction::Word(READY_SENTINEL.to_string()),
            params: ActionParams::default(),
        },
        AgentReply::Decision(response) => WireReply {
            action: WireAction::Code(i64::from(response.action.code())),
            params: response.params.clone(),
        },
    };
    let mut line = serde_json::to_string(&wire)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_reply(line: &str) -> Result<AgentReply, WireError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(WireError::Empty);
    }
    let wire: WireReply = serde_json::from_str(line)?;
    match wire.action {
        WireAction::Word(word) if word == READY_SENTINEL => Ok(AgentReply::Ready),
        WireAction::Word(word) => Err(WireError::UnknownSentinel(word)),
        WireAction::Code(code) => {
            let action = ActionId::from_code(code).ok_or(WireError::InvalidAction(code))?;
            Ok(AgentReply::Decision(ActionResponse {
                action,
                params: wire.params,
            }))
        }
    }
}
