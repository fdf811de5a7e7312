//! # Tickgate Core
//!
//! Change-detecting decision loop between a tick-driven game simulation and
//! an external decision agent.
//!
//! Once per host tick the loop looks at the simulation, decides whether the
//! situation changed enough to need a decision, asks the agent for exactly one
//! decision over a blocking channel, and re-checks that decision against the
//! live simulation before applying it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Observer   │────▶│   Registry   │────▶│ Fingerprint  │
//! │ (snapshot)  │     │ (legal set)  │     │  (changed?)  │
//! └─────────────┘     └──────────────┘     └──────┬───────┘
//!                                                 │
//! ┌─────────────┐     ┌──────────────┐     ┌──────▼───────┐
//! │  Effector   │◀────│ DecisionLoop │◀───▶│  Transport   │
//! │  (execute)  │     │ (re-validate)│     │ (agent pipe) │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`DecisionLoop`] | Per-tick state machine: observe, request, validate, execute |
//! | [`ActionRegistry`] | Fixed action catalog with preconditions and executed-markers |
//! | [`Fingerprint`] | Comparable summary of state and legal actions |
//! | [`Transport`] | One blocking request/response exchange with the agent |
//! | [`Observer`] / [`Effector`] | Seams to the host simulation |
//!
//! ## Wire Protocol
//!
//! Two named pipes, one JSON record per line. The controller writes
//! [`ActionRequest`]s and reads replies that are either a decision or the
//! one-time `"ready"` handshake. See [`wire`] for the exact format and
//! [`agent`] for the listening side.

pub mod action;
#[cfg(unix)]
pub mod agent;
pub mod autoskip;
pub mod config;
pub mod control;
pub mod fingerprint;
pub mod observation;
pub mod registry;
pub mod testing;
pub mod transport;
pub mod wire;

pub use action::{ActionCategory, ActionId, ActionParams};
pub use autoskip::{auto_skip_action, should_auto_skip};
pub use config::{BridgeConfig, ConfigError};
pub use control::{DecisionLoop, LoopError, LoopPhase, NoDecision, TickOutcome};
pub use fingerprint::{fingerprint, Fingerprint};
pub use observation::{EffectError, Effector, Entity, Observation, Observer, StateId};
pub use registry::{ActionRegistry, LegalActions};
pub use transport::{Transport, TransportError};
pub use wire::{ActionRequest, ActionResponse, AgentReply};

#[cfg(unix)]
pub use agent::{AgentEndpoint, AgentError, Policy, RandomPolicy};
#[cfg(unix)]
pub use transport::pipe::PipeTransport;
