//! The per-tick decision loop.
//!
//! Each call to [`DecisionLoop::tick`] runs one pass of:
//!
//! ```text
//! observe → legal set → fingerprint ─┬─ unchanged ──────────────► idle
//!                                    ├─ single structural ──────► execute (auto-skip)
//!                                    └─ changed ─► request ─► re-validate ─► execute
//!                                                                 │             │
//!                                                              stale        failure
//!                                                             discard    retry next tick
//! ```
//!
//! All mutable state lives in one [`LoopContext`] owned by the loop, so any
//! number of independent loops can run side by side. The loop never spawns
//! threads; the transport's bounded read is the only place a tick can block.

use crate::action::{ActionId, ActionParams};
use crate::autoskip::auto_skip_action;
use crate::config::BridgeConfig;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::observation::{Effector, Observation, Observer, StateId};
use crate::registry::{ActionRegistry, LegalActions};
use crate::transport::{Transport, TransportError};
use crate::wire::{ActionRequest, ActionResponse, AgentReply};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    /// The channel to the agent is broken. The loop itself stays usable.
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("{action} failed {retries} times in a row")]
    RetryLimit { action: ActionId, retries: u32 },
}

/// Where the loop is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPhase {
    #[default]
    Idle,
    /// A request is out and the loop is blocked on the reply.
    AwaitingDecision,
    /// A decision arrived and is being validated.
    DecisionPending,
    /// The last decision failed to execute and waits for re-validation next tick.
    Retrying,
}

/// Why a request produced no decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDecision {
    NotReady,
    Timeout,
    Protocol,
    InvalidAction(i64),
    /// A known action that was not in the legal set sent with the request.
    NotOffered(ActionId),
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Disabled,
    NoLegalActions,
    Unchanged,
    AutoSkipped(ActionId),
    AutoSkipFailed(ActionId),
    Handshake,
    Executed(ActionId),
    ExecutionFailed { action: ActionId, retry_count: u32 },
    /// A decision was no longer legal and was dropped without executing.
    Discarded(ActionId),
    NoDecision(NoDecision),
}

/// Loop-scoped state: markers, retry counter, last fingerprint, pending slot.
#[derive(Debug, Default)]
pub struct LoopContext {
    registry: ActionRegistry,
    retry_count: u32,
    last_fingerprint: Option<Fingerprint>,
    last_state: Option<StateId>,
    pending: Option<ActionResponse>,
    phase: LoopPhase,
}

impl LoopContext {
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_fingerprint(&self) -> Option<&Fingerprint> {
        self.last_fingerprint.as_ref()
    }

    pub fn pending(&self) -> Option<&ActionResponse> {
        self.pending.as_ref()
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Reset markers when the state identifier moves.
    fn enter_state(&mut self, state: StateId) {
        if let Some(previous) = self.last_state {
            if previous != state {
                log::debug!("State {} -> {}, resetting markers", previous, state);
                self.registry.reset_markers();
            }
        }
        self.last_state = Some(state);
    }

    /// Drop the pending decision and start from a clean baseline.
    fn discard(&mut self) {
        self.pending = None;
        self.retry_count = 0;
        self.last_fingerprint = None;
        self.phase = LoopPhase::Idle;
    }
}

/// Change-detecting decision loop over a [`Transport`].
pub struct DecisionLoop<T: Transport> {
    transport: T,
    ctx: LoopContext,
    enabled: bool,
    auto_skip: bool,
    max_retries: Option<u32>,
    ticks: u64,
}

impl<T: Transport> DecisionLoop<T> {
    pub fn new(transport: T, config: &BridgeConfig) -> Self {
        Self {
            transport,
            ctx: LoopContext::default(),
            enabled: config.start_enabled,
            auto_skip: config.auto_skip,
            max_retries: config.max_retries,
            ticks: 0,
        }
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            log::info!("Decision loop enabled");
        }
        self.enabled = true;
    }

    /// Stop acting on ticks. Any pending decision is dropped.
    pub fn disable(&mut self) {
        if self.enabled {
            log::info!("Decision loop disabled");
        }
        self.enabled = false;
        self.ctx.discard();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn context(&self) -> &LoopContext {
        &self.ctx
    }

    pub fn retry_count(&self) -> u32 {
        self.ctx.retry_count
    }

    pub fn phase(&self) -> LoopPhase {
        self.ctx.phase
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run one pass of the loop against the host simulation.
    ///
    /// Returns `Err` only for a broken transport or an exceeded retry cap;
    /// every other condition is recovered here and reported as a [`TickOutcome`].
    pub fn tick<H>(&mut self, host: &mut H) -> Result<TickOutcome, LoopError>
    where
        H: Observer + Effector,
    {
        self.ticks += 1;
        if !self.enabled {
            return Ok(TickOutcome::Disabled);
        }

        let obs = host.observation();
        self.ctx.enter_state(obs.state);
        let legal = self.ctx.registry.legal_actions(&obs);

        // A failed decision is re-validated before anything new is asked for.
        if let Some(pending) = self.ctx.pending.take() {
            if !legal.contains(pending.action) {
                log::warn!(
                    "Discarding stale decision {}: not legal in state {}",
                    pending.action,
                    obs.state
                );
                self.ctx.discard();
                return Ok(TickOutcome::Discarded(pending.action));
            }
            log::info!(
                "Re-requesting after failed {} (retry_count={})",
                pending.action,
                self.ctx.retry_count
            );
            self.ctx.phase = LoopPhase::Idle;
        }

        if legal.is_empty() {
            log::debug!("Tick {}: no legal actions in state {}", self.ticks, obs.state);
            return Ok(TickOutcome::NoLegalActions);
        }

        let current = fingerprint(&obs, &legal);
        if self.ctx.last_fingerprint.as_ref() == Some(&current) {
            log::debug!("Tick {}: unchanged {}", self.ticks, current);
            return Ok(TickOutcome::Unchanged);
        }
        log::debug!(
            "Tick {}: fingerprint {} (was {})",
            self.ticks,
            current,
            self.ctx
                .last_fingerprint
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unset".into())
        );

        if self.auto_skip {
            if let Some(action) = auto_skip_action(&obs, &legal) {
                return Ok(self.skip(host, action));
            }
        }

        self.request(host, obs, legal, current)
    }

    fn skip<H: Effector>(&mut self, host: &mut H, action: ActionId) -> TickOutcome {
        // Whatever the skip changes must be seen next tick.
        self.ctx.last_fingerprint = None;
        match host.execute(action, &ActionParams::default()) {
            Ok(()) => {
                self.ctx.registry.record_execution(action);
                self.ctx.retry_count = 0;
                log::info!("Auto-skipped {}", action);
                TickOutcome::AutoSkipped(action)
            }
            Err(e) => {
                log::warn!("Auto-skip {} failed: {}", action, e);
                TickOutcome::AutoSkipFailed(action)
            }
        }
    }

    fn request<H>(
        &mut self,
        host: &mut H,
        observation: Observation,
        legal_actions: LegalActions,
        current: Fingerprint,
    ) -> Result<TickOutcome, LoopError>
    where
        H: Observer + Effector,
    {
        let request = ActionRequest {
            observation,
            legal_actions,
            retry_count: self.ctx.retry_count,
        };
        log::info!(
            "Requesting decision: state={} legal={:?} retry_count={}",
            request.observation.state,
            request.legal_actions.to_vec(),
            request.retry_count
        );

        self.ctx.phase = LoopPhase::AwaitingDecision;
        let reply = self.transport.request_action(&request);
        self.ctx.phase = LoopPhase::Idle;

        match reply {
            Ok(AgentReply::Ready) => {
                log::info!("Agent ready");
                self.ctx.last_fingerprint = None;
                Ok(TickOutcome::Handshake)
            }
            Ok(AgentReply::Decision(decision)) => {
                self.ctx.last_fingerprint = Some(current);
                if !request.legal_actions.contains(decision.action) {
                    log::warn!(
                        "Rejected {}: not among offered {:?}",
                        decision.action,
                        request.legal_actions.to_vec()
                    );
                    return Ok(TickOutcome::NoDecision(NoDecision::NotOffered(
                        decision.action,
                    )));
                }
                self.ctx.pending = Some(decision);
                self.ctx.phase = LoopPhase::DecisionPending;
                self.apply_pending(host)
            }
            Err(e) if e.is_fatal() => {
                log::error!("Transport failed: {}", e);
                Err(LoopError::Transport(e))
            }
            Err(TransportError::NotReady { path, source }) => {
                log::debug!("Agent not ready on {}: {}", path.display(), source);
                Ok(TickOutcome::NoDecision(NoDecision::NotReady))
            }
            Err(TransportError::Timeout(after)) => {
                log::warn!("No decision within {:?}", after);
                Ok(TickOutcome::NoDecision(NoDecision::Timeout))
            }
            Err(TransportError::InvalidAction(code)) => {
                log::warn!("Rejected unknown action id {}", code);
                self.ctx.last_fingerprint = Some(current);
                Ok(TickOutcome::NoDecision(NoDecision::InvalidAction(code)))
            }
            Err(e) => {
                log::warn!("Undecodable reply: {}", e);
                self.ctx.last_fingerprint = Some(current);
                Ok(TickOutcome::NoDecision(NoDecision::Protocol))
            }
        }
    }

    /// Validate the pending decision against a fresh observation and apply it.
    fn apply_pending<H>(&mut self, host: &mut H) -> Result<TickOutcome, LoopError>
    where
        H: Observer + Effector,
    {
        let Some(decision) = self.ctx.pending.take() else {
            self.ctx.phase = LoopPhase::Idle;
            return Ok(TickOutcome::Unchanged);
        };
        let action = decision.action;

        // Effects may have landed since the start of the tick.
        let obs = host.observation();
        self.ctx.enter_state(obs.state);
        if !self.ctx.registry.is_available(action, &obs) {
            log::warn!(
                "Discarding stale decision {}: not legal in state {}",
                action,
                obs.state
            );
            self.ctx.discard();
            return Ok(TickOutcome::Discarded(action));
        }

        match host.execute(action, &decision.params) {
            Ok(()) => {
                self.ctx.registry.record_execution(action);
                self.ctx.retry_count = 0;
                self.ctx.phase = LoopPhase::Idle;
                log::info!("Executed {} {:?}", action, decision.params.indices);
                Ok(TickOutcome::Executed(action))
            }
            Err(e) => {
                self.ctx.retry_count += 1;
                self.ctx.last_fingerprint = None;
                let retries = self.ctx.retry_count;
                log::warn!("{} failed: {} (retry_count={})", action, e, retries);

                if self.max_retries.is_some_and(|max| retries > max) {
                    log::error!("Giving up on {} after {} failures", action, retries);
                    self.ctx.discard();
                    return Err(LoopError::RetryLimit { action, retries });
                }

                self.ctx.pending = Some(decision);
                self.ctx.phase = LoopPhase::Retrying;
                Ok(TickOutcome::ExecutionFailed {
                    action,
                    retry_count: retries,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ObservationBuilder, ScriptedHost, ScriptedTransport};

    fn looped(transport: ScriptedTransport) -> DecisionLoop<ScriptedTransport> {
        DecisionLoop::new(transport, &BridgeConfig::default())
    }

    fn selecting_hand() -> Observation {
        ObservationBuilder::selecting()
            .hands_left(4)
            .discards_left(3)
            .hand_size(8)
            .build()
    }

    fn with_selection(count: u32) -> Observation {
        ObservationBuilder::selecting()
            .hands_left(4)
            .discards_left(3)
            .hand_size(8)
            .selected(count)
            .build()
    }

    fn obs_in(state: StateId) -> Observation {
        ObservationBuilder::new().state(state).build()
    }

    #[test]
    fn test_clean_turn() {
        let transport = ScriptedTransport::new()
            .ready()
            .decision(ActionId::SelectChoice, ActionParams::with_indices(vec![1, 3]));
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(selecting_hand());

        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Handshake);
        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::Executed(ActionId::SelectChoice)
        );

        assert_eq!(lp.transport().requests().len(), 2);
        assert_eq!(
            host.calls(),
            &[(ActionId::SelectChoice, ActionParams::with_indices(vec![1, 3]))]
        );
        assert_eq!(lp.retry_count(), 0);
        assert_eq!(lp.phase(), LoopPhase::Idle);
        assert!(lp.context().pending().is_none());
    }

    #[test]
    fn test_handshake_resets_baseline() {
        let mut lp = looped(ScriptedTransport::new().ready());
        let mut host = ScriptedHost::new(selecting_hand());

        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Handshake);
        assert!(lp.context().pending().is_none());
        assert!(lp.context().last_fingerprint().is_none());

        // Same observation, but the baseline is unset so the loop asks again.
        lp.tick(&mut host).unwrap();
        assert_eq!(lp.transport().requests().len(), 2);
    }

    #[test]
    fn test_unchanged_fingerprint_idles() {
        let transport =
            ScriptedTransport::new().error(TransportError::Protocol("garbage".into()));
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(selecting_hand());

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::NoDecision(NoDecision::Protocol)
        );
        for _ in 0..3 {
            assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Unchanged);
        }
        assert_eq!(lp.transport().requests().len(), 1);

        // A real change triggers a new request.
        host.set_observation(with_selection(2));
        lp.tick(&mut host).unwrap();
        assert_eq!(lp.transport().requests().len(), 2);
    }

    #[test]
    fn test_invalid_action_waits_for_change() {
        let transport = ScriptedTransport::new().error(TransportError::InvalidAction(99));
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(selecting_hand());

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::NoDecision(NoDecision::InvalidAction(99))
        );
        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Unchanged);
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_unoffered_decision_waits_for_change() {
        // Only SelectChoice is legal, the agent keeps answering CommitChoice.
        let mut transport = ScriptedTransport::new();
        for _ in 0..6 {
            transport.push_decision(ActionId::CommitChoice, ActionParams::default());
        }
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(selecting_hand());

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::NoDecision(NoDecision::NotOffered(ActionId::CommitChoice))
        );
        for _ in 0..5 {
            assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Unchanged);
        }

        assert_eq!(lp.transport().requests().len(), 1);
        assert!(host.calls().is_empty());
        assert_eq!(lp.retry_count(), 0);
        assert!(lp.context().pending().is_none());
        assert_eq!(lp.phase(), LoopPhase::Idle);
    }

    #[test]
    fn test_unoffered_decision_keeps_retry_count() {
        let transport = ScriptedTransport::new()
            .decision(ActionId::CommitChoice, ActionParams::default())
            .decision(ActionId::LeaveShop, ActionParams::default());
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(with_selection(2));
        host.fail_next("hand rejected");

        assert!(matches!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::ExecutionFailed { retry_count: 1, .. }
        ));
        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::NoDecision(NoDecision::NotOffered(ActionId::LeaveShop))
        );
        assert_eq!(lp.retry_count(), 1);
        assert!(lp.context().pending().is_none());
        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Unchanged);

        let requests = lp.transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].retry_count, 1);
        assert_eq!(host.calls().len(), 1);
    }

    #[test]
    fn test_timeout_re_requests_same_fingerprint() {
        // Script is empty, so every request times out.
        let mut lp = looped(ScriptedTransport::new());
        let mut host = ScriptedHost::new(selecting_hand());

        for expected in 1..=3 {
            assert_eq!(
                lp.tick(&mut host).unwrap(),
                TickOutcome::NoDecision(NoDecision::Timeout)
            );
            assert_eq!(lp.transport().requests().len(), expected);
            assert!(lp.context().pending().is_none());
            assert_eq!(lp.phase(), LoopPhase::Idle);
        }
        assert_eq!(lp.retry_count(), 0);
    }

    #[test]
    fn test_not_ready_is_retried_next_tick() {
        let not_ready = TransportError::NotReady {
            path: "/tmp/missing".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let transport = ScriptedTransport::new().error(not_ready).ready();
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(selecting_hand());

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::NoDecision(NoDecision::NotReady)
        );
        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Handshake);
    }

    #[test]
    fn test_fatal_transport_error_surfaces() {
        let mut lp = looped(ScriptedTransport::new().error(TransportError::Disconnected));
        let mut host = ScriptedHost::new(selecting_hand());

        let err = lp.tick(&mut host).unwrap_err();
        assert!(matches!(err, LoopError::Transport(TransportError::Disconnected)));
        assert_eq!(lp.phase(), LoopPhase::Idle);
    }

    #[test]
    fn test_stale_decision_in_same_tick_is_not_executed() {
        // The selection is cleared between the request and validation.
        let transport =
            ScriptedTransport::new().decision(ActionId::CommitChoice, ActionParams::default());
        let mut lp = looped(transport);
        let mut host = ScriptedHost::default();
        host.then_observe(with_selection(2));
        host.then_observe(with_selection(0));

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::Discarded(ActionId::CommitChoice)
        );
        assert!(host.calls().is_empty());
        assert_eq!(lp.retry_count(), 0);
        assert!(lp.context().last_fingerprint().is_none());
    }

    #[test]
    fn test_retry_accounting() {
        let transport = ScriptedTransport::new()
            .decision(ActionId::CommitChoice, ActionParams::default())
            .decision(ActionId::CommitChoice, ActionParams::default());
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(with_selection(2));
        host.fail_next("hand rejected");

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::ExecutionFailed {
                action: ActionId::CommitChoice,
                retry_count: 1
            }
        );
        assert_eq!(lp.phase(), LoopPhase::Retrying);
        assert!(lp.context().pending().is_some());

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::Executed(ActionId::CommitChoice)
        );
        let requests = lp.transport().requests();
        assert_eq!(requests[0].retry_count, 0);
        assert_eq!(requests[1].retry_count, 1);
        assert_eq!(lp.retry_count(), 0);
        assert_eq!(host.calls().len(), 2);
    }

    #[test]
    fn test_stale_retry_is_discarded() {
        let transport =
            ScriptedTransport::new().decision(ActionId::CommitChoice, ActionParams::default());
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(with_selection(2));
        host.fail_next("hand rejected");

        lp.tick(&mut host).unwrap();
        assert_eq!(lp.retry_count(), 1);

        // The world moved on before the retry.
        host.set_observation(obs_in(StateId::SHOP));
        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::Discarded(ActionId::CommitChoice)
        );
        assert_eq!(lp.retry_count(), 0);
        assert!(lp.context().pending().is_none());
        assert_eq!(lp.transport().requests().len(), 1);
        assert_eq!(host.calls().len(), 1);
    }

    #[test]
    fn test_at_most_one_request_per_tick() {
        let mut transport = ScriptedTransport::new().ready();
        for _ in 0..4 {
            transport.push_decision(ActionId::DiscardChoice, ActionParams::default());
        }
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(with_selection(3));
        host.fail_next("busy");
        host.fail_next("busy");

        let mut previous = 0;
        for _ in 0..8 {
            let _ = lp.tick(&mut host).unwrap();
            let sent = lp.transport().requests().len();
            assert!(sent - previous <= 1);
            previous = sent;
        }
    }

    #[test]
    fn test_retry_limit_escalates() {
        let config = BridgeConfig {
            max_retries: Some(1),
            ..Default::default()
        };
        let transport = ScriptedTransport::new()
            .decision(ActionId::CommitChoice, ActionParams::default())
            .decision(ActionId::CommitChoice, ActionParams::default());
        let mut lp = DecisionLoop::new(transport, &config);
        let mut host = ScriptedHost::new(with_selection(1));
        host.fail_next("no");
        host.fail_next("still no");

        assert!(matches!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::ExecutionFailed { retry_count: 1, .. }
        ));
        let err = lp.tick(&mut host).unwrap_err();
        assert!(matches!(
            err,
            LoopError::RetryLimit {
                action: ActionId::CommitChoice,
                retries: 2
            }
        ));
        assert!(lp.context().pending().is_none());
        assert_eq!(lp.retry_count(), 0);
    }

    #[test]
    fn test_forced_structural_step() {
        let mut lp = looped(ScriptedTransport::new());
        let mut host = ScriptedHost::new(obs_in(StateId::MENU));
        host.on_success(ActionId::StartEpisode, obs_in(StateId::STAGE_SELECT));

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::AutoSkipped(ActionId::StartEpisode)
        );
        assert!(lp.transport().requests().is_empty());
        assert!(lp.context().last_fingerprint().is_none());

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::AutoSkipped(ActionId::SelectStage)
        );
        assert!(lp.transport().requests().is_empty());
    }

    #[test]
    fn test_core_decision_is_never_skipped() {
        let mut lp = looped(ScriptedTransport::new());
        let mut host = ScriptedHost::new(selecting_hand());

        lp.tick(&mut host).unwrap();
        let requests = lp.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].legal_actions.to_vec(), vec![ActionId::SelectChoice]);
    }

    #[test]
    fn test_auto_skip_can_be_turned_off() {
        let config = BridgeConfig {
            auto_skip: false,
            ..Default::default()
        };
        let mut lp = DecisionLoop::new(ScriptedTransport::new().ready(), &config);
        let mut host = ScriptedHost::new(obs_in(StateId::MENU));

        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Handshake);
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_markers_reset_on_state_change() {
        let mut lp = looped(ScriptedTransport::new());
        let mut host = ScriptedHost::new(obs_in(StateId::MENU));

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::AutoSkipped(ActionId::StartEpisode)
        );
        // Simulation ignored the action: the marker keeps it from firing twice.
        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::NoLegalActions);

        host.set_observation(obs_in(StateId::GAME_OVER));
        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::AutoSkipped(ActionId::RestartEpisode)
        );
        host.set_observation(obs_in(StateId::MENU));
        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::AutoSkipped(ActionId::StartEpisode)
        );
        assert_eq!(host.calls().len(), 3);
    }

    #[test]
    fn test_auto_skip_failure_retries_next_tick() {
        let mut lp = looped(ScriptedTransport::new());
        let mut host = ScriptedHost::new(obs_in(StateId::SHOP));
        host.fail_next("button not ready");

        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::AutoSkipFailed(ActionId::LeaveShop)
        );
        assert_eq!(
            lp.tick(&mut host).unwrap(),
            TickOutcome::AutoSkipped(ActionId::LeaveShop)
        );
        assert_eq!(lp.retry_count(), 0);
    }

    #[test]
    fn test_disable_and_enable() {
        let transport = ScriptedTransport::new()
            .decision(ActionId::CommitChoice, ActionParams::default())
            .ready();
        let mut lp = looped(transport);
        let mut host = ScriptedHost::new(with_selection(2));
        host.fail_next("nope");

        lp.tick(&mut host).unwrap();
        assert!(lp.context().pending().is_some());

        lp.disable();
        assert!(!lp.is_enabled());
        assert!(lp.context().pending().is_none());
        assert!(lp.context().last_fingerprint().is_none());
        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Disabled);
        assert_eq!(lp.transport().requests().len(), 1);

        lp.enable();
        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Handshake);
        assert_eq!(lp.transport().requests()[1].retry_count, 0);
    }

    #[test]
    fn test_start_disabled() {
        let config = BridgeConfig {
            start_enabled: false,
            ..Default::default()
        };
        let mut lp = DecisionLoop::new(ScriptedTransport::new(), &config);
        let mut host = ScriptedHost::new(obs_in(StateId::MENU));
        assert_eq!(lp.tick(&mut host).unwrap(), TickOutcome::Disabled);
        assert!(host.calls().is_empty());
        assert_eq!(lp.ticks(), 1);
    }

    #[test]
    fn test_independent_loops_do_not_share_state() {
        let mut a = looped(ScriptedTransport::new());
        let mut b = looped(ScriptedTransport::new());
        let mut host = ScriptedHost::new(obs_in(StateId::MENU));

        a.tick(&mut host).unwrap();
        assert!(a.context().registry().is_marked(ActionId::StartEpisode));
        assert!(!b.context().registry().is_marked(ActionId::StartEpisode));
        assert_eq!(
            b.tick(&mut host).unwrap(),
            TickOutcome::AutoSkipped(ActionId::StartEpisode)
        );
    }
}
