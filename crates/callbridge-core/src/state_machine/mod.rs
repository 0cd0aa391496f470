//! The per-call state machine (§4.4). The machine is hierarchical in the
//! spec's own words — `init` picks a direction, then one of two region
//! transition tables runs to completion — which this module expresses as a
//! flat `State` enum plus one `match` per region, rather than a generic
//! table-driven DSL: §9's design notes call a "naive nested switches"
//! implementation acceptable provided the three terminal transitions stay
//! reachable from every non-terminal state of each region, which the match
//! arms below do via a shared prelude check.

mod actions;
pub mod guards;
mod resolver;

use callbridge_pvp::{PvpCallState, PvpEvent};
use callbridge_ssp::{SspCallState, SspEvent};

use crate::cache::Cache;
use crate::config::DispatcherConfig;
use crate::context::CallContext;
use crate::error::{ActionError, StatusCode};
use crate::event::{Event, InternalError};
use crate::rate_limit::RateLimitGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    FromPvpSspWaitMedia,
    FromPvpWaitPvp,
    FromPvpWaitDtmf,
    FromSspSspWaitConfirm,
    FromSspWaitPvp,
    FromSspSspWaitMedia,
    FromSspWaitDtmf,
    Terminal,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Terminal)
    }

    fn is_from_pvp_region(&self) -> bool {
        matches!(
            self,
            State::FromPvpSspWaitMedia | State::FromPvpWaitPvp | State::FromPvpWaitDtmf
        )
    }

    fn is_from_ssp_region(&self) -> bool {
        matches!(
            self,
            State::FromSspSspWaitConfirm
                | State::FromSspWaitPvp
                | State::FromSspSspWaitMedia
                | State::FromSspWaitDtmf
        )
    }
}

/// Collaborator handles an action needs. Borrowed for the duration of one
/// `advance` call; the dispatcher owns the concrete `Arc`s.
pub struct Collaborators<'a> {
    pub pvp: &'a dyn callbridge_pvp::PvpClient,
    pub ssp: &'a dyn callbridge_ssp::SspClient,
}

/// One per-call instance. Wraps a `CallContext` with its current `State`;
/// `advance` is the only way the state changes.
pub struct CallMachine {
    pub ctx: CallContext,
    pub state: State,
}

impl CallMachine {
    pub fn new() -> Self {
        Self {
            ctx: CallContext::new(),
            state: State::Init,
        }
    }

    /// Applies one event, running whatever action the transition attaches.
    /// A synchronous action failure is reported back via `emit_internal`
    /// rather than returned — the caller (the dispatcher) pushes it onto the
    /// internal queue and it is delivered to this same context next tick.
    pub fn advance(
        &mut self,
        event: &Event,
        collaborators: &Collaborators<'_>,
        config: &DispatcherConfig,
        cache: &mut Cache,
        rate_limit: &mut RateLimitGate,
        emit_internal: &mut dyn FnMut(InternalError),
    ) {
        let from_state = self.state;
        let mut fail = |ctx_id: &str, err: ActionError, emit: &mut dyn FnMut(InternalError)| {
            tracing::warn!(ctx_id, status = %err.status_code, reason = %err.reason, "action failed");
            emit(InternalError::new(ctx_id, err));
        };

        let next = match (self.state, event) {
            // --- InternalError reaches X from anywhere non-terminal. ---
            (s, Event::Internal(e)) if !s.is_terminal() => {
                actions::set_hangup_prm(&mut self.ctx, e.error.status_code, &e.error.reason);
                Some(State::Terminal)
            }

            // --- init ---
            (State::Init, Event::Pvp(PvpEvent::CallUpdate(u)))
                if guards::is_incoming(u) && guards::is_in_state(u, PvpCallState::Pending) =>
            {
                actions::store_tg_id(&mut self.ctx, u);
                if guards::callback_uri_is_set(&config.callback_uri) {
                    actions::store_tg_user_id(&mut self.ctx, u.user_id);
                    match actions::dial_sip(
                        &mut self.ctx,
                        collaborators.pvp,
                        collaborators.ssp,
                        &config.callback_uri,
                    ) {
                        Ok(()) => Some(State::FromPvpSspWaitMedia),
                        Err(e) => {
                            fail(self.ctx.id(), e, emit_internal);
                            None
                        }
                    }
                } else {
                    Some(State::Terminal)
                }
            }
            (State::Init, Event::Pvp(_)) => Some(State::Terminal),
            (State::Init, Event::Ssp(SspEvent::Incoming(incoming))) => {
                actions::store_sip_id(&mut self.ctx, incoming.call_id);
                match actions::accept_incoming_sip(
                    &mut self.ctx,
                    collaborators.ssp,
                    &incoming.extension,
                ) {
                    Ok(()) => Some(State::FromSspSspWaitConfirm),
                    Err(e) => {
                        fail(self.ctx.id(), e, emit_internal);
                        None
                    }
                }
            }
            (State::Init, Event::Ssp(_)) => Some(State::Terminal),

            // --- fromPvp region ---
            (State::FromPvpSspWaitMedia, Event::Ssp(SspEvent::MediaStateUpdate(m)))
                if guards::is_media_ready(m.has_media) =>
            {
                match actions::answer_tg(&self.ctx, collaborators.pvp, config.udp_p2p, config.udp_reflector) {
                    Ok(()) => Some(State::FromPvpWaitPvp),
                    Err(e) => {
                        fail(self.ctx.id(), e, emit_internal);
                        None
                    }
                }
            }
            (State::FromPvpWaitPvp, Event::Pvp(PvpEvent::CallUpdate(u)))
                if guards::is_in_state(u, PvpCallState::Ready) =>
            {
                actions::store_tg_id(&mut self.ctx, u);
                match actions::create_tg_voip(&mut self.ctx, collaborators.pvp, config, u)
                    .and_then(|()| actions::bridge_audio(&self.ctx, collaborators.ssp))
                {
                    Ok(()) => Some(State::FromPvpWaitDtmf),
                    Err(e) => {
                        fail(self.ctx.id(), e, emit_internal);
                        None
                    }
                }
            }
            (State::FromPvpWaitDtmf, Event::Pvp(PvpEvent::TextMessage(m)))
                if guards::is_text_content(&m.text) && guards::is_dtmf_string(&m.text) =>
            {
                match actions::dial_dtmf(&self.ctx, collaborators.ssp, &m.text) {
                    Ok(()) => Some(State::FromPvpWaitDtmf),
                    Err(e) => {
                        fail(self.ctx.id(), e, emit_internal);
                        None
                    }
                }
            }
            (State::FromPvpWaitDtmf, Event::Pvp(PvpEvent::TextMessage(_))) => {
                Some(State::FromPvpWaitDtmf)
            }
            (s, Event::Pvp(PvpEvent::CallUpdate(u)))
                if s.is_from_pvp_region()
                    && (guards::is_in_state(u, PvpCallState::Discarded)
                        || guards::is_in_state(u, PvpCallState::Error)) =>
            {
                actions::clean_tg_id(&mut self.ctx);
                Some(State::Terminal)
            }
            (s, Event::Ssp(SspEvent::CallStateUpdate(u)))
                if s.is_from_pvp_region() && guards::is_sip_in_state(u, SspCallState::Disconnected) =>
            {
                actions::clean_sip_id(&mut self.ctx);
                Some(State::Terminal)
            }

            // --- fromSsp region ---
            (State::FromSspSspWaitConfirm, Event::Ssp(SspEvent::CallStateUpdate(u)))
                if guards::is_sip_in_state(u, SspCallState::Early) =>
            {
                match actions::dial_tg(&mut self.ctx, collaborators.pvp, config, cache, rate_limit) {
                    Ok(()) => Some(State::FromSspWaitPvp),
                    Err(e) => {
                        fail(self.ctx.id(), e, emit_internal);
                        None
                    }
                }
            }
            (State::FromSspWaitPvp, Event::Pvp(PvpEvent::CallUpdate(u)))
                if guards::is_in_state(u, PvpCallState::Ready) =>
            {
                actions::store_tg_user_id(&mut self.ctx, u.user_id);
                match actions::create_tg_voip(&mut self.ctx, collaborators.pvp, config, u)
                    .and_then(|()| actions::answer_sip(&self.ctx, collaborators.ssp))
                {
                    Ok(()) => Some(State::FromSspSspWaitMedia),
                    Err(e) => {
                        fail(self.ctx.id(), e, emit_internal);
                        None
                    }
                }
            }
            (State::FromSspSspWaitMedia, Event::Ssp(SspEvent::MediaStateUpdate(m)))
                if guards::is_media_ready(m.has_media) =>
            {
                match actions::bridge_audio(&self.ctx, collaborators.ssp) {
                    Ok(()) => Some(State::FromSspWaitDtmf),
                    Err(e) => {
                        fail(self.ctx.id(), e, emit_internal);
                        None
                    }
                }
            }
            (State::FromSspWaitDtmf, Event::Pvp(PvpEvent::TextMessage(m)))
                if guards::is_text_content(&m.text) && guards::is_dtmf_string(&m.text) =>
            {
                match actions::dial_dtmf(&self.ctx, collaborators.ssp, &m.text) {
                    Ok(()) => Some(State::FromSspWaitDtmf),
                    Err(e) => {
                        fail(self.ctx.id(), e, emit_internal);
                        None
                    }
                }
            }
            (State::FromSspWaitDtmf, Event::Pvp(PvpEvent::TextMessage(_))) => {
                Some(State::FromSspWaitDtmf)
            }
            (s, Event::Pvp(PvpEvent::CallUpdate(u)))
                if s.is_from_ssp_region()
                    && (guards::is_in_state(u, PvpCallState::Discarded)
                        || guards::is_in_state(u, PvpCallState::Error)) =>
            {
                actions::clean_tg_id(&mut self.ctx);
                Some(State::Terminal)
            }
            (s, Event::Ssp(SspEvent::CallStateUpdate(u)))
                if s.is_from_ssp_region() && guards::is_sip_in_state(u, SspCallState::Disconnected) =>
            {
                actions::clean_sip_id(&mut self.ctx);
                Some(State::Terminal)
            }

            // No transition defined for this (state, event) pair: ignored.
            _ => None,
        };

        if let Some(next_state) = next {
            tracing::debug!(
                ctx_id = self.ctx.id(),
                ?from_state,
                ?next_state,
                "state transition"
            );
            self.state = next_state;
            if self.state.is_terminal() {
                actions::clean_up(&mut self.ctx, collaborators.pvp, collaborators.ssp);
            }
        }
    }
}

impl Default for CallMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbridge_pvp::fake::FakePvpClient;
    use callbridge_pvp::{PvpCallUpdate, PvpUser};
    use callbridge_ssp::fake::FakeSspClient;
    use callbridge_ssp::{SspCallStateUpdate, SspIncoming, SspMediaStateUpdate};
    use std::time::Duration;

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            callback_uri: "sip:pbx@host".to_string(),
            ..Default::default()
        }
    }

    fn gate() -> RateLimitGate {
        RateLimitGate::new(Duration::from_secs(30), Duration::from_secs(86_400))
    }

    #[test]
    fn ssp_originated_happy_path_reaches_wait_dtmf() {
        let pvp = FakePvpClient::new();
        pvp.add_public_chat(
            "alice",
            callbridge_pvp::PvpChat {
                user_id: 42,
                chat_type: callbridge_pvp::PvpChatType::Private,
            },
        );
        let ssp = FakeSspClient::new();
        let collaborators = Collaborators { pvp: &pvp, ssp: &ssp };
        let cfg = config();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut errors = Vec::new();
        let mut emit = |e: InternalError| errors.push(e);

        let mut machine = CallMachine::new();
        machine.advance(
            &Event::Ssp(SspEvent::Incoming(SspIncoming {
                call_id: 1,
                extension: "tg#alice".to_string(),
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::FromSspSspWaitConfirm);
        assert_eq!(ssp.answers()[0].status.code, 180);

        machine.advance(
            &Event::Ssp(SspEvent::CallStateUpdate(SspCallStateUpdate {
                call_id: 1,
                state: SspCallState::Early,
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::FromSspWaitPvp);
        assert_eq!(pvp.created_calls()[0].0, 42);

        machine.advance(
            &Event::Pvp(PvpEvent::CallUpdate(PvpCallUpdate {
                call_id: machine.ctx.pvp_call_id,
                is_incoming: false,
                state: PvpCallState::Ready,
                user_id: 42,
                voip_params: Some(callbridge_pvp::VoipConnectionParams {
                    encryption_key: vec![0u8; 256],
                    relays: vec![],
                    max_layer: 92,
                }),
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::FromSspSspWaitMedia);
        assert_eq!(ssp.answers()[1].status.code, 200);

        machine.advance(
            &Event::Ssp(SspEvent::MediaStateUpdate(SspMediaStateUpdate {
                call_id: 1,
                has_media: true,
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::FromSspWaitDtmf);
        assert_eq!(ssp.bridges(), vec![1]);
        assert!(errors.is_empty());
    }

    #[test]
    fn pvp_originated_happy_path() {
        let pvp = FakePvpClient::new();
        pvp.add_user(PvpUser {
            id: 7,
            username: String::new(),
            phone: String::new(),
            first_name: "Bob".to_string(),
            last_name: String::new(),
            have_access: true,
        });
        let ssp = FakeSspClient::new();
        let collaborators = Collaborators { pvp: &pvp, ssp: &ssp };
        let cfg = config();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut errors = Vec::new();
        let mut emit = |e: InternalError| errors.push(e);

        let mut machine = CallMachine::new();
        machine.advance(
            &Event::Pvp(PvpEvent::CallUpdate(PvpCallUpdate {
                call_id: 55,
                is_incoming: true,
                state: PvpCallState::Pending,
                user_id: 7,
                voip_params: None,
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::FromPvpSspWaitMedia);
        assert_eq!(ssp.dials()[0].headers.tg_id, "7");
        assert_eq!(ssp.dials()[0].headers.tg_first_name.as_deref(), Some("Bob"));

        machine.advance(
            &Event::Ssp(SspEvent::MediaStateUpdate(SspMediaStateUpdate {
                call_id: ssp.answers().len() as i32, // unused value, media keyed by ssp_call_id internally
                has_media: true,
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::FromPvpWaitPvp);
        assert_eq!(pvp.accepted_calls().len(), 1);

        machine.advance(
            &Event::Pvp(PvpEvent::CallUpdate(PvpCallUpdate {
                call_id: 55,
                is_incoming: true,
                state: PvpCallState::Ready,
                user_id: 7,
                voip_params: Some(callbridge_pvp::VoipConnectionParams {
                    encryption_key: vec![0u8; 256],
                    relays: vec![],
                    max_layer: 92,
                }),
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::FromPvpWaitDtmf);
        assert_eq!(ssp.bridges().len(), 1);
        assert!(errors.is_empty());
    }

    #[test]
    fn pvp_inbound_without_callback_uri_is_rejected() {
        let pvp = FakePvpClient::new();
        let ssp = FakeSspClient::new();
        let collaborators = Collaborators { pvp: &pvp, ssp: &ssp };
        let cfg = DispatcherConfig::default(); // callback_uri empty
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut errors = Vec::new();
        let mut emit = |e: InternalError| errors.push(e);

        let mut machine = CallMachine::new();
        machine.advance(
            &Event::Pvp(PvpEvent::CallUpdate(PvpCallUpdate {
                call_id: 1,
                is_incoming: true,
                state: PvpCallState::Pending,
                user_id: 1,
                voip_params: None,
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::Terminal);
        assert_eq!(ssp.dials().len(), 0);
    }

    #[test]
    fn invalid_extension_reaches_terminal_with_bad_extension() {
        let pvp = FakePvpClient::new();
        let ssp = FakeSspClient::new();
        let collaborators = Collaborators { pvp: &pvp, ssp: &ssp };
        let cfg = config();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut errors = Vec::new();
        let mut emit = |e: InternalError| errors.push(e);

        let mut machine = CallMachine::new();
        machine.advance(
            &Event::Ssp(SspEvent::Incoming(SspIncoming {
                call_id: 9,
                extension: "???".to_string(),
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        // the action failed synchronously, so the machine stays put and an
        // InternalError has been emitted for the dispatcher to deliver next tick
        assert_eq!(machine.state, State::Init);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error.status_code, StatusCode::BadExtension);

        machine.advance(
            &Event::Internal(errors.remove(0)),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::Terminal);
        assert_eq!(ssp.hangups()[0].status.code, 420);
        assert_eq!(pvp.created_calls().len(), 0);
    }

    #[test]
    fn dtmf_passthrough_matches_regex_only() {
        let pvp = FakePvpClient::new();
        let ssp = FakeSspClient::new();
        let collaborators = Collaborators { pvp: &pvp, ssp: &ssp };
        let cfg = config();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut errors = Vec::new();
        let mut emit = |e: InternalError| errors.push(e);

        let mut machine = CallMachine::new();
        machine.state = State::FromPvpWaitDtmf;
        machine.ctx.ssp_call_id = 3;

        machine.advance(
            &Event::Pvp(PvpEvent::TextMessage(callbridge_pvp::PvpTextMessage {
                sender_user_id: 1,
                text: "123".to_string(),
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(ssp.dtmf_sent(), vec![(3, "123".to_string())]);

        machine.advance(
            &Event::Pvp(PvpEvent::TextMessage(callbridge_pvp::PvpTextMessage {
                sender_user_id: 1,
                text: "not dtmf!".to_string(),
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(ssp.dtmf_sent().len(), 1);
        assert_eq!(machine.state, State::FromPvpWaitDtmf);
    }

    #[test]
    fn symmetric_disconnect_from_either_side_reaches_terminal() {
        let pvp = FakePvpClient::new();
        let ssp = FakeSspClient::new();
        let collaborators = Collaborators { pvp: &pvp, ssp: &ssp };
        let cfg = config();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut emit = |_e: InternalError| {};

        let mut machine = CallMachine::new();
        machine.state = State::FromPvpWaitDtmf;
        machine.advance(
            &Event::Ssp(SspEvent::CallStateUpdate(SspCallStateUpdate {
                call_id: 1,
                state: SspCallState::Disconnected,
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::Terminal);

        let mut machine2 = CallMachine::new();
        machine2.state = State::FromSspWaitDtmf;
        machine2.advance(
            &Event::Pvp(PvpEvent::CallUpdate(PvpCallUpdate {
                call_id: 1,
                is_incoming: false,
                state: PvpCallState::Discarded,
                user_id: 1,
                voip_params: None,
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine2.state, State::Terminal);
    }

    #[test]
    fn cleanup_runs_exactly_once_on_back_to_back_terminal_events() {
        let pvp = FakePvpClient::new();
        let ssp = FakeSspClient::new();
        let collaborators = Collaborators { pvp: &pvp, ssp: &ssp };
        let cfg = config();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut emit = |_e: InternalError| {};

        let mut machine = CallMachine::new();
        machine.state = State::FromPvpWaitDtmf;
        machine.ctx.pvp_call_id = 5;
        machine.ctx.ssp_call_id = 9;

        machine.advance(
            &Event::Internal(InternalError::new(
                machine.ctx.id().to_string(),
                ActionError::internal("boom"),
            )),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(machine.state, State::Terminal);
        assert_eq!(pvp.discarded_calls().len(), 1);
        assert_eq!(ssp.hangups().len(), 1);

        // A second terminal-bound event after already-terminal does nothing:
        // the dispatcher would have destroyed this context already, but the
        // machine itself must not re-run CleanUp if asked to.
        machine.advance(
            &Event::Pvp(PvpEvent::CallUpdate(PvpCallUpdate {
                call_id: 5,
                is_incoming: false,
                state: PvpCallState::Discarded,
                user_id: 1,
                voip_params: None,
            })),
            &collaborators,
            &cfg,
            &mut cache,
            &mut rl,
            &mut emit,
        );
        assert_eq!(pvp.discarded_calls().len(), 1);
        assert_eq!(ssp.hangups().len(), 1);
    }
}
