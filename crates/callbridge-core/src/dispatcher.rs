//! The single control loop (§4.6): drains the three event sources in turn,
//! correlates each event to a call instance (creating one on first sighting),
//! advances its state machine, reaps terminated calls, and caps the tick
//! rate. Single-threaded by design so correlation is race-free and actions
//! can call blocking collaborator RPCs without a lock (§5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use callbridge_pvp::{PvpClient, PvpEvent, PvpUser};
use callbridge_ssp::{SspClient, SspEvent};

use crate::cache::Cache;
use crate::config::DispatcherConfig;
use crate::event::{CorrelationKey, Event, InternalError};
use crate::event_queue::EventQueue;
use crate::rate_limit::RateLimitGate;
use crate::state_machine::{CallMachine, Collaborators, State};

/// Lower bound on an iteration's wall-clock cost (§4.6 step 5).
const TICK_FLOOR: Duration = Duration::from_millis(10);

pub struct Dispatcher {
    pvp: Arc<dyn PvpClient>,
    ssp: Arc<dyn SspClient>,
    pvp_queue: Arc<EventQueue<PvpEvent>>,
    ssp_queue: Arc<EventQueue<SspEvent>>,
    internal_queue: EventQueue<InternalError>,
    config: DispatcherConfig,
    cache: Cache,
    rate_limit: RateLimitGate,
    contexts: Vec<CallMachine>,
    stop_flag: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        pvp: Arc<dyn PvpClient>,
        ssp: Arc<dyn SspClient>,
        pvp_queue: Arc<EventQueue<PvpEvent>>,
        ssp_queue: Arc<EventQueue<SspEvent>>,
        config: DispatcherConfig,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        let rate_limit = RateLimitGate::new(config.extra_wait, config.peer_flood);
        Self {
            pvp,
            ssp,
            pvp_queue,
            ssp_queue,
            internal_queue: EventQueue::new(),
            config,
            cache: Cache::new(),
            rate_limit,
            contexts: Vec::new(),
            stop_flag,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitGate) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Startup contact-cache load (§4.2): `searchContacts("", MAX_INT)` then
    /// a `getUser` fan-out, skipping (not aborting on) any user lacking
    /// `have_access` (§9, second open question).
    pub fn load_contact_cache(&mut self) -> anyhow::Result<()> {
        let ids = self.pvp.search_contacts("", i32::MAX)?;
        let mut users: Vec<PvpUser> = Vec::with_capacity(ids.len());
        for id in ids {
            match self.pvp.get_user(id) {
                Ok(user) => users.push(user),
                Err(e) => {
                    tracing::warn!(user_id = id, error = %e, "get_user failed during cache load, skipped");
                }
            }
        }
        self.cache.load_from_users(users);
        Ok(())
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            pvp: self.pvp.as_ref(),
            ssp: self.ssp.as_ref(),
        }
    }

    /// One iteration of §4.6's numbered steps; exposed separately from `run`
    /// so tests can single-step without a background producer thread.
    pub fn tick(&mut self) {
        let iteration_started = Instant::now();

        if let Some(err) = self.internal_queue.try_pop() {
            self.route_internal(err);
        }
        if let Some(event) = self.pvp_queue.try_pop() {
            self.route_pvp(event);
        }
        if let Some(event) = self.ssp_queue.try_pop() {
            self.route_ssp(event);
        }

        self.reap_terminated();

        let elapsed = iteration_started.elapsed();
        if elapsed < TICK_FLOOR {
            std::thread::sleep(TICK_FLOOR - elapsed);
        }
    }

    pub fn run(&mut self) {
        while !self.stop_flag.load(Ordering::SeqCst) {
            self.tick();
        }
    }

    /// Every routing path goes through `Event::correlation_key()` rather than
    /// re-deriving which id identifies a context — this is the single place
    /// that knows the rule in §4.1.
    fn route_internal(&mut self, err: InternalError) {
        let event = Event::Internal(err);
        let CorrelationKey::CtxId(ctx_id) = event.correlation_key() else {
            unreachable!("Event::Internal only yields a CtxId correlation key")
        };
        if let Some(idx) = self.contexts.iter().position(|m| m.ctx.id() == ctx_id) {
            self.advance_at(idx, event);
        }
    }

    fn route_pvp(&mut self, event: PvpEvent) {
        let event = Event::Pvp(event);
        match event.correlation_key() {
            CorrelationKey::PvpCallId(call_id) => {
                let idx = match self.contexts.iter().position(|m| m.ctx.pvp_call_id == call_id) {
                    Some(idx) => idx,
                    None => {
                        self.contexts.push(CallMachine::new());
                        tracing::info!(
                            ctx_id = self.contexts.last().unwrap().ctx.id(),
                            "new context created for unrecognised pvp call id"
                        );
                        self.contexts.len() - 1
                    }
                };
                self.advance_at(idx, event);
            }
            CorrelationKey::PvpSenderUserId(sender) => {
                let matches: Vec<usize> = self
                    .contexts
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| m.ctx.pvp_user_id == sender)
                    .map(|(i, _)| i)
                    .collect();
                match matches.as_slice() {
                    [] => {
                        tracing::debug!(sender_user_id = sender, "text message with no matching context, dropped");
                    }
                    [idx] => self.advance_at(*idx, event),
                    _ => {
                        tracing::warn!(
                            sender_user_id = sender,
                            candidates = matches.len(),
                            "ambiguous dtmf: multiple contexts share this sender, dropped"
                        );
                    }
                }
            }
            _ => unreachable!("Event::Pvp only yields PvpCallId/PvpSenderUserId correlation keys"),
        }
    }

    fn route_ssp(&mut self, event: SspEvent) {
        let is_incoming = matches!(event, SspEvent::Incoming(_));
        let event = Event::Ssp(event);
        let CorrelationKey::SspCallId(call_id) = event.correlation_key() else {
            unreachable!("Event::Ssp only yields an SspCallId correlation key")
        };
        let idx = match self.contexts.iter().position(|m| m.ctx.ssp_call_id == call_id) {
            Some(idx) => idx,
            None if is_incoming => {
                self.contexts.push(CallMachine::new());
                tracing::info!(
                    ctx_id = self.contexts.last().unwrap().ctx.id(),
                    "new context created for unrecognised ssp call id"
                );
                self.contexts.len() - 1
            }
            None => return,
        };
        self.advance_at(idx, event);
    }

    fn advance_at(&mut self, idx: usize, event: Event) {
        let Dispatcher {
            contexts,
            config,
            cache,
            rate_limit,
            internal_queue,
            pvp,
            ssp,
            ..
        } = self;
        let collaborators = Collaborators {
            pvp: pvp.as_ref(),
            ssp: ssp.as_ref(),
        };
        let mut emit = |e: InternalError| internal_queue.push(e);
        contexts[idx].advance(&event, &collaborators, config, cache, rate_limit, &mut emit);
    }

    fn reap_terminated(&mut self) {
        self.contexts.retain(|m| {
            let terminal = m.state.is_terminal();
            if terminal {
                tracing::info!(ctx_id = m.ctx.id(), "context reaped");
            }
            !terminal
        });
    }

    /// Number of live contexts. Exposed for tests driving the dispatcher
    /// end-to-end against fakes; not consulted by any production code path.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Current state of each live context, in creation order. Same caveat
    /// as `context_count`.
    pub fn states(&self) -> Vec<State> {
        self.contexts.iter().map(|m| m.state).collect()
    }
}
