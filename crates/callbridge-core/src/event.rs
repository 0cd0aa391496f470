use callbridge_pvp::{PvpCallId, PvpEvent, PvpUserId};
use callbridge_ssp::{SspCallId, SspEvent};

use crate::error::ActionError;

/// Tagged union carried across the three queues described in §3: PVP events,
/// SSP events, and internally-raised errors routed back to their own
/// context. The dispatcher is the only reader of all three.
#[derive(Debug, Clone)]
pub enum Event {
    Pvp(PvpEvent),
    Ssp(SspEvent),
    Internal(InternalError),
}

/// A synchronous action failure, re-injected onto the internal queue so it
/// is delivered to the same context on the dispatcher's next iteration
/// (§4.4 "Failure semantics").
#[derive(Debug, Clone)]
pub struct InternalError {
    pub ctx_id: String,
    pub error: ActionError,
}

impl InternalError {
    pub fn new(ctx_id: impl Into<String>, error: ActionError) -> Self {
        Self {
            ctx_id: ctx_id.into(),
            error,
        }
    }
}

/// The correlation key a given event carries, used by the dispatcher to find
/// (or create) the context it belongs to.
pub enum CorrelationKey {
    PvpCallId(PvpCallId),
    PvpSenderUserId(PvpUserId),
    SspCallId(SspCallId),
    CtxId(String),
}

impl Event {
    pub fn correlation_key(&self) -> CorrelationKey {
        match self {
            Event::Pvp(PvpEvent::CallUpdate(u)) => CorrelationKey::PvpCallId(u.call_id),
            Event::Pvp(PvpEvent::TextMessage(m)) => CorrelationKey::PvpSenderUserId(m.sender_user_id),
            Event::Ssp(SspEvent::Incoming(i)) => CorrelationKey::SspCallId(i.call_id),
            Event::Ssp(SspEvent::CallStateUpdate(u)) => CorrelationKey::SspCallId(u.call_id),
            Event::Ssp(SspEvent::MediaStateUpdate(u)) => CorrelationKey::SspCallId(u.call_id),
            Event::Internal(e) => CorrelationKey::CtxId(e.ctx_id.clone()),
        }
    }
}
