use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use callbridge_pvp::{PvpCallId, PvpController, PvpUserId};
use callbridge_ssp::{SspCallId, SspStatus, SSP_CALL_ID_INVALID};

static NEXT_CTX_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Per-call correlation record (§3). Owned exclusively by the dispatcher;
/// mutated only by the action functions attached to its own state machine.
pub struct CallContext {
    id: String,
    pub ssp_call_id: SspCallId,
    pub pvp_call_id: PvpCallId,
    pub pvp_user_id: PvpUserId,
    pub ext_username: String,
    pub ext_phone: String,
    pub controller: Option<Arc<dyn PvpController>>,
    pub hangup_reason: Option<SspStatus>,
}

impl CallContext {
    pub fn new() -> Self {
        let counter = NEXT_CTX_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{}-{}", std::process::id(), counter),
            ssp_call_id: SSP_CALL_ID_INVALID,
            pvp_call_id: 0,
            pvp_user_id: 0,
            ext_username: String::new(),
            ext_phone: String::new(),
            controller: None,
            hangup_reason: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_no_correlation_yet() {
        let ctx = CallContext::new();
        assert_eq!(ctx.pvp_call_id, 0);
        assert_eq!(ctx.ssp_call_id, SSP_CALL_ID_INVALID);
        assert_eq!(ctx.pvp_user_id, 0);
    }

    #[test]
    fn ids_are_monotonically_distinct() {
        let a = CallContext::new();
        let b = CallContext::new();
        assert_ne!(a.id(), b.id());
    }
}
