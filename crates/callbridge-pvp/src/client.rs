use std::sync::Arc;
use std::thread::ThreadId;

use crate::types::{
    CallParams, CreateTgVoipParams, PvpCallId, PvpChat, PvpUser, PvpUserId,
};

/// Controller handle returned once a call has reached `Ready`. Owned jointly
/// by the `CallContext` and the adapter; destroyed when both release it.
pub trait PvpController: Send + Sync {
    fn start(&self);
    fn connect(&self);
    fn stop(&self);
    fn input_media(&self) -> crate::types::PvpAudioMedia;
    fn output_media(&self) -> crate::types::PvpAudioMedia;
}

/// Call-site contract over the PVP collaborator. Every method here is the
/// synchronous face of what the real collaborator implements as a
/// future-returning async query: the concrete adapter blocks the calling
/// (dispatcher) thread on the underlying future.
///
/// A query issued from the PVP worker's own callback thread would deadlock
/// waiting on itself; adapters must detect that with
/// [`ensure_not_worker_thread`] and return `Err` instead of blocking.
pub trait PvpClient: Send + Sync {
    fn worker_thread_id(&self) -> ThreadId;

    fn search_contacts(&self, query: &str, limit: i32) -> anyhow::Result<Vec<PvpUserId>>;
    fn get_user(&self, id: PvpUserId) -> anyhow::Result<PvpUser>;
    fn import_contacts(&self, phone: &str) -> anyhow::Result<PvpUserId>;
    fn search_public_chat(&self, username: &str) -> anyhow::Result<PvpChat>;
    fn create_call(&self, user_id: PvpUserId, params: CallParams) -> anyhow::Result<PvpCallId>;
    fn accept_call(&self, call_id: PvpCallId, params: CallParams) -> anyhow::Result<()>;
    fn discard_call(
        &self,
        call_id: PvpCallId,
        is_disconnected: bool,
        duration: i32,
        connection_id: PvpCallId,
    ) -> anyhow::Result<()>;
    fn create_controller(
        &self,
        params: CreateTgVoipParams,
    ) -> anyhow::Result<Arc<dyn PvpController>>;

    /// Maximum protocol layer this library build supports; `CallParams.max_layer`
    /// is always populated from this, never hand-rolled by a caller (§4.4, §6).
    fn max_layer(&self) -> i32;
}

/// Deadlock-avoidance check mandated by the adapter contract: refuse rather
/// than block when the caller is the PVP worker thread itself.
pub fn ensure_not_worker_thread(worker: ThreadId) -> anyhow::Result<()> {
    if std::thread::current().id() == worker {
        anyhow::bail!("pvp query issued from the pvp worker's own thread would deadlock");
    }
    Ok(())
}
