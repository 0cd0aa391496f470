//! In-memory `PvpClient`/`PvpController` implementation used by integration
//! tests. Real TDLib/tgvoip connectivity is an out-of-scope external
//! collaborator (§1); `callbridge-gateway`'s default build also wires this
//! fake in as its loopback backend rather than fabricate FFI bindings no
//! reference crate in this workspace provides.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use crate::client::{ensure_not_worker_thread, PvpClient, PvpController};
use crate::types::{CallParams, CreateTgVoipParams, PvpCallId, PvpChat, PvpUser, PvpUserId};

#[derive(Default)]
struct Inner {
    users: HashMap<PvpUserId, PvpUser>,
    public_chats: HashMap<String, PvpChat>,
    phone_imports: HashMap<String, PvpUserId>,
    next_call_id: AtomicI32,
    created_calls: Vec<(PvpUserId, CallParams)>,
    accepted_calls: Vec<(PvpCallId, CallParams)>,
    discarded_calls: Vec<(PvpCallId, bool, i32, PvpCallId)>,
    /// queued `Err` for the next `create_call`, used to test rate-limit parsing
    next_create_call_error: Option<String>,
}

pub struct FakePvpClient {
    inner: Mutex<Inner>,
    worker_thread_id: ThreadId,
}

impl FakePvpClient {
    /// The default constructor pins `worker_thread_id` to a throwaway thread
    /// distinct from whatever thread calls into this fake, so ordinary
    /// single-threaded tests and the single-threaded dispatcher never trip
    /// the deadlock guard by accident. [`Self::with_worker_thread`] exists to
    /// deliberately construct the case that should trip it (§9, §12).
    pub fn new() -> Self {
        let worker_thread_id = std::thread::Builder::new()
            .spawn(std::thread::current)
            .expect("spawn throwaway thread for worker id")
            .join()
            .expect("throwaway thread should not panic")
            .id();
        Self {
            inner: Mutex::new(Inner {
                next_call_id: AtomicI32::new(1),
                ..Default::default()
            }),
            worker_thread_id,
        }
    }

    pub fn with_worker_thread(worker_thread_id: ThreadId) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_call_id: AtomicI32::new(1),
                ..Default::default()
            }),
            worker_thread_id,
        }
    }

    pub fn add_user(&self, user: PvpUser) {
        self.inner.lock().unwrap().users.insert(user.id, user);
    }

    pub fn add_public_chat(&self, username: &str, chat: PvpChat) {
        self.inner
            .lock()
            .unwrap()
            .public_chats
            .insert(username.to_string(), chat);
    }

    pub fn add_phone_import(&self, phone: &str, user_id: PvpUserId) {
        self.inner
            .lock()
            .unwrap()
            .phone_imports
            .insert(phone.to_string(), user_id);
    }

    pub fn queue_create_call_error(&self, message: &str) {
        self.inner.lock().unwrap().next_create_call_error = Some(message.to_string());
    }

    pub fn created_calls(&self) -> Vec<(PvpUserId, CallParams)> {
        self.inner.lock().unwrap().created_calls.clone()
    }

    pub fn accepted_calls(&self) -> Vec<(PvpCallId, CallParams)> {
        self.inner.lock().unwrap().accepted_calls.clone()
    }

    pub fn discarded_calls(&self) -> Vec<(PvpCallId, bool, i32, PvpCallId)> {
        self.inner.lock().unwrap().discarded_calls.clone()
    }
}

impl Default for FakePvpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PvpClient for FakePvpClient {
    fn worker_thread_id(&self) -> ThreadId {
        self.worker_thread_id
    }

    fn search_contacts(&self, _query: &str, _limit: i32) -> anyhow::Result<Vec<PvpUserId>> {
        ensure_not_worker_thread(self.worker_thread_id)?;
        Ok(self.inner.lock().unwrap().users.keys().copied().collect())
    }

    fn get_user(&self, id: PvpUserId) -> anyhow::Result<PvpUser> {
        ensure_not_worker_thread(self.worker_thread_id)?;
        self.inner
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("USER_NOT_FOUND; no such user {id}"))
    }

    fn import_contacts(&self, phone: &str) -> anyhow::Result<PvpUserId> {
        ensure_not_worker_thread(self.worker_thread_id)?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .phone_imports
            .get(phone)
            .copied()
            .unwrap_or(0))
    }

    fn search_public_chat(&self, username: &str) -> anyhow::Result<PvpChat> {
        ensure_not_worker_thread(self.worker_thread_id)?;
        self.inner
            .lock()
            .unwrap()
            .public_chats
            .get(username)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("USERNAME_NOT_OCCUPIED; no such chat {username}"))
    }

    fn create_call(&self, user_id: PvpUserId, params: CallParams) -> anyhow::Result<PvpCallId> {
        ensure_not_worker_thread(self.worker_thread_id)?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = inner.next_create_call_error.take() {
            return Err(anyhow::anyhow!(message));
        }
        let id = inner.next_call_id.fetch_add(1, Ordering::SeqCst);
        inner.created_calls.push((user_id, params));
        Ok(id)
    }

    fn accept_call(&self, call_id: PvpCallId, params: CallParams) -> anyhow::Result<()> {
        ensure_not_worker_thread(self.worker_thread_id)?;
        self.inner
            .lock()
            .unwrap()
            .accepted_calls
            .push((call_id, params));
        Ok(())
    }

    fn discard_call(
        &self,
        call_id: PvpCallId,
        is_disconnected: bool,
        duration: i32,
        connection_id: PvpCallId,
    ) -> anyhow::Result<()> {
        ensure_not_worker_thread(self.worker_thread_id)?;
        self.inner.lock().unwrap().discarded_calls.push((
            call_id,
            is_disconnected,
            duration,
            connection_id,
        ));
        Ok(())
    }

    fn create_controller(
        &self,
        params: CreateTgVoipParams,
    ) -> anyhow::Result<Arc<dyn PvpController>> {
        Ok(Arc::new(FakePvpController::new(params)))
    }

    fn max_layer(&self) -> i32 {
        92
    }
}

pub struct FakePvpController {
    params: CreateTgVoipParams,
    started: Mutex<bool>,
    connected: Mutex<bool>,
}

impl FakePvpController {
    fn new(params: CreateTgVoipParams) -> Self {
        Self {
            params,
            started: Mutex::new(false),
            connected: Mutex::new(false),
        }
    }

    pub fn is_started(&self) -> bool {
        *self.started.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }

    pub fn params(&self) -> &CreateTgVoipParams {
        &self.params
    }
}

impl PvpController for FakePvpController {
    fn start(&self) {
        *self.started.lock().unwrap() = true;
        tracing::debug!(target: "pvp::media", max_layer = self.params.connection.max_layer, "tgvoip controller started");
    }

    fn connect(&self) {
        *self.connected.lock().unwrap() = true;
        tracing::debug!(target: "pvp::media", "tgvoip controller connected");
    }

    fn stop(&self) {
        *self.started.lock().unwrap() = false;
        *self.connected.lock().unwrap() = false;
        tracing::debug!(target: "pvp::media", "tgvoip controller stopped");
    }

    fn input_media(&self) -> crate::types::PvpAudioMedia {
        crate::types::PvpAudioMedia("fake-pvp-audio-in".to_string())
    }

    fn output_media(&self) -> crate::types::PvpAudioMedia {
        crate::types::PvpAudioMedia("fake-pvp-audio-out".to_string())
    }
}
