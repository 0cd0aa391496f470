//! Call-site contract over the PVP (peer-to-peer encrypted VoIP) collaborator:
//! event types carried on the PVP queue, the synchronous-looking client trait
//! whose real implementation is future-returning, and an in-memory fake for
//! tests.

mod client;
mod types;

pub mod fake;

pub use client::{ensure_not_worker_thread, PvpClient, PvpController};
pub use types::{
    CallParams, CreateTgVoipParams, PvpAudioMedia, PvpCallId, PvpCallState, PvpCallUpdate,
    PvpChat, PvpChatType, PvpEvent, PvpTextMessage, PvpUser, PvpUserId, RelayEndpoint,
    Socks5Proxy, VoipConnectionParams, MIN_LAYER,
};
