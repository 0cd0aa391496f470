use std::net::{Ipv4Addr, Ipv6Addr};

/// Telegram-shaped user identity. 0 means "not yet known" everywhere in this
/// crate's callers, never a valid id.
pub type PvpUserId = i64;

/// Opaque handle returned by `create_call`/`accept_call`. 0 means absent.
pub type PvpCallId = i32;

pub const MIN_LAYER: i32 = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvpCallState {
    Pending,
    Ready,
    Discarded,
    Error,
}

#[derive(Debug, Clone)]
pub struct PvpUser {
    pub id: PvpUserId,
    pub username: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub have_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvpChatType {
    Private,
    Other,
}

#[derive(Debug, Clone)]
pub struct PvpChat {
    pub user_id: PvpUserId,
    pub chat_type: PvpChatType,
}

/// Call-creation/acceptance capability set offered to `createCall`/`acceptCall`.
#[derive(Debug, Clone, Copy)]
pub struct CallParams {
    pub udp_p2p: bool,
    pub udp_reflector: bool,
    pub min_layer: i32,
    pub max_layer: i32,
}

impl CallParams {
    pub fn new(udp_p2p: bool, udp_reflector: bool, max_layer: i32) -> Self {
        Self {
            udp_p2p,
            udp_reflector,
            min_layer: MIN_LAYER,
            max_layer,
        }
    }
}

/// One relay endpoint advertised for a call once its peer reports Ready.
#[derive(Debug, Clone)]
pub struct RelayEndpoint {
    pub peer_tag: [u8; 16],
    pub ipv4: Ipv4Addr,
    pub ipv6: Ipv6Addr,
    pub port: u16,
}

/// Connection parameters attached to a `PvpCallUpdate` once the peer reports
/// Ready: everything `CreateTgVoip` needs to stand the controller up.
#[derive(Debug, Clone)]
pub struct VoipConnectionParams {
    pub encryption_key: Vec<u8>,
    pub relays: Vec<RelayEndpoint>,
    pub max_layer: i32,
}

#[derive(Debug, Clone)]
pub struct PvpCallUpdate {
    pub call_id: PvpCallId,
    pub is_incoming: bool,
    pub state: PvpCallState,
    pub user_id: PvpUserId,
    pub voip_params: Option<VoipConnectionParams>,
}

#[derive(Debug, Clone)]
pub struct PvpTextMessage {
    pub sender_user_id: PvpUserId,
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum PvpEvent {
    CallUpdate(PvpCallUpdate),
    TextMessage(PvpTextMessage),
}

#[derive(Debug, Clone)]
pub struct Socks5Proxy {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Everything `CreateTgVoip` needs to build the controller, gathered from the
/// call's `VoipConnectionParams` plus the static settings (timeouts,
/// data-saving, AEC/NS/AGC, optional proxy).
#[derive(Debug, Clone)]
pub struct CreateTgVoipParams {
    pub connection: VoipConnectionParams,
    pub udp_p2p: bool,
    pub udp_reflector: bool,
    pub data_saving: bool,
    pub aec_enabled: bool,
    pub ns_enabled: bool,
    pub agc_enabled: bool,
    pub proxy: Option<Socks5Proxy>,
    pub init_timeout_ms: u32,
    pub recv_timeout_ms: u32,
}

/// Opaque audio endpoint handed to the SSP adapter's `bridge_audio`. The
/// concrete media object lives in the collaborator; this crate only moves a
/// reference to it around.
#[derive(Debug, Clone)]
pub struct PvpAudioMedia(pub String);
