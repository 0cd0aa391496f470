use std::time::Duration;

use callbridge_pvp::Socks5Proxy;

/// The slice of `settings.ini` the dispatcher and its actions actually
/// consult. Built by `callbridge-config` from the full `GatewaySettings` and
/// handed to the dispatcher at startup; kept here rather than in the config
/// crate so `callbridge-core` has no dependency on the INI loader (the config
/// crate depends on `callbridge-core`, not the other way around).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Empty ⇒ SSP-originated calls only; PVP-originated calls are rejected
    /// (§6, `init`'s second PVP transition).
    pub callback_uri: String,
    pub udp_p2p: bool,
    pub udp_reflector: bool,
    pub voip: VoipStaticConfig,
    pub extra_wait: Duration,
    pub peer_flood: Duration,
}

/// The static (non-per-call) half of `CreateTgVoipParams` (§4.4 `CreateTgVoip`).
#[derive(Debug, Clone)]
pub struct VoipStaticConfig {
    pub data_saving: bool,
    pub aec_enabled: bool,
    pub ns_enabled: bool,
    pub agc_enabled: bool,
    pub proxy: Option<Socks5Proxy>,
    pub init_timeout_ms: u32,
    pub recv_timeout_ms: u32,
}

impl Default for VoipStaticConfig {
    fn default() -> Self {
        Self {
            data_saving: false,
            aec_enabled: false,
            ns_enabled: false,
            agc_enabled: false,
            proxy: None,
            init_timeout_ms: 3000,
            recv_timeout_ms: 3000,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            callback_uri: String::new(),
            udp_p2p: false,
            udp_reflector: true,
            voip: VoipStaticConfig::default(),
            extra_wait: Duration::from_secs(30),
            peer_flood: Duration::from_secs(86_400),
        }
    }
}
