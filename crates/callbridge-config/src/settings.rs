use callbridge_pvp::Socks5Proxy;

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub console_min_level: u8,
    pub file_min_level: u8,
    pub core: u8,
    pub pjsip: u8,
    pub sip_messages: bool,
    pub tdlib: u8,
    pub tgvoip: u8,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            console_min_level: 0,
            file_min_level: 0,
            core: 2,
            pjsip: 2,
            sip_messages: true,
            tdlib: 3,
            tgvoip: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SipSettings {
    pub port: u32,
    pub id_uri: String,
    pub callback_uri: String,
    pub public_address: String,
    pub stun_server: String,
    pub raw_pcm: bool,
    pub thread_count: u32,
    pub port_range: u32,
}

impl Default for SipSettings {
    fn default() -> Self {
        Self {
            port: 0,
            id_uri: "sip:localhost".to_string(),
            callback_uri: String::new(),
            public_address: String::new(),
            stun_server: String::new(),
            raw_pcm: true,
            thread_count: 1,
            port_range: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub api_id: i32,
    pub api_hash: String,
    pub database_folder: String,
    pub system_language_code: String,
    pub device_model: String,
    pub system_version: String,
    pub application_version: String,
    pub udp_p2p: bool,
    pub udp_reflector: bool,
    pub enable_aec: bool,
    pub enable_ns: bool,
    pub enable_agc: bool,
    pub use_proxy: bool,
    pub proxy_address: String,
    pub proxy_port: i32,
    pub proxy_username: String,
    pub proxy_password: String,
    pub use_voip_proxy: bool,
    pub voip_proxy_address: String,
    pub voip_proxy_port: u16,
    pub voip_proxy_username: String,
    pub voip_proxy_password: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            database_folder: String::new(),
            system_language_code: "en-US".to_string(),
            device_model: "PC".to_string(),
            system_version: "Linux".to_string(),
            application_version: "1.0".to_string(),
            udp_p2p: false,
            udp_reflector: true,
            enable_aec: false,
            enable_ns: false,
            enable_agc: false,
            use_proxy: false,
            proxy_address: String::new(),
            proxy_port: 0,
            proxy_username: String::new(),
            proxy_password: String::new(),
            use_voip_proxy: false,
            voip_proxy_address: String::new(),
            voip_proxy_port: 0,
            voip_proxy_username: String::new(),
            voip_proxy_password: String::new(),
        }
    }
}

impl TelegramSettings {
    /// `None` unless `use_voip_proxy` is set — this proxy applies only to
    /// the VoIP relay path (`CreateTgVoip`), distinct from `use_proxy`'s
    /// generic TDLib session proxy (§11).
    pub fn voip_proxy(&self) -> Option<Socks5Proxy> {
        if !self.use_voip_proxy {
            return None;
        }
        Some(Socks5Proxy {
            address: self.voip_proxy_address.clone(),
            port: self.voip_proxy_port,
            username: self.voip_proxy_username.clone(),
            password: self.voip_proxy_password.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct OtherSettings {
    pub extra_wait_time: u64,
    pub peer_flood_time: u64,
}

impl Default for OtherSettings {
    fn default() -> Self {
        Self {
            extra_wait_time: 30,
            peer_flood_time: 86_400,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewaySettings {
    pub logging: LoggingSettings,
    pub sip: SipSettings,
    pub telegram: TelegramSettings,
    pub other: OtherSettings,
}

impl GatewaySettings {
    /// Projects the dispatcher-relevant slice of these settings onto the
    /// core crate's `DispatcherConfig`, leaving `callbridge-core` with no
    /// dependency on the INI loader (§10.3).
    pub fn to_dispatcher_config(&self) -> callbridge_core::DispatcherConfig {
        callbridge_core::DispatcherConfig {
            callback_uri: self.sip.callback_uri.clone(),
            udp_p2p: self.telegram.udp_p2p,
            udp_reflector: self.telegram.udp_reflector,
            voip: callbridge_core::VoipStaticConfig {
                data_saving: false,
                aec_enabled: self.telegram.enable_aec,
                ns_enabled: self.telegram.enable_ns,
                agc_enabled: self.telegram.enable_agc,
                proxy: self.telegram.voip_proxy(),
                init_timeout_ms: 3000,
                recv_timeout_ms: 3000,
            },
            extra_wait: std::time::Duration::from_secs(self.other.extra_wait_time),
            peer_flood: std::time::Duration::from_secs(self.other.peer_flood_time),
        }
    }
}
