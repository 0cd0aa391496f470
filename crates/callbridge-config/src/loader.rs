use std::path::Path;

use callbridge_core::GatewayError;
use ini::Ini;

use crate::settings::{GatewaySettings, LoggingSettings, OtherSettings, SipSettings, TelegramSettings};

/// Loads and validates `settings.ini` (§6, §10.3, §11). Any structurally
/// missing required key is a `GatewayError::Config`, turned by `main` into
/// exit code 1 — never a panic.
pub fn load(path: impl AsRef<Path>) -> Result<GatewaySettings, GatewayError> {
    let path = path.as_ref();
    let ini = Ini::load_from_file(path)
        .map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))?;

    let logging = load_logging(&ini);
    let sip = load_sip(&ini);
    let telegram = load_telegram(&ini)?;
    let other = load_other(&ini);

    Ok(GatewaySettings {
        logging,
        sip,
        telegram,
        other,
    })
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section)).and_then(|s| s.get(key))
}

fn get_string(ini: &Ini, section: &str, key: &str, default: &str) -> String {
    get(ini, section, key).unwrap_or(default).to_string()
}

fn get_bool(ini: &Ini, section: &str, key: &str, default: bool) -> bool {
    get(ini, section, key)
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

fn get_u8_clamped(ini: &Ini, section: &str, key: &str, default: u8) -> u8 {
    let value = get(ini, section, key)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default as i64);
    value.clamp(0, 6) as u8
}

fn get_u32(ini: &Ini, section: &str, key: &str, default: u32) -> u32 {
    get(ini, section, key)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn get_u64(ini: &Ini, section: &str, key: &str, default: u64) -> u64 {
    get(ini, section, key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn get_i32(ini: &Ini, section: &str, key: &str, default: i32) -> i32 {
    get(ini, section, key)
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(default)
}

fn get_u16(ini: &Ini, section: &str, key: &str, default: u16) -> u16 {
    get(ini, section, key)
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default)
}

fn load_logging(ini: &Ini) -> LoggingSettings {
    let default = LoggingSettings::default();
    LoggingSettings {
        console_min_level: get_u8_clamped(ini, "logging", "console_min_level", default.console_min_level),
        file_min_level: get_u8_clamped(ini, "logging", "file_min_level", default.file_min_level),
        core: get_u8_clamped(ini, "logging", "core", default.core),
        pjsip: get_u8_clamped(ini, "logging", "pjsip", default.pjsip),
        sip_messages: get_bool(ini, "logging", "sip_messages", default.sip_messages),
        tdlib: get_u8_clamped(ini, "logging", "tdlib", default.tdlib),
        tgvoip: get_u8_clamped(ini, "logging", "tgvoip", default.tgvoip),
    }
}

fn load_sip(ini: &Ini) -> SipSettings {
    let default = SipSettings::default();
    SipSettings {
        port: get_u32(ini, "sip", "port", default.port),
        id_uri: get_string(ini, "sip", "id_uri", &default.id_uri),
        callback_uri: get_string(ini, "sip", "callback_uri", &default.callback_uri),
        public_address: get_string(ini, "sip", "public_address", &default.public_address),
        stun_server: get_string(ini, "sip", "stun_server", &default.stun_server),
        raw_pcm: get_bool(ini, "sip", "raw_pcm", default.raw_pcm),
        thread_count: get_u32(ini, "sip", "thread_count", default.thread_count).max(1),
        port_range: get_u32(ini, "sip", "port_range", default.port_range),
    }
}

fn load_telegram(ini: &Ini) -> Result<TelegramSettings, GatewayError> {
    let default = TelegramSettings::default();
    let api_id = get_i32(ini, "telegram", "api_id", default.api_id);
    let api_hash = get_string(ini, "telegram", "api_hash", &default.api_hash);
    if api_id == 0 {
        return Err(GatewayError::Config(
            "telegram.api_id is required and must be non-zero".to_string(),
        ));
    }
    if api_hash.is_empty() {
        return Err(GatewayError::Config(
            "telegram.api_hash is required and must be non-empty".to_string(),
        ));
    }

    Ok(TelegramSettings {
        api_id,
        api_hash,
        database_folder: get_string(ini, "telegram", "database_folder", &default.database_folder),
        system_language_code: get_string(
            ini,
            "telegram",
            "system_language_code",
            &default.system_language_code,
        ),
        device_model: get_string(ini, "telegram", "device_model", &default.device_model),
        system_version: get_string(ini, "telegram", "system_version", &default.system_version),
        application_version: get_string(
            ini,
            "telegram",
            "application_version",
            &default.application_version,
        ),
        udp_p2p: get_bool(ini, "telegram", "udp_p2p", default.udp_p2p),
        udp_reflector: get_bool(ini, "telegram", "udp_reflector", default.udp_reflector),
        enable_aec: get_bool(ini, "telegram", "enable_aec", default.enable_aec),
        enable_ns: get_bool(ini, "telegram", "enable_ns", default.enable_ns),
        enable_agc: get_bool(ini, "telegram", "enable_agc", default.enable_agc),
        use_proxy: get_bool(ini, "telegram", "use_proxy", default.use_proxy),
        proxy_address: get_string(ini, "telegram", "proxy_address", &default.proxy_address),
        proxy_port: get_i32(ini, "telegram", "proxy_port", default.proxy_port),
        proxy_username: get_string(ini, "telegram", "proxy_username", &default.proxy_username),
        proxy_password: get_string(ini, "telegram", "proxy_password", &default.proxy_password),
        use_voip_proxy: get_bool(ini, "telegram", "use_voip_proxy", default.use_voip_proxy),
        voip_proxy_address: get_string(
            ini,
            "telegram",
            "voip_proxy_address",
            &default.voip_proxy_address,
        ),
        voip_proxy_port: get_u16(ini, "telegram", "voip_proxy_port", default.voip_proxy_port),
        voip_proxy_username: get_string(
            ini,
            "telegram",
            "voip_proxy_username",
            &default.voip_proxy_username,
        ),
        voip_proxy_password: get_string(
            ini,
            "telegram",
            "voip_proxy_password",
            &default.voip_proxy_password,
        ),
    })
}

fn load_other(ini: &Ini) -> OtherSettings {
    let default = OtherSettings::default();
    OtherSettings {
        extra_wait_time: get_u64(ini, "other", "extra_wait_time", default.extra_wait_time),
        peer_flood_time: get_u64(ini, "other", "peer_flood_time", default.peer_flood_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ini(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_api_hash_is_config_error_not_panic() {
        let file = write_ini("[telegram]\napi_id = 12345\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn zero_api_id_is_config_error() {
        let file = write_ini("[telegram]\napi_hash = deadbeef\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn log_levels_are_clamped_to_0_6() {
        let file = write_ini(
            "[telegram]\napi_id = 1\napi_hash = x\n[logging]\ncore = 99\nfile_min_level = -5\n",
        );
        let settings = load(file.path()).unwrap();
        assert_eq!(settings.logging.core, 6);
        assert_eq!(settings.logging.file_min_level, 0);
    }

    #[test]
    fn defaults_match_spec_when_section_absent() {
        let file = write_ini("[telegram]\napi_id = 1\napi_hash = x\n");
        let settings = load(file.path()).unwrap();
        assert_eq!(settings.sip.id_uri, "sip:localhost");
        assert_eq!(settings.sip.callback_uri, "");
        assert!(settings.sip.raw_pcm);
        assert_eq!(settings.other.extra_wait_time, 30);
        assert_eq!(settings.other.peer_flood_time, 86_400);
        assert!(!settings.telegram.udp_p2p);
        assert!(settings.telegram.udp_reflector);
    }

    #[test]
    fn empty_callback_uri_round_trips_into_dispatcher_config() {
        let file = write_ini("[telegram]\napi_id = 1\napi_hash = x\n");
        let settings = load(file.path()).unwrap();
        let config = settings.to_dispatcher_config();
        assert_eq!(config.callback_uri, "");
    }
}
