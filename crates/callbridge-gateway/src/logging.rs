//! Structured logging setup (§10.1). Builds one global `tracing` subscriber
//! from the five per-subsystem numeric levels in `[logging]`, mirroring the
//! spdlog-style `0..=6` (trace/debug/info/warn/error/critical/off) scale the
//! original gateway's settings file used. `RUST_LOG` overrides the
//! file-derived filter entirely when set, the same precedence the teacher's
//! `infra-common` logging setup gives it.

use callbridge_config::LoggingSettings;
use callbridge_core::GatewayError;
use tracing_subscriber::EnvFilter;

/// Maps the settings file's `0..=6` scale onto a `tracing` level name.
/// `6` ("off") collapses onto `error` level filtering plus no chance of
/// reaching `DEBUG`/`TRACE` output, since `tracing`/`EnvFilter` has no
/// literal "off" level below `ERROR` short of omitting the target entirely.
fn level_name(n: u8) -> &'static str {
    match n {
        0 => "trace",
        1 => "debug",
        2 => "info",
        3 => "warn",
        4..=5 => "error",
        _ => "off",
    }
}

fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    let base = level_name(settings.console_min_level.max(settings.file_min_level));
    let mut filter = EnvFilter::new(base);
    for directive in [
        format!("callbridge_core={}", level_name(settings.core)),
        format!("callbridge_gateway={}", level_name(settings.core)),
        format!("ssp={}", level_name(settings.pjsip)),
        format!("pvp={}", level_name(settings.tdlib)),
        format!("pvp::media={}", level_name(settings.tgvoip)),
    ] {
        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }
    if settings.sip_messages {
        if let Ok(parsed) = "ssp::wire=trace".parse() {
            filter = filter.add_directive(parsed);
        }
    }
    filter
}

/// Installs the global subscriber. Must run before any other component
/// starts (§10.1); returns a `GatewayError` rather than panicking so `main`
/// can turn a double-init or filter-parse failure into exit code 1.
pub fn init(settings: &LoggingSettings) -> Result<(), GatewayError> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) => EnvFilter::new(value),
        Err(_) => build_filter(settings),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| GatewayError::Config(format!("logging already initialised: {e}")))?;

    install_panic_hook();
    Ok(())
}

/// Rust analogue of the original's `std::set_terminate` handler (§10.1): a
/// panic is logged through the same subscriber before the default panic
/// behaviour runs, so a crash is never silent in the log file.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "process panicked");
        default_hook(info);
    }));
}
