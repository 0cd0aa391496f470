//! Gateway binary: process wiring, logging setup, startup/shutdown sequence
//! (§6, §10). Everything interesting — the per-call state machines and the
//! dispatch loop — lives in `callbridge-core`; this binary only does the
//! parts that are specific to running as a standalone process: read
//! `settings.ini`, stand up logging, install the stop-signal handler, wait
//! for the PVP side to come up, then hand control to the dispatcher until
//! asked to stop.

mod logging;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use callbridge_config::{SipSettings, TelegramSettings};
use callbridge_core::{Dispatcher, EventQueue, GatewayError};
use callbridge_pvp::fake::FakePvpClient;
use callbridge_pvp::PvpClient;
use callbridge_pvp::PvpEvent;
use callbridge_ssp::fake::FakeSspClient;
use callbridge_ssp::SspClient;
use callbridge_ssp::SspEvent;

const SETTINGS_PATH: &str = "settings.ini";

/// §6: "1 if PVP client does not report ready within 5 seconds."
const PVP_READY_TIMEOUT: Duration = Duration::from_secs(5);

fn main() {
    std::process::exit(match run() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("callbridge-gateway: {e}");
            1
        }
    });
}

fn run() -> Result<(), GatewayError> {
    let settings = callbridge_config::load(SETTINGS_PATH)?;
    logging::init(&settings.logging)?;
    tracing::info!("callbridge-gateway starting");

    // Real TDLib/pjsip connectivity is an out-of-scope external collaborator
    // (§1); this build wires in the in-memory loopback clients that the
    // control plane also tests against. Swap these two function bodies for a
    // real adapter crate to dial out against live backends.
    let pvp: Arc<dyn PvpClient> = construct_pvp_adapter(&settings.telegram)?;
    let ssp: Arc<dyn SspClient> = construct_ssp_adapter(&settings.sip)?;
    let pvp_queue: Arc<EventQueue<PvpEvent>> = Arc::new(EventQueue::new());
    let ssp_queue: Arc<EventQueue<SspEvent>> = Arc::new(EventQueue::new());

    let stop_flag = Arc::new(AtomicBool::new(false));
    {
        let stop_flag = stop_flag.clone();
        ctrlc::set_handler(move || {
            tracing::info!("stop signal received");
            stop_flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| GatewayError::Config(format!("failed to install signal handler: {e}")))?;
    }

    let dispatcher_config = settings.to_dispatcher_config();
    let mut dispatcher = Dispatcher::new(
        pvp,
        ssp,
        pvp_queue,
        ssp_queue,
        dispatcher_config,
        stop_flag,
    );

    let readiness_started = Instant::now();
    dispatcher
        .load_contact_cache()
        .map_err(|_| GatewayError::PvpNotReady(PVP_READY_TIMEOUT))?;
    if readiness_started.elapsed() > PVP_READY_TIMEOUT {
        return Err(GatewayError::PvpNotReady(PVP_READY_TIMEOUT));
    }
    tracing::info!("pvp client ready, entering dispatch loop");

    dispatcher.run();

    tracing::info!("callbridge-gateway shut down cleanly");
    Ok(())
}

/// Stands up the PVP adapter. The fake itself can't fail to construct, but a
/// real TDLib client needs a writable `database_folder`, so that check lives
/// here rather than being skipped just because today's backend is a fake.
fn construct_pvp_adapter(telegram: &TelegramSettings) -> Result<Arc<dyn PvpClient>, GatewayError> {
    if !telegram.database_folder.is_empty() {
        std::fs::create_dir_all(&telegram.database_folder).map_err(|e| GatewayError::AdapterInit {
            adapter: "pvp",
            source: anyhow::Error::new(e)
                .context(format!("creating telegram.database_folder {:?}", telegram.database_folder)),
        })?;
    }
    Ok(Arc::new(FakePvpClient::new()))
}

/// Stands up the SSP adapter. `sip.port` is read from the ini file as a
/// `u32` (§11) but a SIP/UDP port has to fit in `u16`; catching an
/// out-of-range value here turns a bad config file into a clean startup
/// error instead of a silent truncation once a real pjsip endpoint binds it.
fn construct_ssp_adapter(sip: &SipSettings) -> Result<Arc<dyn SspClient>, GatewayError> {
    u16::try_from(sip.port).map_err(|e| GatewayError::AdapterInit {
        adapter: "ssp",
        source: anyhow::Error::new(e).context(format!("sip.port {} out of range", sip.port)),
    })?;
    Ok(Arc::new(FakeSspClient::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pvp_adapter_construction_rejects_an_unwritable_database_folder() {
        let telegram = TelegramSettings {
            database_folder: "/proc/callbridge-test-cannot-create".to_string(),
            ..Default::default()
        };
        let err = construct_pvp_adapter(&telegram).unwrap_err();
        assert!(matches!(err, GatewayError::AdapterInit { adapter: "pvp", .. }));
    }

    #[test]
    fn ssp_adapter_construction_rejects_a_port_above_u16_range() {
        let sip = SipSettings {
            port: 70_000,
            ..Default::default()
        };
        let err = construct_ssp_adapter(&sip).unwrap_err();
        assert!(matches!(err, GatewayError::AdapterInit { adapter: "ssp", .. }));
    }

    #[test]
    fn ssp_adapter_construction_accepts_a_valid_port() {
        let sip = SipSettings {
            port: 5060,
            ..Default::default()
        };
        assert!(construct_ssp_adapter(&sip).is_ok());
    }
}
