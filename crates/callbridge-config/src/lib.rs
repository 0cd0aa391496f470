//! `settings.ini` loader producing the gateway's typed configuration (§6,
//! §10.3, §11). Depends on `callbridge-core` only for `GatewayError` and
//! `DispatcherConfig`; never the other way around.

mod loader;
mod settings;

pub use loader::load;
pub use settings::{GatewaySettings, LoggingSettings, OtherSettings, SipSettings, TelegramSettings};
