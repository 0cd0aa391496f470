//! Pure predicates over events/context (§4.4). Kept as standalone functions
//! rather than inlined in the transition match so each one is independently
//! testable, the way the spec calls them out by name.

use callbridge_pvp::{PvpCallState, PvpCallUpdate};
use callbridge_ssp::{SspCallState, SspCallStateUpdate};
use regex::Regex;

use once_cell::sync::Lazy;

static DTMF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-D*#]{1,32}$").unwrap());

pub fn is_incoming(update: &PvpCallUpdate) -> bool {
    update.is_incoming
}

pub fn is_in_state(update: &PvpCallUpdate, state: PvpCallState) -> bool {
    update.state == state
}

pub fn is_sip_in_state(update: &SspCallStateUpdate, state: SspCallState) -> bool {
    update.state == state
}

pub fn callback_uri_is_set(callback_uri: &str) -> bool {
    !callback_uri.is_empty()
}

pub fn is_media_ready(has_media: bool) -> bool {
    has_media
}

pub fn is_text_content(text: &str) -> bool {
    !text.is_empty()
}

/// DTMF grammar: `^[0-9A-D*#]{1,32}$`, uppercase only (§4.4, §6).
pub fn is_dtmf_string(text: &str) -> bool {
    DTMF_RE.is_match(text)
}
