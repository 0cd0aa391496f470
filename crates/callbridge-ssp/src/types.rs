/// Opaque handle from the SSP collaborator. `None` stands in for the
/// original's sentinel "invalid" value.
pub type SspCallId = i32;

pub const SSP_CALL_ID_INVALID: SspCallId = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SspCallState {
    Early,
    Confirmed,
    Disconnected,
    Other,
}

/// Status code + reason attached to an outbound `Answer`/`Hangup`. Built from
/// `StatusCode` in `callbridge-core` at the action call-site; kept untyped
/// here so this crate has no dependency on the core crate.
#[derive(Debug, Clone)]
pub struct SspStatus {
    pub code: u16,
    pub reason: String,
}

impl SspStatus {
    pub fn ok() -> Self {
        Self {
            code: 200,
            reason: "OK".to_string(),
        }
    }

    pub fn ringing() -> Self {
        Self {
            code: 180,
            reason: "Ringing".to_string(),
        }
    }

    pub fn bad_extension(reason: impl Into<String>) -> Self {
        Self {
            code: 420,
            reason: reason.into(),
        }
    }

    pub fn internal_server_error(reason: impl Into<String>) -> Self {
        Self {
            code: 500,
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self {
            code: 404,
            reason: reason.into(),
        }
    }
}

/// Diagnostic headers set on a gateway-originated `Dial`. `X-GW-Context` and
/// `X-TG-ID` are always present; the rest only when non-empty (§6).
#[derive(Debug, Clone, Default)]
pub struct SspHeaders {
    pub gw_context: String,
    pub tg_id: String,
    pub tg_first_name: Option<String>,
    pub tg_last_name: Option<String>,
    pub tg_username: Option<String>,
    pub tg_phone: Option<String>,
}

impl SspHeaders {
    /// Renders as `(name, value)` pairs in the fixed order the wire format
    /// uses, skipping absent optional fields.
    pub fn as_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("X-GW-Context", self.gw_context.clone()),
            ("X-TG-ID", self.tg_id.clone()),
        ];
        if let Some(v) = &self.tg_first_name {
            pairs.push(("X-TG-FirstName", v.clone()));
        }
        if let Some(v) = &self.tg_last_name {
            pairs.push(("X-TG-LastName", v.clone()));
        }
        if let Some(v) = &self.tg_username {
            pairs.push(("X-TG-Username", v.clone()));
        }
        if let Some(v) = &self.tg_phone {
            pairs.push(("X-TG-Phone", v.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct SspIncoming {
    pub call_id: SspCallId,
    pub extension: String,
}

#[derive(Debug, Clone)]
pub struct SspCallStateUpdate {
    pub call_id: SspCallId,
    pub state: SspCallState,
}

#[derive(Debug, Clone)]
pub struct SspMediaStateUpdate {
    pub call_id: SspCallId,
    pub has_media: bool,
}

#[derive(Debug, Clone)]
pub enum SspEvent {
    Incoming(SspIncoming),
    CallStateUpdate(SspCallStateUpdate),
    MediaStateUpdate(SspMediaStateUpdate),
}
