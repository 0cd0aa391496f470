use std::fmt;

/// Fatal failures that abort the process before the dispatcher ever starts.
///
/// These map onto the process exit codes: any variant here is surfaced through
/// `main`'s `Result` return rather than routed through the state machine.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("settings failed to load: {0}")]
    Config(String),

    #[error("failed to construct {adapter} adapter: {source}")]
    AdapterInit {
        adapter: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("pvp client did not report ready within {0:?}")]
    PvpNotReady(std::time::Duration),
}

/// The three SSP-flavoured status codes an action ever needs to report.
///
/// Not a general SIP status enum: only the values §4.4/§4.5 of the control
/// plane produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    InternalServerError,
    NotFound,
    BadExtension,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::BadExtension => "BAD_EXTENSION",
        };
        f.write_str(s)
    }
}

/// Payload carried by an `Event::InternalError`.
///
/// Not a Rust error propagated with `?` — action bodies build one of these
/// from a failed collaborator call and hand it to the dispatcher, which turns
/// it into an event. It never unwinds the stack.
#[derive(Debug, Clone)]
pub struct ActionError {
    pub status_code: StatusCode,
    pub reason: String,
}

impl ActionError {
    pub fn new(status_code: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status_code,
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(StatusCode::InternalServerError, reason)
    }

    /// Builds an `ActionError` from a collaborator RPC failure, formatted the
    /// way the PVP/SSP adapters report theirs: `"<code>; <message>"`.
    pub fn from_rpc(err: &anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status_code, self.reason)
    }
}
