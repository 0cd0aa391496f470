use crate::types::{SspCallId, SspHeaders, SspStatus};

/// Opaque reference to an audio media object, handed across from whichever
/// side produced it (the PVP controller's input/output media, or the SSP
/// call's own audio media). This crate never interprets the payload.
#[derive(Debug, Clone)]
pub struct AudioEndpoint(pub String);

/// Call-site contract over the SSP (session-initiation signalling)
/// collaborator. Incoming calls and state changes never come back from these
/// methods — they arrive asynchronously on the SSP event queue from the
/// worker pool (§4.7).
pub trait SspClient: Send + Sync {
    fn dial(&self, uri: &str, headers: &SspHeaders) -> anyhow::Result<SspCallId>;
    fn answer(&self, call_id: SspCallId, status: &SspStatus) -> anyhow::Result<()>;
    fn hangup(&self, call_id: SspCallId, status: &SspStatus) -> anyhow::Result<()>;
    fn dial_dtmf(&self, call_id: SspCallId, digits: &str) -> anyhow::Result<()>;
    fn bridge_audio(
        &self,
        call_id: SspCallId,
        input: AudioEndpoint,
        output: AudioEndpoint,
    ) -> anyhow::Result<()>;
}
