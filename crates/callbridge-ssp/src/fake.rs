//! In-memory `SspClient` implementation used by integration tests. Real
//! pjsip connectivity is an out-of-scope external collaborator (§1);
//! `callbridge-gateway`'s default build also wires this fake in as its
//! loopback backend rather than fabricate FFI bindings no reference crate
//! in this workspace provides.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use crate::client::{AudioEndpoint, SspClient};
use crate::types::{SspCallId, SspHeaders, SspStatus};

#[derive(Debug, Clone)]
pub struct DialCall {
    pub uri: String,
    pub headers: SspHeaders,
}

#[derive(Debug, Clone)]
pub struct AnswerCall {
    pub call_id: SspCallId,
    pub status: SspStatus,
}

#[derive(Debug, Clone)]
pub struct HangupCall {
    pub call_id: SspCallId,
    pub status: SspStatus,
}

#[derive(Default)]
struct Inner {
    dials: Vec<DialCall>,
    answers: Vec<AnswerCall>,
    hangups: Vec<HangupCall>,
    dtmf: Vec<(SspCallId, String)>,
    bridges: Vec<SspCallId>,
}

pub struct FakeSspClient {
    next_call_id: AtomicI32,
    inner: Mutex<Inner>,
}

impl FakeSspClient {
    pub fn new() -> Self {
        Self {
            next_call_id: AtomicI32::new(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn dials(&self) -> Vec<DialCall> {
        self.inner.lock().unwrap().dials.clone()
    }

    pub fn answers(&self) -> Vec<AnswerCall> {
        self.inner.lock().unwrap().answers.clone()
    }

    pub fn hangups(&self) -> Vec<HangupCall> {
        self.inner.lock().unwrap().hangups.clone()
    }

    pub fn dtmf_sent(&self) -> Vec<(SspCallId, String)> {
        self.inner.lock().unwrap().dtmf.clone()
    }

    pub fn bridges(&self) -> Vec<SspCallId> {
        self.inner.lock().unwrap().bridges.clone()
    }
}

impl Default for FakeSspClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SspClient for FakeSspClient {
    fn dial(&self, uri: &str, headers: &SspHeaders) -> anyhow::Result<SspCallId> {
        let id = self.next_call_id.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().unwrap().dials.push(DialCall {
            uri: uri.to_string(),
            headers: headers.clone(),
        });
        Ok(id)
    }

    fn answer(&self, call_id: SspCallId, status: &SspStatus) -> anyhow::Result<()> {
        self.inner.lock().unwrap().answers.push(AnswerCall {
            call_id,
            status: status.clone(),
        });
        Ok(())
    }

    fn hangup(&self, call_id: SspCallId, status: &SspStatus) -> anyhow::Result<()> {
        self.inner.lock().unwrap().hangups.push(HangupCall {
            call_id,
            status: status.clone(),
        });
        Ok(())
    }

    fn dial_dtmf(&self, call_id: SspCallId, digits: &str) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .dtmf
            .push((call_id, digits.to_string()));
        Ok(())
    }

    fn bridge_audio(
        &self,
        call_id: SspCallId,
        _input: AudioEndpoint,
        _output: AudioEndpoint,
    ) -> anyhow::Result<()> {
        self.inner.lock().unwrap().bridges.push(call_id);
        Ok(())
    }
}
