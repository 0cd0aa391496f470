//! Call-site contract over the SSP (session-initiation signalling)
//! collaborator: event types carried on the SSP queue, the client trait, and
//! an in-memory fake for tests.

mod client;
mod types;

pub mod fake;

pub use client::{AudioEndpoint, SspClient};
pub use types::{
    SspCallId, SspCallState, SspCallStateUpdate, SspEvent, SspHeaders, SspIncoming,
    SspMediaStateUpdate, SspStatus, SSP_CALL_ID_INVALID,
};
