//! Call-bridge control plane (§2 of the design): the per-call state
//! machines, the event-dispatch loop that owns and routes events to them,
//! the contact-resolution cache with rate-limit back-off, and the
//! correlation between the three identifier spaces this crate bridges.
//!
//! This crate depends only on the `callbridge-pvp`/`callbridge-ssp` trait
//! definitions, never on a concrete collaborator implementation — the
//! concrete PVP/SSP clients and the `settings.ini` loader live in their own
//! crates and are wired together by the `callbridge-gateway` binary.

pub mod cache;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod event_queue;
pub mod rate_limit;
pub mod state_machine;

pub use cache::Cache;
pub use config::{DispatcherConfig, VoipStaticConfig};
pub use context::CallContext;
pub use dispatcher::Dispatcher;
pub use error::{ActionError, GatewayError, StatusCode};
pub use event::{CorrelationKey, Event, InternalError};
pub use event_queue::EventQueue;
pub use rate_limit::RateLimitGate;
pub use state_machine::{CallMachine, Collaborators, State};
