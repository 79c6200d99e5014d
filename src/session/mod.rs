//! Session management module.
//!
//! This module provides the session identity, the lifecycle state machine,
//! the host engine boundary and the coordinator that drives the registered
//! storage drivers.

mod attributes;
mod engine;
mod id;
mod manager;
mod source;
mod state;

pub use attributes::Attributes;
pub use engine::{LocalEngine, SaveHandler, SessionEngine, StartOptions};
pub use id::{GenerateSid, SessionId, SidGenerator};
pub use manager::{FanOutReport, SessionConfig, SessionManager};
pub use source::{IdCandidates, IdResolver, IdSource};
pub use state::{EngineStatus, LifecycleState};

/// Session name used when neither the config nor the engine sets one.
pub const DEFAULT_SESSION_NAME: &str = "SESSID";
