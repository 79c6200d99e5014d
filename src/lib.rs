//! # session-hub
//!
//! Pluggable multi-backend session storage.
//!
//! A [`SessionManager`] sits between a host session engine and any number
//! of named storage drivers. One driver is the default and serves reads;
//! the others are mirrors that receive fan-out writes, destroys and garbage
//! collection. All drivers share a single session identity.
//!
//! ## Features
//!
//! - **Driver registry**: named drivers, default selection, no silent overwrite
//! - **Fan-out**: best-effort write/destroy/gc across every driver
//! - **Cache driver**: key/value cache with a shadow index for gc
//! - **Id negotiation**: explicit, bound, engine, cookie, then generated
//!
//! ## Quick Start
//!
//! ```no_run
//! use session_hub::{
//!     CacheDriver, FileDriver, LocalEngine, MemoryCache, SessionConfig, SessionManager,
//!     StartOptions,
//! };
//!
//! fn main() -> session_hub::Result<()> {
//!     session_hub::logging::try_init().ok();
//!
//!     let mut manager = SessionManager::new(LocalEngine::new(), SessionConfig::default());
//!     manager.add_driver("file", FileDriver::new("/tmp/sessions"))?;
//!     manager.add_driver("cache", CacheDriver::new(MemoryCache::new())?)?;
//!     manager.set_default_driver("file")?;
//!
//!     manager.start(None, &StartOptions::new())?;
//!     manager.set("user", "ann")?;
//!     manager.close()?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod session;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{
    CacheBackend, CacheDriver, DriverRegistry, FileDriver, MemoryCache, SessionDriver,
    ShadowIndex,
};
pub use error::{ErrorKind, Result, SessionError};
pub use session::{
    Attributes, EngineStatus, FanOutReport, GenerateSid, IdResolver, IdSource, LifecycleState,
    LocalEngine, SaveHandler, SessionConfig, SessionEngine, SessionId, SessionManager,
    SidGenerator, StartOptions,
};
