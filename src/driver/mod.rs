//! Storage drivers.
//!
//! Every backend implements [`SessionDriver`]. Drivers are registered by
//! name in a [`DriverRegistry`]; one of them is the default (the source of
//! truth for reads) and the rest are mirrors that receive fan-out writes.
//!
//! ## Drivers
//!
//! - [`CacheDriver`]: a get/set/delete cache with a self-maintained shadow
//!   index so expired sessions can be found for garbage collection
//! - [`FileDriver`]: one file per session in a directory

mod backend;
mod cache;
mod file;
mod registry;

pub use backend::{CacheBackend, MemoryCache};
pub use cache::{CacheDriver, IndexEntry, ShadowIndex, DEFAULT_INDEX_KEY};
pub use file::FileDriver;
pub use registry::DriverRegistry;

use crate::session::{GenerateSid, SessionId};
use crate::Result;

/// The contract every storage backend implements.
///
/// `open` and `close` are idempotent. Reading an unknown id yields an empty
/// payload and destroying one is not an error; the only failures are the
/// backend itself being unavailable or broken.
pub trait SessionDriver: Send {
    /// Prepare the backend for a usage session.
    fn open(&mut self, save_path: &str, name: &str) -> Result<bool>;

    /// Release the backend.
    fn close(&mut self) -> Result<bool>;

    /// Load the record for `id`, empty when there is none.
    fn read(&self, id: &SessionId) -> Result<Vec<u8>>;

    /// Store the record for `id`.
    fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<bool>;

    /// Remove the record for `id`.
    fn destroy(&mut self, id: &SessionId) -> Result<bool>;

    /// Remove every record older than `max_lifetime` seconds.
    fn gc(&mut self, max_lifetime: u64) -> Result<bool>;

    /// Optional id-generation capability.
    fn sid_generator(&self) -> Option<&dyn GenerateSid> {
        None
    }
}
