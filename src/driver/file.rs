//! File-per-session driver.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::{debug, info};

use super::SessionDriver;
use crate::clock::{Clock, SystemClock};
use crate::session::SessionId;
use crate::Result;

const FILE_PREFIX: &str = "sess_";

/// Stores each session as `<dir>/sess_<id>`. Age comes from the file's
/// modification time.
pub struct FileDriver {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    opened: bool,
}

impl std::fmt::Debug for FileDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDriver")
            .field("dir", &self.dir)
            .field("opened", &self.opened)
            .finish()
    }
}

impl FileDriver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            clock: Arc::new(SystemClock),
            opened: false,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", FILE_PREFIX, id))
    }

    /// Ids of every session file in the directory.
    pub fn ids(&self) -> Result<Vec<SessionId>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(raw) = name.to_str().and_then(|n| n.strip_prefix(FILE_PREFIX)) else {
                continue;
            };
            if let Ok(id) = raw.parse() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl SessionDriver for FileDriver {
    fn open(&mut self, _save_path: &str, _name: &str) -> Result<bool> {
        if !self.opened {
            fs::create_dir_all(&self.dir)?;
            self.opened = true;
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<bool> {
        self.opened = false;
        Ok(true)
    }

    fn read(&self, id: &SessionId) -> Result<Vec<u8>> {
        match fs::read(self.path_for(id.as_str())) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<bool> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(id.as_str()), data)?;
        debug!(dir = %self.dir.display(), %id, bytes = data.len(), "session file written");
        Ok(true)
    }

    fn destroy(&mut self, id: &SessionId) -> Result<bool> {
        match fs::remove_file(self.path_for(id.as_str())) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn gc(&mut self, max_lifetime: u64) -> Result<bool> {
        let now = self.clock.now();
        let mut removed = 0usize;

        for id in self.ids()? {
            let path = self.path_for(id.as_str());
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let last_update = modified
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);

            if last_update.saturating_add(max_lifetime) <= now {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if removed > 0 {
            info!(dir = %self.dir.display(), removed, "file gc swept expired sessions");
        }
        Ok(true)
    }
}
