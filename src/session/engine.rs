//! Host session engine boundary.
//!
//! The coordinator never stores attributes or talks to cookies itself; that
//! is the host engine's job. [`SessionEngine`] is the narrow surface the
//! coordinator needs from it, and [`SaveHandler`] is what the engine calls
//! back into when it has to touch storage. [`LocalEngine`] is a complete
//! in-process engine.

use std::collections::HashMap;

use tracing::debug;

use super::{Attributes, EngineStatus, SessionId};
use crate::Result;

/// Storage callbacks the engine invokes, served by the default driver.
pub trait SaveHandler {
    fn open(&mut self, save_path: &str, name: &str) -> Result<bool>;
    fn close(&mut self) -> Result<bool>;
    fn read(&mut self, id: &SessionId) -> Result<Vec<u8>>;
    fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<bool>;
    fn destroy(&mut self, id: &SessionId) -> Result<bool>;
    fn gc(&mut self, max_lifetime: u64) -> Result<bool>;
    fn create_sid(&mut self) -> Result<SessionId>;
}

/// Options for starting a session.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Session (cookie) name for this start only.
    pub name: Option<String>,
    /// Passed to the driver's `open`.
    pub save_path: Option<String>,
    /// Load the attributes, then release the session without writing.
    pub read_and_close: bool,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_save_path(mut self, path: impl Into<String>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    pub fn read_and_close(mut self) -> Self {
        self.read_and_close = true;
        self
    }
}

/// What the coordinator needs from the host session engine.
pub trait SessionEngine {
    fn status(&self) -> EngineStatus;

    fn name(&self) -> &str;
    fn set_name(&mut self, name: &str);

    fn session_id(&self) -> Option<&SessionId>;
    fn set_session_id(&mut self, id: Option<SessionId>);

    /// Value of the request cookie called `name`.
    fn cookie(&self, name: &str) -> Option<&str>;

    /// Start the session under the current id: open storage, read the
    /// record, load attributes. Returns whether the session is now active.
    fn start(&mut self, handler: &mut dyn SaveHandler, options: &StartOptions) -> Result<bool>;

    /// The host's own destroy path for the current session.
    fn destroy(&mut self, handler: &mut dyn SaveHandler) -> Result<bool>;

    /// Rotate to a new id, destroying the old id's storage when asked.
    fn regenerate_id(&mut self, handler: &mut dyn SaveHandler, delete_old: bool) -> Result<bool>;

    /// Release the session without writing it back.
    fn abort(&mut self) -> bool;

    /// Serialize the attributes.
    fn encode(&self) -> Result<Vec<u8>>;

    fn attributes(&self) -> &Attributes;
    fn attributes_mut(&mut self) -> &mut Attributes;

    /// Free every attribute.
    fn unset(&mut self) {
        self.attributes_mut().clear();
    }
}

/// In-process session engine.
#[derive(Debug, Clone)]
pub struct LocalEngine {
    enabled: bool,
    active: bool,
    name: String,
    id: Option<SessionId>,
    cookies: HashMap<String, String>,
    attributes: Attributes,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEngine {
    pub fn new() -> Self {
        Self {
            enabled: true,
            active: false,
            name: super::DEFAULT_SESSION_NAME.to_string(),
            id: None,
            cookies: HashMap::new(),
            attributes: Attributes::new(),
        }
    }

    /// An engine with sessions switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Add a request cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

impl SessionEngine for LocalEngine {
    fn status(&self) -> EngineStatus {
        if !self.enabled {
            EngineStatus::Disabled
        } else if self.active {
            EngineStatus::Active
        } else {
            EngineStatus::None
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn session_id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    fn set_session_id(&mut self, id: Option<SessionId>) {
        self.id = id;
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    fn start(&mut self, handler: &mut dyn SaveHandler, options: &StartOptions) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        if let Some(name) = &options.name {
            self.name = name.clone();
        }

        let save_path = options.save_path.as_deref().unwrap_or_default();
        if !handler.open(save_path, &self.name)? {
            return Ok(false);
        }

        let id = match self.id.take() {
            Some(id) => id,
            None => handler.create_sid()?,
        };
        let data = handler.read(&id)?;
        self.attributes = Attributes::decode(&data)?;
        debug!(%id, attributes = self.attributes.len(), "engine loaded session");
        self.id = Some(id);
        self.active = true;

        if options.read_and_close {
            handler.close()?;
            self.active = false;
        }
        Ok(true)
    }

    fn destroy(&mut self, handler: &mut dyn SaveHandler) -> Result<bool> {
        if !self.active {
            return Ok(false);
        }
        let destroyed = match &self.id {
            Some(id) => handler.destroy(id)?,
            None => true,
        };
        handler.close()?;
        self.active = false;
        Ok(destroyed)
    }

    fn regenerate_id(&mut self, handler: &mut dyn SaveHandler, delete_old: bool) -> Result<bool> {
        if !self.active {
            return Ok(false);
        }
        if delete_old {
            if let Some(old) = &self.id {
                handler.destroy(old)?;
            }
        }
        self.id = Some(handler.create_sid()?);
        Ok(true)
    }

    fn abort(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        self.attributes.encode()
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Handler over a plain map.
    #[derive(Default)]
    struct MapHandler {
        records: HashMap<String, Vec<u8>>,
        next: u32,
        opened: u32,
        closed: u32,
    }

    impl SaveHandler for MapHandler {
        fn open(&mut self, _: &str, _: &str) -> Result<bool> {
            self.opened += 1;
            Ok(true)
        }
        fn close(&mut self) -> Result<bool> {
            self.closed += 1;
            Ok(true)
        }
        fn read(&mut self, id: &SessionId) -> Result<Vec<u8>> {
            Ok(self.records.get(id.as_str()).cloned().unwrap_or_default())
        }
        fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<bool> {
            self.records.insert(id.to_string(), data.to_vec());
            Ok(true)
        }
        fn destroy(&mut self, id: &SessionId) -> Result<bool> {
            Ok(self.records.remove(id.as_str()).is_some())
        }
        fn gc(&mut self, _: u64) -> Result<bool> {
            Ok(true)
        }
        fn create_sid(&mut self) -> Result<SessionId> {
            self.next += 1;
            SessionId::new(format!("gen{}", self.next))
        }
    }

    #[test]
    fn test_status() {
        assert_eq!(LocalEngine::disabled().status(), EngineStatus::Disabled);
        assert_eq!(LocalEngine::new().status(), EngineStatus::None);
    }

    #[test]
    fn test_start_loads_attributes() {
        let mut handler = MapHandler::default();
        handler.records.insert("abc".into(), br#"{"k":1}"#.to_vec());

        let mut engine = LocalEngine::new();
        engine.set_session_id(Some("abc".parse().unwrap()));
        assert!(engine.start(&mut handler, &StartOptions::new()).unwrap());

        assert_eq!(engine.status(), EngineStatus::Active);
        assert_eq!(engine.attributes().get("k").unwrap(), &serde_json::json!(1));
        assert_eq!(handler.opened, 1);
    }

    #[test]
    fn test_start_without_id_generates() {
        let mut handler = MapHandler::default();
        let mut engine = LocalEngine::new();
        engine.start(&mut handler, &StartOptions::new()).unwrap();
        assert_eq!(engine.session_id().unwrap().as_str(), "gen1");
    }

    #[test]
    fn test_read_and_close() {
        let mut handler = MapHandler::default();
        let mut engine = LocalEngine::new();
        let options = StartOptions::new().read_and_close();
        assert!(engine.start(&mut handler, &options).unwrap());
        assert_eq!(engine.status(), EngineStatus::None);
        assert_eq!(handler.closed, 1);
    }

    #[test]
    fn test_destroy_goes_through_handler() {
        let mut handler = MapHandler::default();
        handler.records.insert("abc".into(), b"{}".to_vec());

        let mut engine = LocalEngine::new();
        engine.set_session_id(Some("abc".parse().unwrap()));
        engine.start(&mut handler, &StartOptions::new()).unwrap();

        assert!(engine.destroy(&mut handler).unwrap());
        assert!(handler.records.is_empty());
        assert_eq!(engine.status(), EngineStatus::None);
        // Second destroy has nothing to do
        assert!(!engine.destroy(&mut handler).unwrap());
    }

    #[test]
    fn test_regenerate_deletes_old() {
        let mut handler = MapHandler::default();
        handler.records.insert("abc".into(), b"{}".to_vec());

        let mut engine = LocalEngine::new();
        engine.set_session_id(Some("abc".parse().unwrap()));
        engine.start(&mut handler, &StartOptions::new()).unwrap();

        assert!(engine.regenerate_id(&mut handler, true).unwrap());
        assert_eq!(engine.session_id().unwrap().as_str(), "gen1");
        assert!(!handler.records.contains_key("abc"));
    }

    #[test]
    fn test_abort_reports_previous_activity() {
        let mut handler = MapHandler::default();
        let mut engine = LocalEngine::new();
        assert!(!engine.abort());
        engine.start(&mut handler, &StartOptions::new()).unwrap();
        assert!(engine.abort());
        assert_eq!(engine.status(), EngineStatus::None);
    }

    #[test]
    fn test_cookie_lookup() {
        let engine = LocalEngine::new().with_cookie("SESSID", "fromcookie");
        assert_eq!(engine.cookie("SESSID"), Some("fromcookie"));
        assert_eq!(engine.cookie("OTHER"), None);
    }
}
