//! Session store coordinator.
//!
//! [`SessionManager`] owns the driver registry and the host engine. Reads go
//! to the default driver only; the `*_all` operations fan out to every
//! registered driver in registration order, best-effort. There is no
//! rollback: if one driver fails the others still run, and the failure is
//! only logged and reported.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    EngineStatus, GenerateSid, IdCandidates, IdResolver, IdSource, LifecycleState, SaveHandler,
    SessionEngine, SessionId, SidGenerator, StartOptions, DEFAULT_SESSION_NAME,
};
use crate::driver::{DriverRegistry, SessionDriver};
use crate::error::SessionError;
use crate::Result;

/// Per-process session settings, handed to the coordinator once.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session (cookie) name. Falls back to the engine's name.
    pub name: Option<String>,
    /// Passed to the drivers' `open`.
    pub save_path: String,
    /// Client address mixed into generated ids.
    pub client_address: Option<String>,
    /// Default lifetime for garbage collection, in seconds.
    pub gc_max_lifetime: u64,
    /// Re-draw generated ids that already have a record in the default
    /// driver. Off by default: ids are not checked for collisions.
    pub unique_ids: bool,
    /// Draws allowed when `unique_ids` is on.
    pub max_id_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: None,
            save_path: String::new(),
            client_address: None,
            gc_max_lifetime: 86_400,
            unique_ids: false,
            max_id_attempts: 8,
        }
    }
}

impl SessionConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_save_path(mut self, path: impl Into<String>) -> Self {
        self.save_path = path.into();
        self
    }

    pub fn with_client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }

    pub fn with_gc_max_lifetime(mut self, secs: u64) -> Self {
        self.gc_max_lifetime = secs;
        self
    }

    pub fn with_unique_ids(mut self, enabled: bool) -> Self {
        self.unique_ids = enabled;
        self
    }
}

/// Outcome of a fan-out operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Drivers that returned success.
    pub succeeded: Vec<String>,
    /// Drivers that errored or returned `false`.
    pub failed: Vec<String>,
}

impl FanOutReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// [`SaveHandler`] backed by the registry's default driver.
struct DefaultHandler<'a> {
    registry: &'a mut DriverRegistry,
    generator: &'a SidGenerator,
    config: &'a SessionConfig,
}

impl<'a> DefaultHandler<'a> {
    fn new(
        registry: &'a mut DriverRegistry,
        generator: &'a SidGenerator,
        config: &'a SessionConfig,
    ) -> Self {
        Self {
            registry,
            generator,
            config,
        }
    }
}

impl SaveHandler for DefaultHandler<'_> {
    fn open(&mut self, save_path: &str, name: &str) -> Result<bool> {
        self.registry.default_driver_mut()?.open(save_path, name)
    }

    fn close(&mut self) -> Result<bool> {
        self.registry.default_driver_mut()?.close()
    }

    fn read(&mut self, id: &SessionId) -> Result<Vec<u8>> {
        self.registry.default_driver()?.read(id)
    }

    fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<bool> {
        self.registry.default_driver_mut()?.write(id, data)
    }

    fn destroy(&mut self, id: &SessionId) -> Result<bool> {
        self.registry.default_driver_mut()?.destroy(id)
    }

    fn gc(&mut self, max_lifetime: u64) -> Result<bool> {
        self.registry.default_driver_mut()?.gc(max_lifetime)
    }

    /// Prefer the default driver's own generator over the built-in one.
    fn create_sid(&mut self) -> Result<SessionId> {
        let driver = self.registry.default_driver()?;
        let address = self.config.client_address.as_deref();
        let generator: &dyn GenerateSid = driver.sid_generator().unwrap_or(self.generator);

        if !self.config.unique_ids {
            return Ok(generator.create_sid(address));
        }

        for _ in 0..self.config.max_id_attempts.max(1) {
            let id = generator.create_sid(address);
            if driver.read(&id)?.is_empty() {
                return Ok(id);
            }
            warn!(%id, "generated session id already in use, drawing again");
        }
        Err(SessionError::StartFailed(format!(
            "no unused session id after {} attempts",
            self.config.max_id_attempts.max(1)
        )))
    }
}

/// Coordinates one session across a default driver and its mirrors.
pub struct SessionManager<E: SessionEngine> {
    registry: DriverRegistry,
    engine: E,
    config: SessionConfig,
    generator: SidGenerator,
    resolver: IdResolver,
    bound_id: Option<SessionId>,
    state: LifecycleState,
}

impl<E: SessionEngine> SessionManager<E> {
    pub fn new(engine: E, config: SessionConfig) -> Self {
        Self::with_registry(DriverRegistry::new(), engine, config)
    }

    /// Use an already populated registry.
    pub fn with_registry(registry: DriverRegistry, engine: E, config: SessionConfig) -> Self {
        Self {
            registry,
            engine,
            config,
            generator: SidGenerator::new(),
            resolver: IdResolver::default(),
            bound_id: None,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Replace the built-in id generator.
    pub fn with_generator(mut self, generator: SidGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Change the id source precedence.
    pub fn with_resolver(mut self, resolver: IdResolver) -> Self {
        self.resolver = resolver;
        self
    }

    // ------------------------------------------------------------------
    // Driver registration
    // ------------------------------------------------------------------

    pub fn add_driver(
        &mut self,
        name: impl Into<String>,
        driver: impl SessionDriver + 'static,
    ) -> Result<()> {
        self.registry.register(name, driver)
    }

    pub fn set_default_driver(&mut self, name: &str) -> Result<()> {
        self.registry.set_default(name)
    }

    pub fn default_driver(&self) -> Result<&str> {
        self.registry.default_name()
    }

    /// Make `name` the default when given, then return the default driver.
    pub fn driver(&mut self, name: Option<&str>) -> Result<&mut dyn SessionDriver> {
        self.registry.resolve(name)
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Close a single driver.
    pub fn close_driver(&mut self, name: &str) -> Result<bool> {
        self.registry.get_mut(name)?.close()
    }

    /// Remove a driver without closing it.
    pub fn unregister_driver(&mut self, name: &str) -> Option<Box<dyn SessionDriver>> {
        self.registry.unregister(name)
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The id currently bound to this coordinator.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.bound_id.as_ref()
    }

    pub fn name(&self) -> &str {
        match self.config.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if !self.engine.name().is_empty() => self.engine.name(),
            _ => DEFAULT_SESSION_NAME,
        }
    }

    /// Rename the session. Not allowed while a session is active.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        if self.is_active() {
            return Err(SessionError::NameLocked);
        }
        self.config.name = Some(name.to_string());
        self.engine.set_name(name);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active || self.engine.status() == EngineStatus::Active
    }

    // ------------------------------------------------------------------
    // Default-driver handler operations
    // ------------------------------------------------------------------

    /// Open the default driver.
    pub fn open(&mut self, save_path: &str, name: &str) -> Result<bool> {
        let opened = self.registry.default_driver_mut()?.open(save_path, name)?;
        if opened && self.state == LifecycleState::Uninitialized {
            self.state.transition_to(LifecycleState::Open)?;
        }
        Ok(opened)
    }

    pub fn read(&self, id: &SessionId) -> Result<Vec<u8>> {
        self.registry.default_driver()?.read(id)
    }

    pub fn write(&mut self, id: &SessionId, data: &[u8]) -> Result<bool> {
        self.registry.default_driver_mut()?.write(id, data)
    }

    /// Garbage-collect the default driver.
    pub fn gc(&mut self, max_lifetime: u64) -> Result<bool> {
        self.registry.default_driver_mut()?.gc(max_lifetime)
    }

    // ------------------------------------------------------------------
    // Fan-out
    // ------------------------------------------------------------------

    fn fan_out<F>(&mut self, op: &str, mut f: F) -> FanOutReport
    where
        F: FnMut(&mut dyn SessionDriver) -> Result<bool>,
    {
        let mut report = FanOutReport::default();
        for (name, driver) in self.registry.iter_mut() {
            match f(driver) {
                Ok(true) => report.succeeded.push(name.to_string()),
                Ok(false) => {
                    debug!(driver = name, op, "driver reported failure");
                    report.failed.push(name.to_string());
                }
                Err(e) => {
                    warn!(driver = name, op, error = %e, "driver failed during fan-out");
                    report.failed.push(name.to_string());
                }
            }
        }
        report
    }

    fn target_id(&self, id: Option<&SessionId>) -> Result<SessionId> {
        id.or(self.bound_id.as_ref())
            .cloned()
            .ok_or(SessionError::NotActive)
    }

    pub fn open_all(&mut self, save_path: &str, name: &str) -> FanOutReport {
        self.fan_out("open", |d| d.open(save_path, name))
    }

    pub fn close_all(&mut self) -> FanOutReport {
        self.fan_out("close", |d| d.close())
    }

    /// Read `id` from every driver. Drivers that fail are left out.
    pub fn read_all(&self, id: &SessionId) -> Vec<(String, Vec<u8>)> {
        self.registry
            .iter()
            .filter_map(|(name, driver)| match driver.read(id) {
                Ok(data) => Some((name.to_string(), data)),
                Err(e) => {
                    warn!(driver = name, error = %e, "driver failed during fan-out");
                    None
                }
            })
            .collect()
    }

    pub fn write_all(&mut self, id: &SessionId, data: &[u8]) -> FanOutReport {
        self.fan_out("write", |d| d.write(id, data))
    }

    /// Destroy `id` (or the bound id) on every driver, the default included.
    pub fn destroy_all(&mut self, id: Option<&SessionId>) -> Result<FanOutReport> {
        let id = self.target_id(id)?;
        Ok(self.fan_out("destroy", |d| d.destroy(&id)))
    }

    pub fn gc_all(&mut self, max_lifetime: u64) -> FanOutReport {
        self.fan_out("gc", |d| d.gc(max_lifetime))
    }

    /// Write the current attributes to every driver.
    pub fn save(&mut self) -> Result<FanOutReport> {
        let id = self.target_id(None)?;
        let data = self.engine.encode()?;
        Ok(self.write_all(&id, &data))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the session under `id`, or the first id the resolver finds.
    pub fn start(&mut self, id: Option<&str>, options: &StartOptions) -> Result<bool> {
        if self.engine.status() == EngineStatus::Disabled {
            return Err(SessionError::EngineDisabled);
        }
        if self.is_active() {
            return Err(SessionError::AlreadyActive);
        }
        if !self.state.can_start() {
            return Err(SessionError::InvalidStateTransition {
                from: self.state,
                to: LifecycleState::Active,
            });
        }

        let name = options
            .name
            .clone()
            .unwrap_or_else(|| self.name().to_string());
        self.engine.set_name(&name);
        let save_path = options
            .save_path
            .clone()
            .unwrap_or_else(|| self.config.save_path.clone());

        if self.state == LifecycleState::Uninitialized {
            self.open(&save_path, &name)?;
        }

        let candidates = IdCandidates {
            explicit: id,
            bound: self.bound_id.as_ref(),
            engine: self.engine.session_id(),
            cookie: self.engine.cookie(&name),
        };
        let (resolved, source) = self.resolver.resolve(&candidates, || {
            DefaultHandler::new(&mut self.registry, &self.generator, &self.config).create_sid()
        })?;
        debug!(id = %resolved, ?source, "session id resolved");
        self.engine.set_session_id(Some(resolved));

        let options = StartOptions {
            name: Some(name.clone()),
            save_path: Some(save_path),
            read_and_close: options.read_and_close,
        };
        let started = {
            let mut handler =
                DefaultHandler::new(&mut self.registry, &self.generator, &self.config);
            self.engine.start(&mut handler, &options)?
        };
        if !started {
            return Err(SessionError::StartFailed(name));
        }

        // The engine may have swapped the id during start
        self.bound_id = self.engine.session_id().cloned();

        if options.read_and_close {
            debug!(name = %name, "session read and released");
            return Ok(true);
        }

        self.state.transition_to(LifecycleState::Active)?;
        info!(
            name = %name,
            id = %self.bound_id.as_ref().map(|i| i.as_str()).unwrap_or_default(),
            generated = source == IdSource::Generated,
            "session started"
        );
        Ok(self.engine.status() == EngineStatus::Active)
    }

    /// Start only from an opened, not yet active store.
    pub fn safe_start(&mut self, options: &StartOptions) -> Result<bool> {
        if self.engine.status() == EngineStatus::Disabled {
            return Err(SessionError::EngineDisabled);
        }
        if self.state == LifecycleState::Uninitialized {
            return Err(SessionError::NotInitialized);
        }
        if self.is_active() {
            return Err(SessionError::AlreadyActive);
        }
        self.start(None, options)
    }

    /// Destroy `id` (or the bound id) on every mirror, then tear down the
    /// default driver's session through the engine's own destroy path.
    ///
    /// The default driver is never destroyed directly here.
    pub fn destroy(&mut self, id: Option<&SessionId>) -> Result<bool> {
        let target = id.or(self.bound_id.as_ref()).cloned();

        if let Some(target) = &target {
            let default = self.registry.default_name()?.to_string();
            for (name, driver) in self.registry.iter_mut() {
                if name == default {
                    continue;
                }
                driver.destroy(target)?;
            }
        }

        if self.engine.status() != EngineStatus::Active {
            return Ok(false);
        }

        let destroyed = {
            let mut handler =
                DefaultHandler::new(&mut self.registry, &self.generator, &self.config);
            self.engine.destroy(&mut handler)?
        };
        self.state.transition_to(LifecycleState::Destroyed)?;
        self.engine.set_session_id(None);
        self.bound_id = None;
        info!(
            id = %target.as_ref().map(|i| i.as_str()).unwrap_or_default(),
            "session destroyed"
        );
        Ok(destroyed)
    }

    /// Persist to every driver, close them all and release the engine
    /// without letting it write again.
    pub fn close(&mut self) -> Result<bool> {
        if self.state.is_terminal() {
            return Err(SessionError::InvalidStateTransition {
                from: self.state,
                to: LifecycleState::Closed,
            });
        }

        match self.bound_id.clone() {
            None => {
                for (_, driver) in self.registry.iter_mut() {
                    driver.close()?;
                }
            }
            Some(id) => {
                let data = self.engine.encode()?;
                for (_, driver) in self.registry.iter_mut() {
                    driver.write(&id, &data)?;
                    driver.close()?;
                }
            }
        }

        let aborted = self.engine.abort();
        self.state.transition_to(LifecycleState::Closed)?;
        info!(drivers = self.registry.len(), "session closed");
        Ok(aborted)
    }

    /// Clear every attribute, then rotate the session id.
    pub fn regenerate(&mut self, delete_old: bool) -> Result<&mut Self> {
        if self.engine.status() != EngineStatus::Active {
            return Err(SessionError::NotActive);
        }
        self.engine.unset();

        let rotated = {
            let mut handler =
                DefaultHandler::new(&mut self.registry, &self.generator, &self.config);
            self.engine.regenerate_id(&mut handler, delete_old)?
        };
        if !rotated {
            return Err(SessionError::NotActive);
        }

        let old = self.bound_id.take();
        self.bound_id = self.engine.session_id().cloned();
        debug!(
            old = %old.as_ref().map(|i| i.as_str()).unwrap_or_default(),
            new = %self.bound_id.as_ref().map(|i| i.as_str()).unwrap_or_default(),
            delete_old,
            "session id regenerated"
        );
        Ok(self)
    }

    /// Wipe the attributes, then rotate the id.
    pub fn invalidate(&mut self, delete_old: bool) -> Result<&mut Self> {
        self.clear()?;
        self.regenerate(delete_old)
    }

    /// Invalidate and destroy. Mirrors lose the old id's record; the
    /// default driver loses the rotated session through the engine.
    pub fn erase(&mut self, id: Option<&SessionId>) -> Result<bool> {
        let old = id.or(self.bound_id.as_ref()).cloned();
        self.invalidate(true)?;
        self.destroy(old.as_ref())
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    fn ensure_enabled(&self) -> Result<()> {
        if self.engine.status() == EngineStatus::Disabled {
            return Err(SessionError::EngineDisabled);
        }
        Ok(())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.ensure_enabled()?;
        self.engine.attributes_mut().set(key, value);
        Ok(())
    }

    /// Absent keys are [`SessionError::AttributeNotFound`].
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.ensure_enabled()?;
        self.engine.attributes().get(key)
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        self.ensure_enabled()?;
        Ok(self.engine.attributes().has(key))
    }

    /// Append to a sequence-valued attribute.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.ensure_enabled()?;
        self.engine.attributes_mut().add(key, value)
    }

    pub fn forget(&mut self, key: &str) -> Result<Option<Value>> {
        self.ensure_enabled()?;
        Ok(self.engine.attributes_mut().forget(key))
    }

    /// Drop every attribute.
    pub fn clear(&mut self) -> Result<&mut Self> {
        self.ensure_enabled()?;
        self.engine.unset();
        Ok(self)
    }
}
