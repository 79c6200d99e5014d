//! Named driver registration and default selection.

use tracing::debug;

use super::SessionDriver;
use crate::error::SessionError;
use crate::Result;

/// Drivers by name, kept in registration order, plus the default name.
///
/// The default name always points at a registered driver: it can only be
/// set through [`resolve`](Self::resolve) or
/// [`set_default`](Self::set_default), both of which check first, and
/// unregistering the default clears it.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: Vec<(String, Box<dyn SessionDriver>)>,
    default: Option<String>,
}

impl DriverRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver. An existing binding for `name` is never replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        driver: impl SessionDriver + 'static,
    ) -> Result<()> {
        self.register_boxed(name, Box::new(driver))
    }

    pub fn register_boxed(
        &mut self,
        name: impl Into<String>,
        driver: Box<dyn SessionDriver>,
    ) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(SessionError::DriverExists(name));
        }
        debug!(driver = %name, "driver registered");
        self.drivers.push((name, driver));
        Ok(())
    }

    /// Remove a binding and hand the driver back. The driver is not closed.
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn SessionDriver>> {
        let pos = self.position(name)?;
        if self.default.as_deref() == Some(name) {
            self.default = None;
        }
        debug!(driver = %name, "driver unregistered");
        Some(self.drivers.remove(pos).1)
    }

    /// Make `name` the default when given, then return the default driver.
    pub fn resolve(&mut self, name: Option<&str>) -> Result<&mut dyn SessionDriver> {
        if let Some(name) = name {
            self.set_default(name)?;
        }
        self.default_driver_mut()
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(SessionError::DriverNotFound(name.to_string()));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    /// Name of the default driver.
    pub fn default_name(&self) -> Result<&str> {
        self.default.as_deref().ok_or(SessionError::NoDefaultDriver)
    }

    pub fn default_driver(&self) -> Result<&dyn SessionDriver> {
        let name = self.default_name()?;
        self.get(name)
    }

    pub fn default_driver_mut(&mut self) -> Result<&mut dyn SessionDriver> {
        let name = self.default.clone().ok_or(SessionError::NoDefaultDriver)?;
        self.get_mut(&name)
    }

    pub fn get(&self, name: &str) -> Result<&dyn SessionDriver> {
        self.drivers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_ref())
            .ok_or_else(|| SessionError::DriverNotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut dyn SessionDriver> {
        match self.drivers.iter_mut().find(|(n, _)| n == name) {
            Some((_, driver)) => Ok(driver.as_mut()),
            None => Err(SessionError::DriverNotFound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.drivers.iter().position(|(n, _)| n == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.drivers.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn SessionDriver)> {
        self.drivers.iter().map(|(n, d)| (n.as_str(), d.as_ref()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut (dyn SessionDriver + 'static))> {
        self.drivers.iter_mut().map(|(n, d)| (n.as_str(), d.as_mut()))
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .field("default", &self.default)
            .finish()
    }
}
