//! Named driver registry.
//!
//! A [`DriverRegistry`] is immutable once built. The process-wide registry
//! is write-once: [`install`] succeeds only before anything has looked a
//! driver up through [`global`] or [`get_driver`], which otherwise
//! initialise it with the built-in drivers.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use super::{BinaryDriver, Driver, JsonDriver};
use crate::config::RegistryConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    drivers: IndexMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// `binary` and `json` with default options.
    pub fn with_defaults() -> Self {
        Self::from_config(&RegistryConfig::default())
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        let mut drivers: IndexMap<String, Arc<dyn Driver>> = IndexMap::with_capacity(2);
        drivers.insert(
            BinaryDriver::NAME.to_owned(),
            Arc::new(BinaryDriver::new(config.binary)),
        );
        drivers.insert(
            JsonDriver::NAME.to_owned(),
            Arc::new(JsonDriver::new(config.json)),
        );
        Self { drivers }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DriverNotFound(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    drivers: IndexMap<String, Arc<dyn Driver>>,
}

impl RegistryBuilder {
    /// Starts from the built-in drivers configured by `config`.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            drivers: DriverRegistry::from_config(config).drivers,
        }
    }

    pub fn register(self, driver: impl Driver + 'static) -> Result<Self> {
        self.register_arc(Arc::new(driver))
    }

    pub fn register_arc(mut self, driver: Arc<dyn Driver>) -> Result<Self> {
        let name = driver.name().to_owned();
        if self.drivers.contains_key(&name) {
            return Err(Error::DuplicateDriver(name));
        }
        tracing::info!(
            target: "stackcast::registry",
            driver = %name,
            artifact = driver.artifact_kind().name(),
            "driver registered"
        );
        self.drivers.insert(name, driver);
        Ok(self)
    }

    pub fn build(self) -> DriverRegistry {
        DriverRegistry {
            drivers: self.drivers,
        }
    }
}

static GLOBAL: OnceLock<DriverRegistry> = OnceLock::new();

/// Installs `registry` as the process-wide registry.
///
/// Fails with [`Error::RegistryFrozen`] once the global registry exists.
pub fn install(registry: DriverRegistry) -> Result<()> {
    let names: Vec<String> = registry.names().map(str::to_owned).collect();
    GLOBAL.set(registry).map_err(|_| Error::RegistryFrozen)?;
    tracing::info!(target: "stackcast::registry", drivers = ?names, "registry installed");
    Ok(())
}

/// The process-wide registry, initialised with the built-in drivers on first
/// use.
pub fn global() -> &'static DriverRegistry {
    GLOBAL.get_or_init(DriverRegistry::with_defaults)
}

/// Looks `name` up in the process-wide registry.
pub fn get_driver(name: &str) -> Result<Arc<dyn Driver>> {
    global().get(name)
}
