pub mod config;
pub mod settings;

pub use config::{ConnectionConfig, URL_SCHEME};
pub use settings::{ConnectionSettings, DEFAULT_CONNECTION_KEY};

use crate::core::Result;
use crate::storage::{InMemoryStorage, StorageEngine};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{Level, event};

/// Resolves connection keys to connection strings and connection strings to
/// storage engines.
///
/// Cheap to clone; clones share the same engines. Engines are keyed by
/// catalog name, so two connection strings naming the same catalog reach the
/// same data. Catalogs without a registered engine get an
/// [`InMemoryStorage`] on first use.
#[derive(Clone)]
pub struct DataSource {
    settings: Arc<ConnectionSettings>,
    engines: Arc<RwLock<HashMap<String, Arc<dyn StorageEngine>>>>,
}

impl DataSource {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            engines: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Data source whose `DefaultConnection` points at an in-memory catalog.
    pub fn in_memory(catalog: &str) -> Self {
        let url = ConnectionConfig::new(catalog).to_url();
        Self::new(ConnectionSettings::with_default(url))
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Route a catalog to a custom engine instead of the in-memory default.
    pub fn register_engine(
        &self,
        connection_string: &str,
        engine: Arc<dyn StorageEngine>,
    ) -> Result<()> {
        let config = ConnectionConfig::from_url(connection_string)?;
        let mut engines = self.engines.write()?;
        engines.insert(config.database, engine);
        Ok(())
    }

    pub fn connection_string(&self, connection_key: &str) -> Result<&str> {
        self.settings.connection_string(connection_key)
    }

    pub fn engine_for_key(&self, connection_key: &str) -> Result<Arc<dyn StorageEngine>> {
        let connection_string = self.settings.connection_string(connection_key)?;
        self.engine_for_connection_string(connection_string)
    }

    pub fn engine_for_connection_string(
        &self,
        connection_string: &str,
    ) -> Result<Arc<dyn StorageEngine>> {
        let config = ConnectionConfig::from_url(connection_string)?;

        if let Some(engine) = self.engines.read()?.get(&config.database) {
            return Ok(Arc::clone(engine));
        }

        let mut engines = self.engines.write()?;
        let engine = engines.entry(config.database.clone()).or_insert_with(|| {
            event!(Level::DEBUG, catalog = %config.database, "in-memory catalog opened");
            let engine: Arc<dyn StorageEngine> = Arc::new(InMemoryStorage::new(config.clone()));
            engine
        });
        Ok(Arc::clone(engine))
    }
}
