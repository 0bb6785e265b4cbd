use crate::{Dialect, Driver, Field, RecordType, Result, SqlConnection, SqlError};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use url::Url;

/// Process-wide registry of driver handles, one per database URL.
///
/// The only state shared across connections: initialization of a handle is
/// guarded by the mutex and happens once per key, subsequent acquisitions
/// return the cached handle. Owned explicitly by the service layer, no
/// hidden statics.
pub struct DriverRegistry {
    drivers: Mutex<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, url: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers
            .lock()
            .expect("driver registry lock poisoned")
            .insert(url.into(), driver);
    }

    /// The handle for `url`, initializing it through `init` on first use.
    pub fn acquire(
        &self,
        url: &str,
        init: impl FnOnce() -> Arc<dyn Driver>,
    ) -> Arc<dyn Driver> {
        let mut drivers = self
            .drivers
            .lock()
            .expect("driver registry lock poisoned");
        drivers.entry(url.to_owned()).or_insert_with(init).clone()
    }

    pub fn get(&self, url: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .lock()
            .expect("driver registry lock poisoned")
            .get(url)
            .cloned()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point: a database URL, its driver handle and the dialect used for
/// every statement built over connections it opens.
pub struct SqlService {
    url: String,
    driver: Arc<dyn Driver>,
    dialect: Arc<dyn Dialect>,
}

impl SqlService {
    pub fn new(
        url: impl Into<String>,
        driver: Arc<dyn Driver>,
        dialect: Arc<dyn Dialect>,
    ) -> Self {
        Self {
            url: url.into(),
            driver,
            dialect,
        }
    }

    /// Build against a registry, failing when no driver is registered for
    /// the URL.
    pub fn from_registry(
        url: impl Into<String>,
        registry: &DriverRegistry,
        dialect: Arc<dyn Dialect>,
    ) -> Result<Self> {
        let url = url.into();
        let driver = registry.get(&url).ok_or_else(|| SqlError::Connect {
            url: url.clone(),
            source: crate::DriverError::message("no driver registered for this URL"),
        })?;
        Ok(Self::new(url, driver, dialect))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL scheme, e.g. `postgres` in `postgres://localhost/app`.
    pub fn scheme(&self) -> Option<String> {
        Url::parse(&self.url).ok().map(|u| u.scheme().to_owned())
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn table_name(&self, ty: &RecordType) -> String {
        self.dialect.table_name(ty, true)
    }

    pub fn column_name(&self, field: &Field) -> String {
        self.dialect.column_name(field, true)
    }

    /// Open a transactional connection (explicit commit).
    pub fn connect(&self) -> Result<SqlConnection> {
        self.open(false)
    }

    /// Open a connection that commits after every statement.
    pub fn connect_auto_commit(&self) -> Result<SqlConnection> {
        self.open(true)
    }

    fn open(&self, auto_commit: bool) -> Result<SqlConnection> {
        log::debug!(
            "connecting to `{}` via driver `{}`",
            self.url,
            self.driver.name()
        );
        let conn = self
            .driver
            .connect(&self.url)
            .map_err(|e| SqlError::Connect {
                url: self.url.clone(),
                source: e,
            })?;
        Ok(SqlConnection::new(conn, self.dialect.clone(), auto_commit))
    }
}
