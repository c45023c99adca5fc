//! Driver trait definitions and registry.
//!
//! The gateway knows nothing about wire protocols. Everything that talks to a
//! server sits behind [`Driver`], [`Connection`] and [`PreparedStatement`];
//! the DSN's `dbi:<driver>:` prefix selects an implementation from a
//! [`DriverRegistry`].
//!
//! # Implementors
//!
//! - [`MemoryDriver`] - server-less backend for tests and bindings
//! - [`MysqlDriver`] - the `mysql` crate (feature `mysql`)

mod memory;
#[cfg(feature = "mysql")]
mod mysql;

pub use memory::MemoryDriver;
#[cfg(feature = "mysql")]
pub use self::mysql::MysqlDriver;

use crate::config::ConnectOptions;
use crate::dsn::DataSource;
use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Login credentials for a connect call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A database driver able to open sessions.
///
/// Drivers must be `Send + Sync`; one instance serves every connect call
/// that names it.
pub trait Driver: Send + Sync {
    /// Returns the driver's registry name.
    fn name(&self) -> &str;

    /// Opens a session against the given source.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDsn`] if the source cannot be expressed
    /// for this driver, or [`CoreError::Connection`] on network or
    /// authentication failure.
    fn connect(
        &self,
        source: &DataSource,
        credentials: &Credentials,
        options: &ConnectOptions,
    ) -> CoreResult<Box<dyn Connection>>;
}

/// A live session with a backend.
///
/// Dropping a connection closes it; a transaction still open at that point
/// is rolled back by the backend.
pub trait Connection: Send {
    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transaction`] if the backend rejects the request.
    fn begin(&mut self) -> CoreResult<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transaction`] if the backend rejects the request.
    fn commit(&mut self) -> CoreResult<()>;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transaction`] if the backend rejects the request.
    fn rollback(&mut self) -> CoreResult<()>;

    /// Compiles a query on the server.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Prepare`] on syntax or semantic rejection.
    fn prepare(&mut self, query: &str) -> CoreResult<Box<dyn PreparedStatement>>;

    /// Checks that the session is still alive.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connection`] if the session is gone.
    fn ping(&mut self) -> CoreResult<()>;
}

/// A statement compiled by the backend.
pub trait PreparedStatement: Send {
    /// Backend-assigned statement id.
    fn id(&self) -> u32;

    /// Names of the result columns, empty for statements without a result set.
    fn columns(&self) -> &[String];

    /// Number of `?` parameters.
    fn param_count(&self) -> usize;
}

/// Drivers addressable by DSN prefix.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in driver.
    ///
    /// `memory` is always present. With the `mysql` feature, the `mysql`
    /// crate is registered as `rmysql` and `rust_mysql`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MemoryDriver::new()));
        #[cfg(feature = "mysql")]
        {
            let mysql: Arc<dyn Driver> = Arc::new(MysqlDriver::new());
            registry.register_as("rmysql", Arc::clone(&mysql));
            registry.register_as("rust_mysql", mysql);
        }
        registry
    }

    /// Registers a driver under its own name, replacing any previous one.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        let name = driver.name().to_string();
        self.drivers.insert(name, driver);
    }

    /// Registers a driver under an explicit name.
    pub fn register_as(&mut self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.insert(name.into(), driver);
    }

    /// Looks up a driver by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownDriver`] if no driver has that name.
    pub fn get(&self, name: &str) -> CoreResult<Arc<dyn Driver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::unknown_driver(name))
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
