//! The gateway: handle-addressed access to driver sessions.
//!
//! Every operation exposed over the C ABI is implemented here first, as a
//! safe Rust method taking and returning typed handles. The FFI layer only
//! converts pointers and strings.

use crate::config::GatewayConfig;
use crate::driver::{Connection, Credentials, DriverRegistry, PreparedStatement};
use crate::dsn::DataSource;
use crate::error::{CoreError, CoreResult, HandleKind};
use crate::handle::{HandleArena, RawHandle};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Tracing target for events requested through the debug attribute.
pub const DEBUG_TARGET: &str = "rmysql::debug";

/// Handle of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(RawHandle);

/// Handle of a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId(RawHandle);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// Wraps a raw arena handle.
            pub fn from_raw(raw: RawHandle) -> Self {
                Self(raw)
            }

            /// Returns the raw arena handle.
            pub fn raw(self) -> RawHandle {
                self.0
            }
        }
    };
}

impl_id!(ConnectionId);
impl_id!(StatementId);

struct Session {
    driver: String,
    conn: Box<dyn Connection>,
    in_transaction: bool,
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.conn.rollback() {
                warn!(driver = %self.driver, error = %e, "rollback on disconnect failed");
            }
        }
    }
}

struct StatementEntry {
    connection: ConnectionId,
    inner: Box<dyn PreparedStatement>,
}

/// Owns every live connection and statement handed out to callers.
///
/// # Thread Safety
///
/// The handle tables are guarded separately from the sessions: a slow
/// backend call on one connection holds only that connection's lock.
pub struct Gateway {
    registry: DriverRegistry,
    config: GatewayConfig,
    connections: Mutex<HandleArena<Arc<Mutex<Session>>>>,
    statements: Mutex<HandleArena<StatementEntry>>,
}

impl Gateway {
    /// Creates a gateway over the given drivers.
    #[must_use]
    pub fn new(registry: DriverRegistry, config: GatewayConfig) -> Self {
        Self {
            registry,
            config,
            connections: Mutex::new(HandleArena::new()),
            statements: Mutex::new(HandleArena::new()),
        }
    }

    /// Creates a gateway with the built-in drivers and default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DriverRegistry::with_defaults(), GatewayConfig::default())
    }

    /// Returns the process-wide gateway used by the C ABI.
    ///
    /// It is created on first use with the built-in drivers and
    /// [`GatewayConfig::from_env`].
    pub fn global() -> &'static Gateway {
        static GLOBAL: OnceLock<Gateway> = OnceLock::new();
        GLOBAL.get_or_init(|| Self::new(DriverRegistry::with_defaults(), GatewayConfig::from_env()))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Parses `dsn`, opens a session with the driver it names, and returns
    /// its handle.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidDsn`] / [`CoreError::UnknownDriver`] for a bad DSN
    /// - [`CoreError::Connection`] for network, authentication or capacity
    ///   failure
    pub fn connect(&self, dsn: &str, user: &str, password: &str) -> CoreResult<ConnectionId> {
        let source = DataSource::parse(dsn)?;
        let driver = self.registry.get(&source.driver)?;
        self.check_capacity()?;

        let credentials = Credentials::new(user, password);
        let conn = driver
            .connect(&source, &credentials, &self.config.connect)
            .inspect_err(|e| {
                warn!(driver = %source.driver, host = %source.host, error = %e, "connect failed");
            })?;

        let session = Session {
            driver: source.driver.clone(),
            conn,
            in_transaction: false,
        };

        let handle = {
            let mut connections = self.connections.lock();
            if self.at_capacity(connections.len()) {
                None
            } else {
                connections.insert(Arc::new(Mutex::new(session)))
            }
        }
        .map(ConnectionId)
        .ok_or_else(|| self.capacity_error())?;

        debug!(
            driver = %source.driver,
            host = %source.host,
            database = source.database.as_deref().unwrap_or(""),
            handle = ?handle,
            "connected"
        );
        Ok(handle)
    }

    fn at_capacity(&self, live: usize) -> bool {
        let max = self.config.max_connections;
        max > 0 && live >= max
    }

    fn capacity_error(&self) -> CoreError {
        CoreError::connection(format!(
            "too many connections (limit {})",
            self.config.max_connections
        ))
    }

    fn check_capacity(&self) -> CoreResult<()> {
        if self.at_capacity(self.connections.lock().len()) {
            return Err(self.capacity_error());
        }
        Ok(())
    }

    fn session(&self, id: ConnectionId) -> CoreResult<Arc<Mutex<Session>>> {
        self.connections
            .lock()
            .get(id.0)
            .cloned()
            .ok_or_else(|| CoreError::invalid_handle(HandleKind::Connection))
    }

    /// Releases a connection.
    ///
    /// An open transaction is rolled back. Statements prepared on the
    /// connection stay valid until destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] if the handle was already
    /// released or never issued.
    pub fn disconnect(&self, id: ConnectionId) -> CoreResult<()> {
        let session = self
            .connections
            .lock()
            .remove(id.0)
            .ok_or_else(|| CoreError::invalid_handle(HandleKind::Connection))?;
        drop(session);
        debug!(handle = ?id, "disconnected");
        Ok(())
    }

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transaction`] if a transaction is already open on
    /// this connection or the backend rejects the request.
    pub fn begin_work(&self, id: ConnectionId) -> CoreResult<()> {
        let session = self.session(id)?;
        let mut session = session.lock();
        if session.in_transaction {
            return Err(CoreError::transaction("transaction already active"));
        }
        session.conn.begin()?;
        session.in_transaction = true;
        trace!(handle = ?id, "transaction started");
        Ok(())
    }

    /// Commits the open transaction.
    ///
    /// The connection leaves transaction state even if the commit fails.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transaction`] if no transaction is open or the
    /// backend rejects the commit.
    pub fn commit(&self, id: ConnectionId) -> CoreResult<()> {
        self.finish(id, "commit", |conn| conn.commit())
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transaction`] if no transaction is open or the
    /// backend rejects the rollback.
    pub fn rollback(&self, id: ConnectionId) -> CoreResult<()> {
        self.finish(id, "rollback", |conn| conn.rollback())
    }

    fn finish(
        &self,
        id: ConnectionId,
        action: &'static str,
        op: impl FnOnce(&mut dyn Connection) -> CoreResult<()>,
    ) -> CoreResult<()> {
        let session = self.session(id)?;
        let mut session = session.lock();
        if !std::mem::replace(&mut session.in_transaction, false) {
            return Err(CoreError::transaction("no transaction"));
        }
        op(session.conn.as_mut())?;
        trace!(handle = ?id, action, "transaction finished");
        Ok(())
    }

    /// Returns whether a transaction is open on the connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for a released handle.
    pub fn in_transaction(&self, id: ConnectionId) -> CoreResult<bool> {
        Ok(self.session(id)?.lock().in_transaction)
    }

    /// Checks that the connection's session is still alive.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connection`] if the backend does not answer.
    pub fn ping(&self, id: ConnectionId) -> CoreResult<()> {
        self.session(id)?.lock().conn.ping()
    }

    /// Prepares a statement on a connection.
    ///
    /// With `debug` set, the outcome is reported at `info` level on the
    /// [`DEBUG_TARGET`] tracing target.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Prepare`] if the backend rejects the query.
    pub fn prepare(&self, id: ConnectionId, query: &str, debug: bool) -> CoreResult<StatementId> {
        let started = Instant::now();
        let session = self.session(id)?;
        let prepared = session.lock().conn.prepare(query);

        let inner = match prepared {
            Ok(inner) => inner,
            Err(e) => {
                if debug {
                    info!(target: DEBUG_TARGET, connection = ?id, query, error = %e, "prepare failed");
                }
                return Err(e);
            }
        };

        let server_id = inner.id();
        let columns = inner.columns().len();
        let params = inner.param_count();
        let handle = self
            .statements
            .lock()
            .insert(StatementEntry {
                connection: id,
                inner,
            })
            .map(StatementId)
            .ok_or_else(|| CoreError::prepare("statement table full"))?;

        let elapsed_us = started.elapsed().as_micros() as u64;
        if debug {
            info!(
                target: DEBUG_TARGET,
                connection = ?id,
                statement = ?handle,
                server_id,
                columns,
                params,
                elapsed_us,
                query,
                "prepared statement"
            );
        } else {
            trace!(connection = ?id, statement = ?handle, server_id, "prepared statement");
        }
        Ok(handle)
    }

    /// Releases a prepared statement.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] if the handle was already
    /// released or never issued.
    pub fn statement_destroy(&self, id: StatementId) -> CoreResult<()> {
        let entry = self
            .statements
            .lock()
            .remove(id.0)
            .ok_or_else(|| CoreError::invalid_handle(HandleKind::Statement))?;
        trace!(statement = ?id, connection = ?entry.connection, "statement destroyed");
        Ok(())
    }

    fn with_statement<R>(
        &self,
        id: StatementId,
        f: impl FnOnce(&StatementEntry) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let statements = self.statements.lock();
        let entry = statements
            .get(id.0)
            .ok_or_else(|| CoreError::invalid_handle(HandleKind::Statement))?;
        f(entry)
    }

    /// Returns the result column names of a statement.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for a released handle.
    pub fn statement_columns(&self, id: StatementId) -> CoreResult<Vec<String>> {
        self.with_statement(id, |entry| Ok(entry.inner.columns().to_vec()))
    }

    /// Returns one result column name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for a released handle and
    /// [`CoreError::ColumnOutOfRange`] for a bad index.
    pub fn statement_column_name(&self, id: StatementId, index: usize) -> CoreResult<String> {
        self.with_statement(id, |entry| {
            let columns = entry.inner.columns();
            columns
                .get(index)
                .cloned()
                .ok_or(CoreError::ColumnOutOfRange {
                    index,
                    count: columns.len(),
                })
        })
    }

    /// Returns the number of `?` parameters of a statement.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for a released handle.
    pub fn statement_param_count(&self, id: StatementId) -> CoreResult<usize> {
        self.with_statement(id, |entry| Ok(entry.inner.param_count()))
    }

    /// Returns the connection a statement was prepared on.
    ///
    /// That connection may have been released since.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for a released handle.
    pub fn statement_connection(&self, id: StatementId) -> CoreResult<ConnectionId> {
        self.with_statement(id, |entry| Ok(entry.connection))
    }

    /// Returns true if the connection handle is live.
    pub fn is_live_connection(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains(id.0)
    }

    /// Returns true if the statement handle is live.
    pub fn is_live_statement(&self, id: StatementId) -> bool {
        self.statements.lock().contains(id.0)
    }

    /// Returns the number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns the number of live statements.
    pub fn statement_count(&self) -> usize {
        self.statements.lock().len()
    }

    /// Releases every statement and connection.
    ///
    /// Returns the number of connections that were closed. All outstanding
    /// handles become invalid.
    pub fn shutdown(&self) -> usize {
        let statements = self.statements.lock().drain();
        let sessions = self.connections.lock().drain();
        let closed = sessions.len();
        drop(statements);
        drop(sessions);
        if closed > 0 {
            debug!(closed, "gateway shut down");
        }
        closed
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("connections", &self.connection_count())
            .field("statements", &self.statement_count())
            .finish()
    }
}
