//! # rmysql Core
//!
//! Driver core behind the rmysql C API.
//!
//! This crate provides:
//! - DBI-style DSN parsing (`dbi:<driver>:database=..;host=..`)
//! - A driver seam with a MySQL backend and a server-less memory backend
//! - Generational handle arenas that reject stale and double releases
//! - The [`Gateway`], a safe Rust rendition of every C API operation
//!
//! ## Example
//!
//! ```rust
//! use rmysql_core::Gateway;
//!
//! let gateway = Gateway::with_defaults();
//! let conn = gateway.connect("dbi:memory:database=test", "test", "secret").unwrap();
//! gateway.begin_work(conn).unwrap();
//! let stmt = gateway.prepare(conn, "SELECT 42", false).unwrap();
//! assert_eq!(gateway.statement_columns(stmt).unwrap(), vec!["42".to_string()]);
//! gateway.statement_destroy(stmt).unwrap();
//! gateway.disconnect(conn).unwrap();
//! assert!(gateway.disconnect(conn).is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod driver;
mod dsn;
mod error;
mod gateway;
mod handle;

pub use config::{
    ConnectOptions, GatewayConfig, ENV_CONNECT_TIMEOUT_MS, ENV_MAX_CONNECTIONS,
    ENV_READ_TIMEOUT_MS, ENV_WRITE_TIMEOUT_MS,
};
#[cfg(feature = "mysql")]
pub use driver::MysqlDriver;
pub use driver::{Connection, Credentials, Driver, DriverRegistry, MemoryDriver, PreparedStatement};
pub use dsn::{DataSource, DEFAULT_DRIVER, DEFAULT_HOST};
pub use error::{CoreError, CoreResult, ErrorKind, HandleKind};
pub use gateway::{ConnectionId, Gateway, StatementId, DEBUG_TARGET};
pub use handle::{HandleArena, RawHandle};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
