//! # rmysql FFI
//!
//! Stable C ABI for the rmysql MySQL client. The matching header is
//! `include/rmysql.h`.
//!
//! This crate provides:
//! - C-compatible function exports
//! - Opaque generational handles that reject stale and double releases
//! - Error code mapping into a fixed-size, caller-allocated error record
//! - Strings owned by the library and released by the caller
//!
//! ## Conventions
//!
//! Every fallible export takes a trailing `Error *`. On failure it returns
//! null (or `false`) and fills the record; on success the record is not
//! touched. Release functions accept null and ignore handles that were
//! already released.

#![warn(missing_docs)]

mod buffer;
mod connection;
mod error;
mod logging;
mod statement;
mod types;

pub use buffer::{rmysql_free_string, RmysqlString};
pub use connection::{
    rmysql_begin_work, rmysql_commit, rmysql_conn_is_valid, rmysql_connect, rmysql_disconnect,
    rmysql_disconnect_checked, rmysql_in_transaction, rmysql_rollback, rmysql_shutdown,
    rmysql_version,
};
pub use error::{Error, ErrorCode, ErrorMessage, FfiError, MESSAGE_CAPACITY};
pub use logging::{rmysql_init_logging, DEFAULT_FILTER, LOG_ENV};
pub use statement::{
    rmysql_prepare, rmysql_statement_column_count, rmysql_statement_column_name,
    rmysql_statement_destroy, rmysql_statement_is_valid, rmysql_statement_param_count,
};
pub use types::{Attribs, ConnHandle, StatementHandle};
