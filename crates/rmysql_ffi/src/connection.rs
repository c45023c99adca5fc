//! Connection exports.

use crate::error::{catch, complete, Error, ErrorCode};
use crate::types::{c_str, ConnHandle};
use rmysql_core::Gateway;
use std::ffi::c_char;
use std::ptr;

/// Opens a connection.
///
/// # Arguments
///
/// * `dsn` - data source, e.g. `"dbi:rmysql:database=test;host=10.0.0.15"`
/// * `user` - user name
/// * `password` - password
/// * `error` - receives the failure, untouched on success
///
/// # Returns
///
/// A connection handle, or null on failure.
///
/// # Safety
///
/// - `dsn`, `user` and `password` must be valid NUL-terminated strings
/// - `error` must be valid for writes
#[no_mangle]
pub unsafe extern "C" fn rmysql_connect(
    dsn: *const c_char,
    user: *const c_char,
    password: *const c_char,
    error: *mut Error,
) -> *mut ConnHandle {
    if error.is_null() {
        tracing::error!("rmysql_connect called with a null error pointer");
        return ptr::null_mut();
    }

    let result = catch("rmysql_connect", ErrorCode::ConnectionError, || {
        let dsn = c_str(dsn, "dsn")?;
        let user = c_str(user, "user")?;
        let password = c_str(password, "password")?;
        let id = Gateway::global().connect(dsn, user, password)?;
        Ok(ConnHandle::from_id(id))
    });
    complete(error, result, ptr::null_mut())
}

/// Closes a connection.
///
/// An open transaction is rolled back. Null is ignored; a handle that was
/// already released is logged and ignored.
#[no_mangle]
pub extern "C" fn rmysql_disconnect(conn: *mut ConnHandle) {
    if conn.is_null() {
        return;
    }
    let released = catch("rmysql_disconnect", ErrorCode::HandleError, || {
        let id = ConnHandle::to_id(conn)?;
        Ok(Gateway::global().disconnect(id)?)
    });
    if let Err(e) = released {
        tracing::warn!(handle = conn as usize, error = %e, "ignoring disconnect");
    }
}

/// Closes a connection, reporting an invalid or already released handle.
///
/// # Returns
///
/// `true` if the connection was closed.
///
/// # Safety
///
/// `error` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn rmysql_disconnect_checked(conn: *mut ConnHandle, error: *mut Error) -> bool {
    if error.is_null() {
        tracing::error!("rmysql_disconnect_checked called with a null error pointer");
        return false;
    }

    let result = catch("rmysql_disconnect_checked", ErrorCode::HandleError, || {
        let id = ConnHandle::to_id(conn)?;
        Gateway::global().disconnect(id)?;
        Ok(true)
    });
    complete(error, result, false)
}

/// Starts a transaction.
///
/// # Returns
///
/// `true` on success. Fails with `TransactionError` if one is already open.
///
/// # Safety
///
/// `error` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn rmysql_begin_work(conn: *mut ConnHandle, error: *mut Error) -> bool {
    if error.is_null() {
        tracing::error!("rmysql_begin_work called with a null error pointer");
        return false;
    }

    let result = catch("rmysql_begin_work", ErrorCode::TransactionError, || {
        let id = ConnHandle::to_id(conn)?;
        Gateway::global().begin_work(id)?;
        Ok(true)
    });
    complete(error, result, false)
}

/// Commits the open transaction.
///
/// # Safety
///
/// `error` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn rmysql_commit(conn: *mut ConnHandle, error: *mut Error) -> bool {
    if error.is_null() {
        tracing::error!("rmysql_commit called with a null error pointer");
        return false;
    }

    let result = catch("rmysql_commit", ErrorCode::TransactionError, || {
        let id = ConnHandle::to_id(conn)?;
        Gateway::global().commit(id)?;
        Ok(true)
    });
    complete(error, result, false)
}

/// Rolls back the open transaction.
///
/// # Safety
///
/// `error` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn rmysql_rollback(conn: *mut ConnHandle, error: *mut Error) -> bool {
    if error.is_null() {
        tracing::error!("rmysql_rollback called with a null error pointer");
        return false;
    }

    let result = catch("rmysql_rollback", ErrorCode::TransactionError, || {
        let id = ConnHandle::to_id(conn)?;
        Gateway::global().rollback(id)?;
        Ok(true)
    });
    complete(error, result, false)
}

/// Returns whether a transaction is open. False for invalid handles.
#[no_mangle]
pub extern "C" fn rmysql_in_transaction(conn: *const ConnHandle) -> bool {
    catch("rmysql_in_transaction", ErrorCode::HandleError, || {
        let id = ConnHandle::to_id(conn)?;
        Ok(Gateway::global().in_transaction(id)?)
    })
    .unwrap_or(false)
}

/// Returns whether `conn` refers to an open connection.
#[no_mangle]
pub extern "C" fn rmysql_conn_is_valid(conn: *const ConnHandle) -> bool {
    ConnHandle::to_id(conn).is_ok_and(|id| Gateway::global().is_live_connection(id))
}

/// Releases every open connection and statement.
///
/// All handles issued so far become invalid.
///
/// # Returns
///
/// The number of connections closed.
#[no_mangle]
pub extern "C" fn rmysql_shutdown() -> usize {
    catch("rmysql_shutdown", ErrorCode::HandleError, || {
        Ok(Gateway::global().shutdown())
    })
    .unwrap_or(0)
}

/// Returns the library version as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn rmysql_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}
