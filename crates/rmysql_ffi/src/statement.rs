//! Prepared statement exports.

use crate::buffer::RmysqlString;
use crate::error::{catch, complete, Error, ErrorCode};
use crate::logging::ensure_debug_subscriber;
use crate::types::{c_str, Attribs, ConnHandle, StatementHandle};
use rmysql_core::Gateway;
use std::ffi::c_char;
use std::ptr;

/// Prepares a statement on a connection.
///
/// # Arguments
///
/// * `conn` - connection handle
/// * `query` - SQL text
/// * `attribs` - per-call attributes, or null for defaults
/// * `error` - receives the failure, untouched on success
///
/// # Returns
///
/// A statement handle, or null on failure.
///
/// # Safety
///
/// - `query` must be a valid NUL-terminated string
/// - `attribs` must be null or point to a valid `Attribs`
/// - `error` must be valid for writes
#[no_mangle]
pub unsafe extern "C" fn rmysql_prepare(
    conn: *mut ConnHandle,
    query: *const c_char,
    attribs: *const Attribs,
    error: *mut Error,
) -> *mut StatementHandle {
    if error.is_null() {
        tracing::error!("rmysql_prepare called with a null error pointer");
        return ptr::null_mut();
    }

    let attribs = Attribs::read(attribs);
    let result = catch("rmysql_prepare", ErrorCode::PrepareError, || {
        if attribs.debug {
            ensure_debug_subscriber();
        }
        let id = ConnHandle::to_id(conn)?;
        let query = c_str(query, "query")?;
        let stmt = Gateway::global().prepare(id, query, attribs.debug)?;
        Ok(StatementHandle::from_id(stmt))
    });
    complete(error, result, ptr::null_mut())
}

/// Releases a prepared statement.
///
/// Null is ignored; a handle that was already released is logged and
/// ignored.
#[no_mangle]
pub extern "C" fn rmysql_statement_destroy(stmt: *mut StatementHandle) {
    if stmt.is_null() {
        return;
    }
    let released = catch("rmysql_statement_destroy", ErrorCode::HandleError, || {
        let id = StatementHandle::to_id(stmt)?;
        Ok(Gateway::global().statement_destroy(id)?)
    });
    if let Err(e) = released {
        tracing::warn!(handle = stmt as usize, error = %e, "ignoring statement destroy");
    }
}

fn count(
    operation: &'static str,
    stmt: *const StatementHandle,
    f: impl FnOnce(&Gateway, rmysql_core::StatementId) -> rmysql_core::CoreResult<usize>,
) -> isize {
    catch(operation, ErrorCode::HandleError, || {
        let id = StatementHandle::to_id(stmt)?;
        Ok(f(Gateway::global(), id)?)
    })
    .ok()
    .and_then(|n| isize::try_from(n).ok())
    .unwrap_or(-1)
}

/// Returns the number of result columns, or -1 for an invalid handle.
#[no_mangle]
pub extern "C" fn rmysql_statement_column_count(stmt: *const StatementHandle) -> isize {
    count("rmysql_statement_column_count", stmt, |gateway, id| {
        gateway.statement_columns(id).map(|columns| columns.len())
    })
}

/// Returns the number of `?` parameters, or -1 for an invalid handle.
#[no_mangle]
pub extern "C" fn rmysql_statement_param_count(stmt: *const StatementHandle) -> isize {
    count("rmysql_statement_param_count", stmt, Gateway::statement_param_count)
}

/// Returns the name of a result column.
///
/// The string must be released with `rmysql_free_string`. On failure the
/// returned string is null.
///
/// # Safety
///
/// `error` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn rmysql_statement_column_name(
    stmt: *const StatementHandle,
    index: usize,
    error: *mut Error,
) -> RmysqlString {
    if error.is_null() {
        tracing::error!("rmysql_statement_column_name called with a null error pointer");
        return RmysqlString::null();
    }

    let result = catch("rmysql_statement_column_name", ErrorCode::HandleError, || {
        let id = StatementHandle::to_id(stmt)?;
        let name = Gateway::global().statement_column_name(id, index)?;
        RmysqlString::copy_out(&name, "column name")
    });
    complete(error, result, RmysqlString::null())
}

/// Returns whether `stmt` refers to a live statement.
#[no_mangle]
pub extern "C" fn rmysql_statement_is_valid(stmt: *const StatementHandle) -> bool {
    StatementHandle::to_id(stmt).is_ok_and(|id| Gateway::global().is_live_statement(id))
}
