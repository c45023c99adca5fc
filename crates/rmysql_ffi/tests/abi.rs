//! Integration tests driving the C ABI the way a C caller would.

use proptest::prelude::*;
use rmysql_ffi::{
    rmysql_begin_work, rmysql_commit, rmysql_conn_is_valid, rmysql_connect, rmysql_disconnect,
    rmysql_disconnect_checked, rmysql_free_string, rmysql_in_transaction, rmysql_prepare,
    rmysql_statement_column_count, rmysql_statement_column_name, rmysql_statement_destroy,
    rmysql_statement_is_valid, Attribs, ConnHandle, Error, ErrorCode, StatementHandle,
    MESSAGE_CAPACITY,
};
use std::ffi::CString;
use std::ptr;

fn cstring(s: &str) -> CString {
    CString::new(s).unwrap()
}

fn connect(dsn: &str, user: &str, password: &str) -> Result<*mut ConnHandle, Error> {
    let (dsn, user, password) = (cstring(dsn), cstring(user), cstring(password));
    let mut error = Error::new();
    let conn = unsafe { rmysql_connect(dsn.as_ptr(), user.as_ptr(), password.as_ptr(), &mut error) };
    if conn.is_null() {
        Err(error)
    } else {
        Ok(conn)
    }
}

fn prepare(conn: *mut ConnHandle, query: &str, debug: bool) -> Result<*mut StatementHandle, Error> {
    let query = cstring(query);
    let attribs = Attribs { debug };
    let mut error = Error::new();
    let stmt = unsafe { rmysql_prepare(conn, query.as_ptr(), &attribs, &mut error) };
    if stmt.is_null() {
        Err(error)
    } else {
        Ok(stmt)
    }
}

/// The scenario from the C demo, against the built-in memory driver.
#[test]
fn demo_scenario() {
    let conn = connect("dbi:memory:database=test;host=localhost", "test", "slapjack").unwrap();

    let mut error = Error::new();
    assert!(unsafe { rmysql_begin_work(conn, &mut error) });

    let stmt = prepare(conn, "SELECT 42", true).unwrap();
    assert_eq!(rmysql_statement_column_count(stmt), 1);
    let name = unsafe { rmysql_statement_column_name(stmt, 0, &mut error) };
    assert_eq!(unsafe { name.as_str() }, Some("42"));
    unsafe { rmysql_free_string(name) };

    rmysql_statement_destroy(stmt);
    rmysql_disconnect(conn);

    assert!(!rmysql_statement_is_valid(stmt));
    assert!(!rmysql_conn_is_valid(conn));
}

#[test]
fn unreachable_host_is_a_connection_error() {
    let error = connect("dbi:memory:database=test;host=10.0.0.15", "test", "slapjack").unwrap_err();
    assert_eq!(error.code, ErrorCode::ConnectionError);
    assert!(error.message().contains("10.0.0.15"));
}

#[cfg(feature = "mysql")]
#[test]
fn closed_port_is_a_connection_error() {
    let error = connect("dbi:rmysql:database=test;host=127.0.0.1;port=1", "test", "slapjack")
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ConnectionError);
    assert!(!error.message().is_empty());
}

#[test]
fn url_delimiters_in_host_are_a_url_error() {
    for dsn in [
        "dbi:rmysql:host=db.internal/other;database=test",
        "dbi:rmysql:host=attacker.example@db.internal;database=test",
        "dbi:memory:host=localhost#x",
    ] {
        let error = connect(dsn, "test", "slapjack").unwrap_err();
        assert_eq!(error.code, ErrorCode::UrlError, "{dsn}");
    }
}

#[test]
fn bad_credentials_are_a_connection_error() {
    let error = connect("dbi:memory:", "", "").unwrap_err();
    assert_eq!(error.code, ErrorCode::ConnectionError);
}

#[test]
fn begin_work_twice() {
    let conn = connect("dbi:memory:", "test", "slapjack").unwrap();
    let mut error = Error::new();

    assert!(unsafe { rmysql_begin_work(conn, &mut error) });
    assert!(!unsafe { rmysql_begin_work(conn, &mut error) });
    assert_eq!(error.code, ErrorCode::TransactionError);
    assert!(rmysql_in_transaction(conn));

    assert!(unsafe { rmysql_commit(conn, &mut error) });
    assert!(unsafe { rmysql_begin_work(conn, &mut error) });
    rmysql_disconnect(conn);
}

#[test]
fn double_disconnect() {
    let conn = connect("dbi:memory:", "test", "slapjack").unwrap();
    rmysql_disconnect(conn);
    rmysql_disconnect(conn);

    let mut error = Error::new();
    assert!(!unsafe { rmysql_disconnect_checked(conn, &mut error) });
    assert_eq!(error.code, ErrorCode::HandleError);
}

#[test]
fn released_slot_does_not_revive_old_handle() {
    let first = connect("dbi:memory:", "test", "slapjack").unwrap();
    rmysql_disconnect(first);
    let second = connect("dbi:memory:", "test", "slapjack").unwrap();

    assert_ne!(first, second);
    assert!(!rmysql_conn_is_valid(first));
    assert!(rmysql_conn_is_valid(second));

    let mut error = Error::new();
    assert!(!unsafe { rmysql_begin_work(first, &mut error) });
    assert_eq!(error.code, ErrorCode::HandleError);
    assert!(!rmysql_in_transaction(second));
    rmysql_disconnect(second);
}

#[test]
fn prepare_then_destroy() {
    let conn = connect("dbi:memory:", "test", "slapjack").unwrap();
    let stmt = prepare(conn, "SELECT id FROM t WHERE id = ?", false).unwrap();
    rmysql_statement_destroy(stmt);
    rmysql_statement_destroy(stmt);
    assert_eq!(rmysql_statement_column_count(stmt), -1);
    rmysql_disconnect(conn);
}

#[test]
fn prepare_rejection() {
    let conn = connect("dbi:memory:", "test", "slapjack").unwrap();
    let error = prepare(conn, "SELECT 'unterminated", true).unwrap_err();
    assert_eq!(error.code, ErrorCode::PrepareError);
    rmysql_disconnect(conn);
}

#[test]
fn long_message_is_truncated() {
    let host = "h".repeat(400);
    let error = connect(&format!("dbi:memory:host={host}"), "test", "x").unwrap_err();
    assert_eq!(error.code, ErrorCode::ConnectionError);
    assert_eq!(error.message().len(), MESSAGE_CAPACITY - 1);
    assert_eq!(error.message[MESSAGE_CAPACITY - 1], 0);
}

/// Live server check; run with `cargo test -- --ignored` next to a MySQL
/// instance reachable at 10.0.0.15.
#[cfg(feature = "mysql")]
#[test]
#[ignore]
fn live_server_scenario() {
    let conn = connect("dbi:rmysql:database=test;host=10.0.0.15", "test", "slapjack").unwrap();
    let mut error = Error::new();
    assert!(unsafe { rmysql_begin_work(conn, &mut error) }, "{}", error.message());
    let stmt = prepare(conn, "SELECT 42", true).unwrap();
    assert_eq!(rmysql_statement_column_count(stmt), 1);
    rmysql_statement_destroy(stmt);
    rmysql_disconnect(conn);
}

proptest! {
    #[test]
    fn segment_without_equals_is_url_error(segment in "[a-z][a-z0-9_]{0,15}") {
        let error = connect(&format!("dbi:memory:{segment}"), "test", "x").unwrap_err();
        prop_assert_eq!(error.code, ErrorCode::UrlError);
    }

    #[test]
    fn unknown_driver_is_url_error(name in "zz[a-z]{0,8}") {
        let error = connect(&format!("dbi:{name}:database=test"), "test", "x").unwrap_err();
        prop_assert_eq!(error.code, ErrorCode::UrlError);
    }

    #[test]
    fn bad_port_is_url_error(port in "[a-z]{1,5}|0|[7-9][0-9]{5}") {
        let error = connect(&format!("dbi:memory:port={port}"), "test", "x").unwrap_err();
        prop_assert_eq!(error.code, ErrorCode::UrlError);
    }

    #[test]
    fn garbage_handles_never_validate(raw in 1usize..) {
        // Tokens never issued by this process: generation 0 is never handed out.
        let index_only = raw & ((1usize << (usize::BITS / 2)) - 1);
        prop_assume!(index_only != 0);
        let handle = index_only as *mut ConnHandle;
        prop_assert!(!rmysql_conn_is_valid(handle));
        let mut error = Error::new();
        let began = unsafe { rmysql_begin_work(handle, &mut error) };
        prop_assert!(!began);
        prop_assert_eq!(error.code, ErrorCode::HandleError);
        rmysql_disconnect(handle);
    }
}

#[test]
fn null_arguments() {
    let mut error = Error::new();
    let conn = unsafe { rmysql_connect(ptr::null(), ptr::null(), ptr::null(), &mut error) };
    assert!(conn.is_null());
    assert_eq!(error.code, ErrorCode::Utf8Error);

    let stmt = unsafe { rmysql_prepare(ptr::null_mut(), ptr::null(), ptr::null(), &mut error) };
    assert!(stmt.is_null());
    assert_eq!(error.code, ErrorCode::HandleError);
}
