//! Type definitions for FFI.

use crate::error::FfiError;
use rmysql_core::{ConnectionId, CoreError, HandleKind, RawHandle, StatementId};
use std::ffi::{c_char, CStr};

/// An opaque connection handle.
///
/// The pointer value is a generational token, not an address. Never
/// dereference it; a released handle is recognised and rejected.
#[repr(C)]
pub struct ConnHandle {
    _private: [u8; 0],
}

impl ConnHandle {
    pub(crate) fn from_id(id: ConnectionId) -> *mut ConnHandle {
        id.raw().pack() as *mut ConnHandle
    }

    pub(crate) fn to_id(handle: *const ConnHandle) -> Result<ConnectionId, CoreError> {
        RawHandle::unpack(handle as usize)
            .map(ConnectionId::from_raw)
            .ok_or_else(|| CoreError::invalid_handle(HandleKind::Connection))
    }
}

/// An opaque prepared statement handle.
///
/// Same token semantics as [`ConnHandle`].
#[repr(C)]
pub struct StatementHandle {
    _private: [u8; 0],
}

impl StatementHandle {
    pub(crate) fn from_id(id: StatementId) -> *mut StatementHandle {
        id.raw().pack() as *mut StatementHandle
    }

    pub(crate) fn to_id(handle: *const StatementHandle) -> Result<StatementId, CoreError> {
        RawHandle::unpack(handle as usize)
            .map(StatementId::from_raw)
            .ok_or_else(|| CoreError::invalid_handle(HandleKind::Statement))
    }
}

/// Per-call attributes for prepare.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attribs {
    /// Emit diagnostic tracing for this call.
    pub debug: bool,
}

impl Attribs {
    /// Reads attributes from an optional pointer; null means defaults.
    ///
    /// # Safety
    ///
    /// `attribs` must be null or point to a valid `Attribs`.
    pub(crate) unsafe fn read(attribs: *const Attribs) -> Attribs {
        attribs.as_ref().copied().unwrap_or_default()
    }
}

/// Borrows a C string argument as UTF-8.
///
/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn c_str<'a>(ptr: *const c_char, field: &'static str) -> Result<&'a str, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::NullString { field });
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| CoreError::Utf8 { field }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use rmysql_core::HandleArena;
    use std::ffi::CString;

    #[test]
    fn handle_round_trip() {
        let mut arena = HandleArena::new();
        let id = ConnectionId::from_raw(arena.insert(()).unwrap());

        let ptr = ConnHandle::from_id(id);
        assert!(!ptr.is_null());
        assert_eq!(ConnHandle::to_id(ptr).unwrap(), id);
    }

    #[test]
    fn null_handle_is_rejected() {
        let err = ConnHandle::to_id(std::ptr::null()).unwrap_err();
        assert_eq!(err.to_string(), "invalid connection handle");
        let err = StatementHandle::to_id(std::ptr::null()).unwrap_err();
        assert_eq!(err.to_string(), "invalid statement handle");
    }

    #[test]
    fn attribs_default_for_null() {
        let attribs = unsafe { Attribs::read(std::ptr::null()) };
        assert!(!attribs.debug);

        let set = Attribs { debug: true };
        assert!(unsafe { Attribs::read(&set) }.debug);
        assert_eq!(std::mem::size_of::<Attribs>(), 1);
    }

    #[test]
    fn c_str_checks() {
        let ok = CString::new("dbi:memory:").unwrap();
        assert_eq!(unsafe { c_str(ok.as_ptr(), "dsn") }.unwrap(), "dbi:memory:");

        let err = unsafe { c_str(std::ptr::null(), "user") }.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Utf8Error);
        assert_eq!(err.to_string(), "null pointer for user");

        let bad = CString::new(vec![b'a', 0xff, b'b']).unwrap();
        let err = unsafe { c_str(bad.as_ptr(), "password") }.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Utf8Error);
        assert_eq!(err.to_string(), "invalid UTF-8 in password");
    }
}
