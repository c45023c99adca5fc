//! Library-owned strings returned to C.
//!
//! Column names and other text produced on the Rust side are copied into a
//! NUL-terminated heap buffer. The caller reads `ptr` (or `len` bytes of
//! it) and hands the whole value back to `rmysql_free_string`.

use crate::error::FfiError;
use std::ffi::{c_char, CStr, CString};

/// A NUL-terminated UTF-8 string allocated by rmysql.
///
/// A null `ptr` marks a failed call; such a value may still be passed to
/// `rmysql_free_string`.
#[derive(Debug)]
#[repr(C)]
pub struct RmysqlString {
    /// Start of the text, or null.
    pub ptr: *mut c_char,
    /// Byte length of the text, terminator excluded.
    pub len: usize,
}

impl RmysqlString {
    /// Copies `text` out to C.
    ///
    /// `what` names the value in the error reported when the text holds a
    /// NUL byte, which C could not see past.
    pub(crate) fn copy_out(text: &str, what: &'static str) -> Result<Self, FfiError> {
        let owned = CString::new(text).map_err(|_| FfiError::InteriorNul { field: what })?;
        Ok(Self {
            len: text.len(),
            ptr: owned.into_raw(),
        })
    }

    /// The value returned alongside an error.
    pub fn null() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
        }
    }

    /// Returns true for the failure value.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Borrows the text.
    ///
    /// # Safety
    ///
    /// The value must come from this library and not have been freed.
    pub unsafe fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            None
        } else {
            CStr::from_ptr(self.ptr).to_str().ok()
        }
    }
}

/// Releases a string returned by rmysql.
///
/// A null string is accepted and ignored.
///
/// # Safety
///
/// `string` must come from this library and be released at most once.
#[no_mangle]
pub unsafe extern "C" fn rmysql_free_string(string: RmysqlString) {
    if !string.ptr.is_null() {
        drop(CString::from_raw(string.ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn column_name_copied_out() {
        let name = RmysqlString::copy_out("total", "column name").unwrap();
        assert!(!name.is_null());
        assert_eq!(name.len, 5);
        assert_eq!(unsafe { name.as_str() }, Some("total"));
        unsafe { rmysql_free_string(name) };
    }

    #[test]
    fn multibyte_length_is_in_bytes() {
        let name = RmysqlString::copy_out("prix_€", "column name").unwrap();
        assert_eq!(name.len, "prix_€".len());
        unsafe { rmysql_free_string(name) };
    }

    #[test]
    fn null_value_is_freeable() {
        let name = RmysqlString::null();
        assert!(name.is_null());
        assert_eq!(unsafe { name.as_str() }, None);
        unsafe { rmysql_free_string(name) };
    }

    #[test]
    fn interior_nul_is_reported() {
        let err = RmysqlString::copy_out("col\0umn", "column name").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Utf8Error);
        assert_eq!(err.to_string(), "column name contains an interior NUL byte");
    }
}
