//! Error codes and the caller-allocated error record.

use rmysql_core::{CoreError, ErrorKind};
use std::ffi::c_char;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error as ThisError;

/// Size of [`Error::message`] in bytes, including the NUL terminator.
pub const MESSAGE_CAPACITY: usize = 256;

/// Result code stored in [`Error::code`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Operation succeeded.
    Success = 0,
    /// An input string was not valid UTF-8 (or was null).
    Utf8Error = 1,
    /// The DSN could not be parsed or names an unknown driver.
    UrlError = 2,
    /// Network, authentication or capacity failure.
    ConnectionError = 3,
    /// The backend rejected the query.
    PrepareError = 4,
    /// The backend rejected a transaction request.
    TransactionError = 5,
    /// Null, released or foreign handle, or out-of-range column index.
    HandleError = 6,
}

impl ErrorCode {
    /// Returns true if the code indicates success.
    pub fn is_ok(self) -> bool {
        self == ErrorCode::Success
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Utf8 => ErrorCode::Utf8Error,
            ErrorKind::Url => ErrorCode::UrlError,
            ErrorKind::Connection => ErrorCode::ConnectionError,
            ErrorKind::Prepare => ErrorCode::PrepareError,
            ErrorKind::Transaction => ErrorCode::TransactionError,
            ErrorKind::Handle => ErrorCode::HandleError,
        }
    }
}

/// Error record filled in by failing calls.
///
/// The caller allocates it; the library writes it only on failure, so its
/// contents after a successful call are whatever the caller left there.
#[repr(C)]
pub struct Error {
    /// What went wrong.
    pub code: ErrorCode,
    /// NUL-terminated UTF-8 description, truncated to fit.
    pub message: [c_char; MESSAGE_CAPACITY],
}

impl Error {
    /// Creates a record holding [`ErrorCode::Success`] and an empty message.
    pub fn new() -> Self {
        Self {
            code: ErrorCode::Success,
            message: [0; MESSAGE_CAPACITY],
        }
    }

    /// Stores a code and message.
    pub fn set(&mut self, code: ErrorCode, message: &str) {
        self.code = code;
        ErrorMessage::new(message).copy_to(&mut self.message);
    }

    /// Writes a code and message through a raw pointer.
    ///
    /// # Safety
    ///
    /// `error` must be non-null and valid for writes. It may point at
    /// uninitialized memory: nothing is read through it.
    pub unsafe fn write(error: *mut Error, code: ErrorCode, message: &str) {
        std::ptr::addr_of_mut!((*error).code).write(code);
        let mut buffer = [0 as c_char; MESSAGE_CAPACITY];
        ErrorMessage::new(message).copy_to(&mut buffer);
        std::ptr::addr_of_mut!((*error).message).write(buffer);
    }

    /// Returns the message up to its NUL terminator.
    pub fn message(&self) -> String {
        let bytes: Vec<u8> = self
            .message
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for Error {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Error")
            .field("code", &self.code)
            .field("message", &self.message())
            .finish()
    }
}

/// A message bounded to fit [`Error::message`].
///
/// Truncation keeps at most `MESSAGE_CAPACITY - 1` bytes, cut back to a
/// UTF-8 character boundary, and always leaves room for the terminator.
/// Text after an interior NUL is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    bytes: [u8; MESSAGE_CAPACITY],
    len: usize,
    truncated: bool,
}

impl ErrorMessage {
    /// Bounds a message.
    pub fn new(text: &str) -> Self {
        let text = text.split('\0').next().unwrap_or_default();
        let mut len = text.len().min(MESSAGE_CAPACITY - 1);
        while !text.is_char_boundary(len) {
            len -= 1;
        }

        let mut bytes = [0u8; MESSAGE_CAPACITY];
        bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
        Self {
            bytes,
            len,
            truncated: len < text.len(),
        }
    }

    /// Returns the retained text.
    pub fn as_str(&self) -> &str {
        // `len` always sits on a char boundary of valid UTF-8
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    /// Returns the retained length in bytes, excluding the terminator.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the message is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if text was cut off.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn copy_to(&self, out: &mut [c_char; MESSAGE_CAPACITY]) {
        for (dst, &src) in out.iter_mut().zip(self.bytes.iter()) {
            *dst = src as c_char;
        }
    }
}

impl std::fmt::Debug for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ErrorMessage").field(&self.as_str()).finish()
    }
}

/// Failures detected at the FFI boundary.
#[derive(Debug, ThisError)]
pub enum FfiError {
    /// A required string argument was null.
    #[error("null pointer for {field}")]
    NullString {
        /// Which argument was null.
        field: &'static str,
    },

    /// A string could not be handed out because it contains a NUL byte.
    #[error("{field} contains an interior NUL byte")]
    InteriorNul {
        /// What was being returned.
        field: &'static str,
    },

    /// The operation panicked inside the library.
    #[error("internal panic in {operation}")]
    Panic {
        /// Exported function name.
        operation: &'static str,
        /// Code reported for the failed operation.
        code: ErrorCode,
    },

    /// Error from the driver core.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl FfiError {
    /// Returns the code reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NullString { .. } | Self::InteriorNul { .. } => ErrorCode::Utf8Error,
            Self::Panic { code, .. } => *code,
            Self::Core(e) => e.kind().into(),
        }
    }
}

/// Runs an export body, converting a panic into [`FfiError::Panic`].
pub(crate) fn catch<R>(
    operation: &'static str,
    code: ErrorCode,
    body: impl FnOnce() -> Result<R, FfiError>,
) -> Result<R, FfiError> {
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|_| {
        tracing::error!(operation, "panic caught at FFI boundary");
        Err(FfiError::Panic { operation, code })
    })
}

/// Unwraps a result, recording a failure in the caller's error record.
///
/// # Safety
///
/// `error` must be non-null and valid for writes.
pub(crate) unsafe fn complete<R>(error: *mut Error, result: Result<R, FfiError>, fallback: R) -> R {
    match result {
        Ok(value) => value,
        Err(e) => {
            Error::write(error, e.code(), &e.to_string());
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmysql_core::HandleKind;
    use std::mem::{align_of, size_of, MaybeUninit};

    #[test]
    fn code_values() {
        assert_eq!(ErrorCode::Success as i32, 0);
        assert_eq!(ErrorCode::Utf8Error as i32, 1);
        assert_eq!(ErrorCode::UrlError as i32, 2);
        assert_eq!(ErrorCode::ConnectionError as i32, 3);
        assert_eq!(ErrorCode::PrepareError as i32, 4);
        assert_eq!(ErrorCode::TransactionError as i32, 5);
        assert_eq!(ErrorCode::HandleError as i32, 6);
        assert!(ErrorCode::Success.is_ok());
        assert!(!ErrorCode::HandleError.is_ok());
    }

    #[test]
    fn record_layout() {
        assert_eq!(size_of::<ErrorCode>(), 4);
        assert_eq!(size_of::<Error>(), 4 + MESSAGE_CAPACITY);
        assert_eq!(align_of::<Error>(), 4);
        assert_eq!(std::mem::offset_of!(Error, message), 4);
    }

    #[test]
    fn kind_mapping() {
        let err = FfiError::from(CoreError::invalid_dsn("x"));
        assert_eq!(err.code(), ErrorCode::UrlError);
        let err = FfiError::from(CoreError::invalid_handle(HandleKind::Connection));
        assert_eq!(err.code(), ErrorCode::HandleError);
        assert_eq!(err.to_string(), "invalid connection handle");
        assert_eq!(
            FfiError::NullString { field: "dsn" }.code(),
            ErrorCode::Utf8Error
        );
    }

    #[test]
    fn short_message_round_trips() {
        let mut error = Error::new();
        error.set(ErrorCode::PrepareError, "syntax error");
        assert_eq!(error.code, ErrorCode::PrepareError);
        assert_eq!(error.message(), "syntax error");
        assert_eq!(error.message[12], 0);
    }

    #[test]
    fn long_message_is_truncated_and_terminated() {
        let text = "x".repeat(1000);
        let message = ErrorMessage::new(&text);
        assert_eq!(message.len(), MESSAGE_CAPACITY - 1);
        assert!(message.is_truncated());

        let mut error = Error::new();
        error.set(ErrorCode::ConnectionError, &text);
        assert_eq!(error.message[MESSAGE_CAPACITY - 1], 0);
        assert_eq!(error.message().len(), MESSAGE_CAPACITY - 1);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 254 ASCII bytes then a 3-byte character straddling the limit
        let text = format!("{}€tail", "a".repeat(254));
        let message = ErrorMessage::new(&text);
        assert_eq!(message.len(), 254);
        assert!(message.as_str().chars().all(|c| c == 'a'));
    }

    #[test]
    fn interior_nul_cuts_message() {
        let message = ErrorMessage::new("before\0after");
        assert_eq!(message.as_str(), "before");
        assert!(!message.is_truncated());
    }

    #[test]
    fn overwrite_clears_previous_message() {
        let mut error = Error::new();
        error.set(ErrorCode::ConnectionError, "a much longer first message");
        error.set(ErrorCode::UrlError, "short");
        assert_eq!(error.message(), "short");
        assert!(error.message[5..].iter().all(|&c| c == 0));
    }

    #[test]
    fn write_into_uninitialized_record() {
        let mut slot = MaybeUninit::<Error>::uninit();
        let error = unsafe {
            Error::write(slot.as_mut_ptr(), ErrorCode::Utf8Error, "invalid UTF-8 in dsn");
            slot.assume_init()
        };
        assert_eq!(error.code, ErrorCode::Utf8Error);
        assert_eq!(error.message(), "invalid UTF-8 in dsn");
    }

    #[test]
    fn catch_converts_panics() {
        let result: Result<(), FfiError> = catch("rmysql_test", ErrorCode::PrepareError, || {
            panic!("boom");
        });
        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PrepareError);
        assert_eq!(err.to_string(), "internal panic in rmysql_test");
    }

    #[test]
    fn complete_writes_only_on_failure() {
        let mut error = Error::new();
        error.set(ErrorCode::PrepareError, "left over");

        let value = unsafe { complete(&mut error, Ok(7), 0) };
        assert_eq!(value, 7);
        assert_eq!(error.code, ErrorCode::PrepareError);
        assert_eq!(error.message(), "left over");

        let value = unsafe {
            complete(
                &mut error,
                Err(FfiError::from(CoreError::transaction("no transaction"))),
                0,
            )
        };
        assert_eq!(value, 0);
        assert_eq!(error.code, ErrorCode::TransactionError);
        assert_eq!(error.message(), "transaction error: no transaction");
    }
}
