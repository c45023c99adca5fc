//! Error types for the rmysql driver core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The kind of resource a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A connection handle.
    Connection,
    /// A prepared statement handle.
    Statement,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => f.write_str("connection"),
            Self::Statement => f.write_str("statement"),
        }
    }
}

/// Coarse classification of a [`CoreError`].
///
/// This is the set of failure categories callers across the C boundary can
/// distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input text was not valid UTF-8.
    Utf8,
    /// The data source name could not be parsed.
    Url,
    /// Network, authentication or capacity failure while connecting.
    Connection,
    /// The backend rejected a query at prepare time.
    Prepare,
    /// The backend rejected a transaction control request.
    Transaction,
    /// A handle was null, released, or never issued, or an index into a
    /// handle's contents was out of range.
    Handle,
}

/// Errors that can occur in rmysql core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An input string was not valid UTF-8.
    #[error("invalid UTF-8 in {field}")]
    Utf8 {
        /// Which argument was malformed.
        field: &'static str,
    },

    /// The data source name is malformed.
    #[error("invalid DSN: {message}")]
    InvalidDsn {
        /// Description of the parse failure.
        message: String,
    },

    /// The DSN names a driver that is not registered.
    #[error("unknown driver: {name}")]
    UnknownDriver {
        /// The requested driver name.
        name: String,
    },

    /// Establishing the session failed.
    #[error("connection failed: {message}")]
    Connection {
        /// Backend or transport message.
        message: String,
    },

    /// The backend refused to prepare a statement.
    #[error("prepare failed: {message}")]
    Prepare {
        /// Backend message.
        message: String,
    },

    /// A transaction control request failed.
    #[error("transaction error: {message}")]
    Transaction {
        /// Backend message, or the gateway's own reason.
        message: String,
    },

    /// The handle does not refer to a live resource.
    #[error("invalid {kind} handle")]
    InvalidHandle {
        /// The kind of handle that failed to resolve.
        kind: HandleKind,
    },

    /// A result column index is past the end of the statement's columns.
    #[error("column index {index} out of range ({count} columns)")]
    ColumnOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of result columns.
        count: usize,
    },
}

impl CoreError {
    /// Creates an invalid DSN error.
    pub fn invalid_dsn(message: impl Into<String>) -> Self {
        Self::InvalidDsn {
            message: message.into(),
        }
    }

    /// Creates an unknown driver error.
    pub fn unknown_driver(name: impl Into<String>) -> Self {
        Self::UnknownDriver { name: name.into() }
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a prepare error.
    pub fn prepare(message: impl Into<String>) -> Self {
        Self::Prepare {
            message: message.into(),
        }
    }

    /// Creates a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates an invalid handle error.
    pub fn invalid_handle(kind: HandleKind) -> Self {
        Self::InvalidHandle { kind }
    }

    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Utf8 { .. } => ErrorKind::Utf8,
            Self::InvalidDsn { .. } | Self::UnknownDriver { .. } => ErrorKind::Url,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Prepare { .. } => ErrorKind::Prepare,
            Self::Transaction { .. } => ErrorKind::Transaction,
            Self::InvalidHandle { .. } | Self::ColumnOutOfRange { .. } => ErrorKind::Handle,
        }
    }
}
