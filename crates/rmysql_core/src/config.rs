//! Gateway and connection configuration.

use std::time::Duration;

/// Environment variable for the TCP connect timeout, in milliseconds.
pub const ENV_CONNECT_TIMEOUT_MS: &str = "RMYSQL_CONNECT_TIMEOUT_MS";
/// Environment variable for the socket read timeout, in milliseconds.
pub const ENV_READ_TIMEOUT_MS: &str = "RMYSQL_READ_TIMEOUT_MS";
/// Environment variable for the socket write timeout, in milliseconds.
pub const ENV_WRITE_TIMEOUT_MS: &str = "RMYSQL_WRITE_TIMEOUT_MS";
/// Environment variable for the live connection limit.
pub const ENV_MAX_CONNECTIONS: &str = "RMYSQL_MAX_CONNECTIONS";

/// Options handed to a driver when it opens a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// TCP connect timeout (`None` = driver default).
    pub connect_timeout: Option<Duration>,
    /// Socket read timeout (`None` = blocking).
    pub read_timeout: Option<Duration>,
    /// Socket write timeout (`None` = blocking).
    pub write_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl ConnectOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the socket read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the socket write timeout.
    #[must_use]
    pub const fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Configuration for a [`crate::Gateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Options passed to every driver connect.
    pub connect: ConnectOptions,
    /// Maximum number of simultaneously live connections (0 = unlimited).
    pub max_connections: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connect: ConnectOptions::default(),
            max_connections: 0,
        }
    }
}

impl GatewayConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from `RMYSQL_*` environment variables.
    ///
    /// Unset or malformed variables keep their default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        let mut config = Self::default();
        if let Some(timeout) = millis(ENV_CONNECT_TIMEOUT_MS) {
            config.connect.connect_timeout = Some(timeout);
        }
        if let Some(timeout) = millis(ENV_READ_TIMEOUT_MS) {
            config.connect.read_timeout = Some(timeout);
        }
        if let Some(timeout) = millis(ENV_WRITE_TIMEOUT_MS) {
            config.connect.write_timeout = Some(timeout);
        }
        if let Some(max) = lookup(ENV_MAX_CONNECTIONS).and_then(|v| v.trim().parse().ok()) {
            config.max_connections = max;
        }
        config
    }

    /// Sets the connect options.
    #[must_use]
    pub fn connect_options(mut self, options: ConnectOptions) -> Self {
        self.connect = options;
        self
    }

    /// Sets the live connection limit.
    #[must_use]
    pub const fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }
}
