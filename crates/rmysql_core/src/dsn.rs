//! Data source name parsing.
//!
//! A DSN has the DBI shape `dbi:<driver>:<key>=<value>;<key>=<value>`.
//! The `dbi:<driver>:` prefix is optional; without it the default driver is
//! used. `database`, `host` and `port` are understood directly, everything
//! else is forwarded to the driver as an ordered list of parameters.

use crate::error::{CoreError, CoreResult};
use std::fmt::Write;

/// Driver used when the DSN carries no `dbi:<driver>:` prefix.
pub const DEFAULT_DRIVER: &str = "rmysql";

/// Host used when the DSN does not name one.
pub const DEFAULT_HOST: &str = "localhost";

const DBI_PREFIX: &str = "dbi:";

/// A parsed data source name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    /// Driver name from the `dbi:<driver>:` prefix.
    pub driver: String,
    /// Database (schema) to select after connecting.
    pub database: Option<String>,
    /// Server host name or address.
    pub host: String,
    /// Server TCP port, if given.
    pub port: Option<u16>,
    /// Remaining `key=value` pairs, in order of appearance.
    pub params: Vec<(String, String)>,
}

impl DataSource {
    /// Parses a DSN string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDsn`] if the string is empty, a segment is
    /// not a `key=value` pair, the host or a parameter key contains URL
    /// delimiters, the port is not a valid non-zero `u16`, or a well-known
    /// key appears twice.
    pub fn parse(dsn: &str) -> CoreResult<Self> {
        if dsn.trim().is_empty() {
            return Err(CoreError::invalid_dsn("empty DSN"));
        }

        let (driver, body) = match dsn.strip_prefix(DBI_PREFIX) {
            Some(rest) => {
                let (driver, body) = rest.split_once(':').ok_or_else(|| {
                    CoreError::invalid_dsn("expected `dbi:<driver>:` prefix")
                })?;
                if driver.is_empty() {
                    return Err(CoreError::invalid_dsn("empty driver name"));
                }
                (driver, body)
            }
            None => (DEFAULT_DRIVER, dsn),
        };

        let mut database = None;
        let mut host = None;
        let mut port = None;
        let mut params = Vec::new();

        for segment in body.split(';') {
            if segment.trim().is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                CoreError::invalid_dsn(format!("expected key=value, got `{segment}`"))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CoreError::invalid_dsn(format!("empty key in `{segment}`")));
            }

            match key {
                "database" | "db" | "dbname" => set_once(&mut database, "database", value)?,
                "host" | "hostname" => {
                    check_host(value)?;
                    set_once(&mut host, "host", value)?;
                }
                "port" => {
                    let parsed = value
                        .parse::<u16>()
                        .ok()
                        .filter(|p| *p != 0)
                        .ok_or_else(|| CoreError::invalid_dsn(format!("invalid port `{value}`")))?;
                    if port.replace(parsed).is_some() {
                        return Err(CoreError::invalid_dsn("duplicate key `port`"));
                    }
                }
                _ => {
                    check_param_key(key)?;
                    params.push((key.to_string(), value.to_string()));
                }
            }
        }

        Ok(Self {
            driver: driver.to_string(),
            database,
            host: host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            params,
        })
    }

    /// Returns the value of a forwarded parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Renders this source as a `mysql://` URL carrying the given credentials.
    ///
    /// User, password, database and parameters are percent-encoded. The host
    /// is validated by [`DataSource::parse`] and written as is.
    pub fn to_url(&self, user: &str, password: &str) -> String {
        let mut url = format!(
            "mysql://{}:{}@",
            urlencoding::encode(user),
            urlencoding::encode(password)
        );

        if self.host.contains(':') && !self.host.starts_with('[') {
            let _ = write!(url, "[{}]", self.host);
        } else {
            url.push_str(&self.host);
        }
        if let Some(port) = self.port {
            let _ = write!(url, ":{port}");
        }
        if let Some(database) = &self.database {
            let _ = write!(url, "/{}", urlencoding::encode(database));
        }
        for (i, (key, value)) in self.params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            let _ = write!(
                url,
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            );
        }
        url
    }
}

/// Accepts a host name, an IPv4 address, a bare IPv6 address, or a
/// bracketed IPv6 literal.
fn check_host(host: &str) -> CoreResult<()> {
    if host.is_empty() {
        return Err(CoreError::invalid_dsn("empty host"));
    }
    if let Some(rest) = host.strip_prefix('[') {
        let inner = rest.strip_suffix(']').ok_or_else(|| {
            CoreError::invalid_dsn(format!("unclosed `[` in host `{host}`"))
        })?;
        let literal = inner.contains(':')
            && inner
                .chars()
                .all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.');
        if !literal {
            return Err(CoreError::invalid_dsn(format!(
                "invalid IPv6 literal `{host}`"
            )));
        }
        return Ok(());
    }

    let delimiter = |c: &char| {
        c.is_whitespace() || matches!(*c, '/' | '@' | '?' | '#' | '[' | ']' | '%' | '\\')
    };
    if let Some(c) = host.chars().find(delimiter) {
        return Err(CoreError::invalid_dsn(format!(
            "invalid character {c:?} in host `{host}`"
        )));
    }
    Ok(())
}

fn check_param_key(key: &str) -> CoreResult<()> {
    if key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        Ok(())
    } else {
        Err(CoreError::invalid_dsn(format!("invalid parameter name `{key}`")))
    }
}

fn set_once(slot: &mut Option<String>, key: &str, value: &str) -> CoreResult<()> {
    if slot.replace(value.to_string()).is_some() {
        return Err(CoreError::invalid_dsn(format!("duplicate key `{key}`")));
    }
    Ok(())
}

impl std::str::FromStr for DataSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
