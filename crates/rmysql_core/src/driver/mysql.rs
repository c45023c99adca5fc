//! Driver backed by the `mysql` crate.

use super::{Connection, Credentials, Driver, PreparedStatement};
use crate::config::ConnectOptions;
use crate::dsn::DataSource;
use crate::error::{CoreError, CoreResult};
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};

/// A driver that speaks the MySQL protocol through the `mysql` crate.
#[derive(Debug, Default)]
pub struct MysqlDriver;

impl MysqlDriver {
    /// Creates a new MySQL driver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds client options for a source, without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDsn`] if the rendered URL is rejected.
    pub fn opts(
        source: &DataSource,
        credentials: &Credentials,
        options: &ConnectOptions,
    ) -> CoreResult<Opts> {
        let url = source.to_url(&credentials.user, &credentials.password);
        let opts = Opts::from_url(&url).map_err(|e| CoreError::invalid_dsn(e.to_string()))?;

        let builder = OptsBuilder::from_opts(opts)
            .tcp_connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .write_timeout(options.write_timeout);
        Ok(builder.into())
    }
}

impl Driver for MysqlDriver {
    fn name(&self) -> &str {
        "rmysql"
    }

    fn connect(
        &self,
        source: &DataSource,
        credentials: &Credentials,
        options: &ConnectOptions,
    ) -> CoreResult<Box<dyn Connection>> {
        let opts = Self::opts(source, credentials, options)?;
        let conn = Conn::new(opts).map_err(|e| CoreError::connection(e.to_string()))?;
        Ok(Box::new(MysqlConnection { conn }))
    }
}

struct MysqlConnection {
    conn: Conn,
}

impl MysqlConnection {
    fn control(&mut self, statement: &str) -> CoreResult<()> {
        self.conn
            .query_drop(statement)
            .map_err(|e| CoreError::transaction(e.to_string()))
    }
}

impl Connection for MysqlConnection {
    fn begin(&mut self) -> CoreResult<()> {
        self.control("START TRANSACTION")
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.control("COMMIT")
    }

    fn rollback(&mut self) -> CoreResult<()> {
        self.control("ROLLBACK")
    }

    fn prepare(&mut self, query: &str) -> CoreResult<Box<dyn PreparedStatement>> {
        let statement = self
            .conn
            .prep(query)
            .map_err(|e| CoreError::prepare(e.to_string()))?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();
        Ok(Box::new(MysqlStatement { statement, columns }))
    }

    fn ping(&mut self) -> CoreResult<()> {
        self.conn
            .query_drop("DO 1")
            .map_err(|e| CoreError::connection(e.to_string()))
    }
}

struct MysqlStatement {
    statement: mysql::Statement,
    columns: Vec<String>,
}

impl PreparedStatement for MysqlStatement {
    fn id(&self) -> u32 {
        self.statement.id()
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn param_count(&self) -> usize {
        usize::from(self.statement.num_params())
    }
}
