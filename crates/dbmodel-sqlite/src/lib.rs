//! SQLite backend for dbmodel.
//!
//! Wraps a [`rusqlite::Connection`] behind the [`Connection`] trait. Result
//! rows are read eagerly into a [`BufferedCursor`], so a cursor never holds
//! a borrow of the underlying statement.
//!
//! Writes run inside a transaction that is opened on the first statement
//! and closed by [`Connection::commit`] or [`Connection::rollback`].
//!
//! ```ignore
//! let config = DataSourceConfig::parse("adapter=sqlite db=:memory:")?;
//! let mut ds = DataSource::with_config(SqliteConnection::from_config(&config)?, config);
//! ```

use std::path::{Path, PathBuf};

use dbmodel_core::{BufferedCursor, Connection, Cursor, Dialect, Error, Result, Row, Value};
use dbmodel_session::DataSourceConfig;
use rusqlite::types::ValueRef;

/// Name of the connection string parameter holding the database path.
pub const DB_PARAM: &str = "db";

const IN_MEMORY: &str = ":memory:";

/// A SQLite database connection.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    path: Option<PathBuf>,
}

impl SqliteConnection {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path).map_err(Error::backend)?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(Error::backend)?;
        tracing::debug!("opened in-memory sqlite database");
        Ok(Self { conn, path: None })
    }

    /// Opens the database named by the `db` parameter of `config`.
    ///
    /// A missing `db` parameter or `db=:memory:` opens an in-memory
    /// database.
    pub fn from_config(config: &DataSourceConfig) -> Result<Self> {
        if config.adapter != Dialect::Sqlite {
            return Err(Error::Config(format!(
                "sqlite backend cannot serve adapter {}",
                config.adapter.name()
            )));
        }
        match config.get_param(DB_PARAM) {
            None | Some(IN_MEMORY) => Self::open_in_memory(),
            Some(path) => Self::open(path),
        }
    }

    /// The database file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn begin_if_needed(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            tracing::trace!("BEGIN");
            self.conn.execute_batch("BEGIN").map_err(Error::backend)?;
        }
        Ok(())
    }

    fn end_transaction(&mut self, sql: &str) -> Result<()> {
        if self.conn.is_autocommit() {
            tracing::trace!(sql, "no open transaction");
            return Ok(());
        }
        tracing::trace!("{sql}");
        self.conn.execute_batch(sql).map_err(Error::backend)
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>> {
        self.begin_if_needed()?;

        let mut stmt = self.conn.prepare(sql).map_err(Error::backend)?;
        let width = stmt.column_count();
        if width == 0 {
            let changed = stmt.execute([]).map_err(Error::backend)?;
            tracing::trace!(changed, "statement executed");
            return Ok(Box::new(BufferedCursor::empty()));
        }

        let mut rows = stmt.query([]).map_err(Error::backend)?;
        let mut buffered = Vec::new();
        while let Some(row) = rows.next().map_err(Error::backend)? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(from_sqlite))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(Error::backend)?;
            buffered.push(Row::new(values));
        }
        tracing::trace!(rows = buffered.len(), "query executed");
        Ok(Box::new(BufferedCursor::from(buffered)))
    }

    fn commit(&mut self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    fn close(&mut self) -> Result<()> {
        self.rollback()
    }
}

/// Maps a SQLite storage class onto a raw [`Value`]. Attribute types turn
/// these into their final shape when a record is hydrated.
fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::BigInt(v),
        ValueRef::Real(v) => Value::Double(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}
