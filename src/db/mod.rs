pub mod migration;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use log::{debug, error};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::NamePulseError;
use schema::{Migration, MIGRATIONS};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// An open connection whose schema is at the latest version.
///
/// There is no way to obtain a `Database` that has not been migrated: `open`
/// either returns a ready handle or an error, and on error the connection has
/// already been closed.
pub struct Database {
    conn: Connection,
    schema_version: u32,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self, NamePulseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!(
                        "Database folder '{}' does not exist or is not a directory",
                        parent.display()
                    ),
                )
                .into());
            }
        }

        debug!("Connecting to database {}", db_path.display());
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn, MIGRATIONS, true)
    }

    pub fn open_in_memory() -> Result<Self, NamePulseError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, MIGRATIONS, false)
    }

    fn from_connection(
        conn: Connection,
        migrations: &[Migration],
        use_wal: bool,
    ) -> Result<Self, NamePulseError> {
        let setup = Self::configure_connection(&conn, use_wal)
            .and_then(|_| migration::migrate(&conn, migrations));

        match setup {
            Ok(schema_version) => Ok(Database {
                conn,
                schema_version,
            }),
            Err(e) => {
                error!("Database bootstrap failed: {}", e);
                if let Err((_, close_err)) = conn.close() {
                    error!("Could not close database connection: {}", close_err);
                }
                Err(e)
            }
        }
    }

    fn configure_connection(conn: &Connection, use_wal: bool) -> Result<(), NamePulseError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        if use_wal {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;",
            )?;
        }
        Ok(())
    }

    pub fn close(self) -> Result<(), NamePulseError> {
        debug!("Disconnecting database");
        self.conn.close().map_err(|(_, e)| {
            error!("Could not close database connection: {}", e);
            NamePulseError::DatabaseError(e)
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Run `f` inside an IMMEDIATE transaction. The write lock is taken up
    /// front so reads inside `f` see the same state the writes apply to.
    /// The transaction commits only if `f` succeeds.
    pub fn immediate_transaction<T, F>(conn: &mut Connection, f: F) -> Result<T, NamePulseError>
    where
        F: FnOnce(&Transaction) -> Result<T, NamePulseError>,
    {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Row count of the filenames table.
    pub fn resource_count(&self) -> Result<i64, NamePulseError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM filenames", [], |row| row.get(0))?;
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn open_with_migrations(
        db_path: &Path,
        migrations: &[Migration],
    ) -> Result<Self, NamePulseError> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn, migrations, true)
    }
}
