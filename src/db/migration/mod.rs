use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::schema::{Migration, MigrationStep};
use crate::error::NamePulseError;

/// Read the recorded schema version.
///
/// A missing or unreadable version marker means the store has never been set
/// up, which is reported as version 0 rather than as an error.
pub fn read_schema_version(conn: &Connection) -> u32 {
    let result = conn
        .query_row("SELECT version FROM schema_version", [], |row| {
            row.get::<_, i64>(0)
        })
        .optional();

    match result {
        Ok(Some(version)) => match u32::try_from(version) {
            Ok(version) => {
                debug!("Schema version: {}", version);
                version
            }
            Err(_) => {
                warn!("Ignoring invalid schema version {}", version);
                0
            }
        },
        Ok(None) => {
            info!("Schema version marker is empty");
            0
        }
        Err(e) => {
            info!("Database not set up yet ({})", e);
            0
        }
    }
}

/// Bring the store up to the last entry of `migrations`.
///
/// Each step runs in autocommit mode, so it is durable as soon as it returns.
/// The version marker is updated only after every step of a version has
/// succeeded; on failure the marker still names the last complete version and
/// the next call resumes from there.
///
/// Returns the schema version after migration.
pub fn migrate(conn: &Connection, migrations: &[Migration]) -> Result<u32, NamePulseError> {
    let latest = migrations.len().saturating_sub(1) as u32;
    let current = read_schema_version(conn);

    if current > latest {
        return Err(NamePulseError::SchemaTooNew {
            found: current,
            latest,
        });
    }

    if current == latest {
        return Ok(current);
    }

    for migration in &migrations[(current as usize + 1)..] {
        info!(
            "Applying schema migrations for version {}: {}",
            migration.version, migration.description
        );

        for step in migration.steps {
            apply_step(conn, step).map_err(|source| NamePulseError::Migration {
                version: migration.version,
                source,
            })?;
        }

        set_schema_version(conn, migration.version).map_err(|source| {
            NamePulseError::Migration {
                version: migration.version,
                source,
            }
        })?;
    }

    Ok(latest)
}

fn apply_step(conn: &Connection, step: &MigrationStep) -> rusqlite::Result<()> {
    match step {
        MigrationStep::Sql(sql) => {
            debug!("Applying sql: {}", sql);
            conn.execute(sql, [])?;
        }
        MigrationStep::AddColumn {
            table,
            column,
            definition,
        } => {
            if column_exists(conn, table, column)? {
                debug!("Column {}.{} already present", table, column);
            } else {
                let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
                debug!("Applying sql: {}", sql);
                conn.execute(&sql, [])?;
            }
        }
    }
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    info!("Setting database schema version to {}", version);

    let updated = conn.execute("UPDATE schema_version SET version = ?", [version])?;
    if updated == 0 {
        conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    }
    Ok(())
}
