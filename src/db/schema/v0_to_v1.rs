use super::MigrationStep;

//
// Schema Upgrade: Version 0 → 1
//
// Bootstraps an empty store: the version marker table (seeded with 0 so the
// driver can record the new version in place) and the filenames table.
//
// Every step is safe to re-run. If a previous attempt died after creating
// `schema_version` but before creating `filenames`, the version is still 0 and
// the whole list runs again.
//

pub const UPGRADE_0_TO_1: &[MigrationStep] = &[
    MigrationStep::Sql(
        "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
)",
    ),
    MigrationStep::Sql(
        "INSERT INTO schema_version (version)
SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM schema_version)",
    ),
    MigrationStep::Sql(
        "CREATE TABLE IF NOT EXISTS filenames (
    id INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
    filename TEXT UNIQUE,        -- One row per filename; the only storage-level invariant
    pattern TEXT,                -- Generalized pattern, NULL until computed
    infected INTEGER,            -- 0 = not flagged, 1 = flagged by a verdict
    timestamp INTEGER,           -- Last write (Unix seconds, UTC)
    sha256 TEXT                  -- Content hash of the last seen bytes
)",
    ),
];
