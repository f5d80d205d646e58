use super::MigrationStep;

//
// Schema Upgrade: Version 1 → 2
//
// Adds verdict metadata to filenames so that a verdict can record detection
// counts alongside the infected flag, plus indexes for the hash lookups done
// by verdict updates and the pattern lookups done by pattern matching.
//
// Version 1 stores written by earlier tools hold `timestamp` as UTC datetime
// text ("2016-03-01 12:00:00.123456"). Integer comparisons never match text,
// so those rows would never expire. They are rewritten to Unix seconds; text
// that does not parse becomes 0 and expires on the next clean.
//
// SQLite has no ADD COLUMN IF NOT EXISTS, so the column additions go through
// AddColumn, which checks table_info first.
//

pub const UPGRADE_1_TO_2: &[MigrationStep] = &[
    MigrationStep::Sql(
        "UPDATE filenames
         SET timestamp = COALESCE(CAST(strftime('%s', timestamp) AS INTEGER), 0)
         WHERE typeof(timestamp) = 'text'",
    ),
    MigrationStep::AddColumn {
        table: "filenames",
        column: "positives",
        definition: "INTEGER DEFAULT NULL",
    },
    MigrationStep::AddColumn {
        table: "filenames",
        column: "total",
        definition: "INTEGER DEFAULT NULL",
    },
    MigrationStep::AddColumn {
        table: "filenames",
        column: "verdict_at",
        definition: "INTEGER DEFAULT NULL",
    },
    MigrationStep::Sql("CREATE INDEX IF NOT EXISTS idx_filenames_sha256 ON filenames (sha256)"),
    MigrationStep::Sql("CREATE INDEX IF NOT EXISTS idx_filenames_pattern ON filenames (pattern)"),
];
