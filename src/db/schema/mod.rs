mod v0_to_v1;
mod v1_to_v2;

use v0_to_v1::UPGRADE_0_TO_1;
use v1_to_v2::UPGRADE_1_TO_2;

/// A single structural operation within a schema upgrade.
///
/// Every step must be idempotent: the driver commits after each step, so a
/// crash between two steps of the same version leaves the version marker
/// unchanged and the whole version is replayed on the next open.
#[derive(Debug)]
pub enum MigrationStep {
    /// A single SQL statement, written so that re-running it is harmless
    /// (`IF NOT EXISTS`, guarded inserts)
    Sql(&'static str),

    /// `ALTER TABLE .. ADD COLUMN`, skipped when the column already exists
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

/// Migration descriptor. Applying every step brings a store from
/// `version - 1` to `version`.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub steps: &'static [MigrationStep],
}

/// Registry of schema upgrades, indexed by the version they produce.
/// Entry 0 is the uninitialized store and has nothing to apply.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 0,
        description: "Uninitialized store",
        steps: &[],
    },
    Migration {
        version: 1,
        description: "Version marker and filenames table",
        steps: UPGRADE_0_TO_1,
    },
    Migration {
        version: 2,
        description: "Verdict metadata columns, hash and pattern indexes",
        steps: UPGRADE_1_TO_2,
    },
];

pub const LATEST_SCHEMA_VERSION: u32 = (MIGRATIONS.len() - 1) as u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_indexed_by_version() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index);
        }
    }

    #[test]
    fn test_version_zero_has_no_steps() {
        assert!(MIGRATIONS[0].steps.is_empty());
        assert_eq!(LATEST_SCHEMA_VERSION, 2);
    }
}
