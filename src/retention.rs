use chrono::Duration;
use log::{info, Level};
use logging_timer::timer;
use rusqlite::Connection;

use crate::error::NamePulseError;
use crate::utils::Utils;

pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Purges resources that have not been written within the retention window.
/// This is the only path that deletes rows from the filenames table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionCleaner {
    retention: Duration,
}

impl Default for RetentionCleaner {
    fn default() -> Self {
        Self::new(Duration::days(DEFAULT_RETENTION_DAYS))
    }
}

impl RetentionCleaner {
    pub fn new(retention: Duration) -> Self {
        RetentionCleaner { retention }
    }

    /// A window of `days` days. The window must be at least one day and
    /// representable as a duration.
    pub fn with_days(days: i64) -> Result<Self, NamePulseError> {
        Duration::try_days(days)
            .filter(|_| days >= 1)
            .map(Self::new)
            .ok_or_else(|| {
                NamePulseError::Error(format!("Invalid retention window of {} days", days))
            })
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn clean(&self, conn: &Connection) -> Result<usize, NamePulseError> {
        self.clean_at(conn, Utils::now_secs())
    }

    /// Delete every resource whose timestamp is at or before
    /// `now - retention`. Returns the number of rows deleted.
    pub fn clean_at(&self, conn: &Connection, now: i64) -> Result<usize, NamePulseError> {
        let _tmr = timer!(Level::Trace; "RetentionCleaner::clean");

        let cutoff = now.saturating_sub(self.retention.num_seconds());
        let deleted = conn.execute("DELETE FROM filenames WHERE timestamp <= ?", [cutoff])?;

        info!(
            "Removed {} resource(s) last seen at or before {}",
            deleted, cutoff
        );
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::patterns::DigitRunEngine;
    use crate::resources::{Resource, Resources};
    use pretty_assertions::assert_eq;

    const DAY: i64 = 86_400;
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_default_window_is_ninety_days() {
        assert_eq!(RetentionCleaner::default().retention().num_days(), 90);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let mut db = Database::open_in_memory().unwrap();
        let boundary = NOW - 90 * DAY;

        Resources::add_at(&mut db, &DigitRunEngine, &Resource::new("old.exe"), boundary - 1)
            .unwrap();
        Resources::add_at(&mut db, &DigitRunEngine, &Resource::new("edge.exe"), boundary)
            .unwrap();
        Resources::add_at(&mut db, &DigitRunEngine, &Resource::new("fresh.exe"), boundary + 1)
            .unwrap();

        let deleted = RetentionCleaner::default().clean_at(db.conn(), NOW).unwrap();
        assert_eq!(deleted, 2);

        let mut remaining = Resources::get_filenames(db.conn()).unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["fresh.exe".to_string()]);
    }

    #[test]
    fn test_re_adding_refreshes_retention() {
        let mut db = Database::open_in_memory().unwrap();
        Resources::add_at(&mut db, &DigitRunEngine, &Resource::new("a.exe"), NOW - 100 * DAY)
            .unwrap();
        Resources::add_at(&mut db, &DigitRunEngine, &Resource::new("a.exe"), NOW - DAY).unwrap();

        assert_eq!(RetentionCleaner::default().clean_at(db.conn(), NOW).unwrap(), 0);
        assert_eq!(db.resource_count().unwrap(), 1);
    }

    #[test]
    fn test_configurable_window() {
        let mut db = Database::open_in_memory().unwrap();
        Resources::add_at(&mut db, &DigitRunEngine, &Resource::new("a.exe"), NOW - 8 * DAY)
            .unwrap();

        assert_eq!(RetentionCleaner::with_days(30).unwrap().clean_at(db.conn(), NOW).unwrap(), 0);
        assert_eq!(RetentionCleaner::with_days(7).unwrap().clean_at(db.conn(), NOW).unwrap(), 1);
    }

    #[test]
    fn test_invalid_window_is_rejected() {
        for days in [0, -1, i64::MAX, i64::MIN] {
            let err = RetentionCleaner::with_days(days).unwrap_err();
            assert!(matches!(err, NamePulseError::Error(_)));
        }
        assert_eq!(RetentionCleaner::with_days(1).unwrap().retention().num_days(), 1);
    }

    #[test]
    fn test_clean_on_empty_store() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(RetentionCleaner::default().clean(db.conn()).unwrap(), 0);
    }
}
