use log::{debug, info, Level};
use logging_timer::timer;
use rusqlite::{params, Connection};

use crate::error::NamePulseError;
use crate::patterns::PatternEngine;
use crate::resources::Resources;

/// Backfills patterns for resources whose pattern is still unset.
///
/// A resource added before it had any siblings usually gets no pattern. Each
/// refresh retries those resources against the current corpus. Resources the
/// engine still cannot generalize stay unset and are retried next time.
pub struct PatternRefresher;

impl PatternRefresher {
    /// Returns the number of resources that received a pattern.
    pub fn update_patterns(
        conn: &Connection,
        engine: &dyn PatternEngine,
    ) -> Result<usize, NamePulseError> {
        let _tmr = timer!(Level::Trace; "PatternRefresher::update_patterns");
        info!("Updating patterns");

        let pending = Self::pending(conn)?;
        if pending.is_empty() {
            return Ok(0);
        }

        let corpus = Resources::get_filenames(conn)?;
        let mut updated = 0;

        for (id, filename) in pending {
            let pattern = match engine.compute(&filename, &corpus) {
                Some(pattern) if !pattern.is_empty() => pattern,
                _ => continue,
            };

            debug!("Updating pattern for {} to {}", filename, pattern);

            // Autocommit: each row is durable on its own. The IS NULL guard
            // keeps a pattern written since the select from being replaced.
            updated += conn.execute(
                "UPDATE filenames SET pattern = ?1 WHERE id = ?2 AND pattern IS NULL",
                params![pattern, id],
            )?;
        }

        info!("Updated {} pattern(s)", updated);
        Ok(updated)
    }

    /// Number of resources still waiting for a pattern.
    pub fn pending_count(conn: &Connection) -> Result<i64, NamePulseError> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM filenames WHERE pattern IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn pending(conn: &Connection) -> Result<Vec<(i64, String)>, NamePulseError> {
        let mut stmt =
            conn.prepare("SELECT id, filename FROM filenames WHERE pattern IS NULL ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut pending = Vec::new();
        for row in rows {
            pending.push(row?);
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::patterns::DigitRunEngine;
    use crate::resources::Resource;
    use pretty_assertions::assert_eq;

    fn pattern_of(db: &Database, filename: &str) -> Option<String> {
        Resources::get(db.conn(), filename).unwrap().unwrap().pattern
    }

    #[test]
    fn test_invoice_scenario_converges() {
        let mut db = Database::open_in_memory().unwrap();
        Resources::add(&mut db, &DigitRunEngine, &Resource::new("invoice123.pdf.exe")).unwrap();
        Resources::add(&mut db, &DigitRunEngine, &Resource::new("invoice456.pdf.exe")).unwrap();
        assert_eq!(PatternRefresher::pending_count(db.conn()).unwrap(), 1);

        assert_eq!(
            PatternRefresher::update_patterns(db.conn(), &DigitRunEngine).unwrap(),
            1
        );
        assert_eq!(PatternRefresher::pending_count(db.conn()).unwrap(), 0);
        assert_eq!(
            pattern_of(&db, "invoice123.pdf.exe").as_deref(),
            Some("invoice*.pdf.exe")
        );
        assert_eq!(
            pattern_of(&db, "invoice456.pdf.exe").as_deref(),
            Some("invoice*.pdf.exe")
        );
    }

    #[test]
    fn test_unmatched_resources_are_retried() {
        let mut db = Database::open_in_memory().unwrap();
        // Matches only once the corpus holds at least three names
        let engine = |name: &str, corpus: &[String]| {
            (corpus.len() >= 3).then(|| format!("{}*", &name[..1]))
        };

        Resources::add(&mut db, &engine, &Resource::new("a1")).unwrap();
        Resources::add(&mut db, &engine, &Resource::new("a2")).unwrap();
        assert_eq!(PatternRefresher::update_patterns(db.conn(), &engine).unwrap(), 0);
        assert_eq!(PatternRefresher::pending_count(db.conn()).unwrap(), 2);

        // a3 itself was added against a two-name corpus and is also pending
        Resources::add(&mut db, &engine, &Resource::new("a3")).unwrap();
        assert_eq!(PatternRefresher::update_patterns(db.conn(), &engine).unwrap(), 3);
        assert_eq!(PatternRefresher::pending_count(db.conn()).unwrap(), 0);

        // Nothing left to do
        assert_eq!(PatternRefresher::update_patterns(db.conn(), &engine).unwrap(), 0);
    }

    #[test]
    fn test_existing_patterns_are_not_overwritten() {
        let mut db = Database::open_in_memory().unwrap();
        let first = |_: &str, _: &[String]| Some("first".to_string());
        Resources::add(&mut db, &first, &Resource::new("set.exe")).unwrap();
        let none = |_: &str, _: &[String]| -> Option<String> { None };
        Resources::add(&mut db, &none, &Resource::new("unset.exe")).unwrap();

        let other = |_: &str, _: &[String]| Some("other".to_string());
        assert_eq!(PatternRefresher::update_patterns(db.conn(), &other).unwrap(), 1);

        assert_eq!(pattern_of(&db, "set.exe").as_deref(), Some("first"));
        assert_eq!(pattern_of(&db, "unset.exe").as_deref(), Some("other"));
    }

    #[test]
    fn test_empty_pattern_is_not_persisted() {
        let mut db = Database::open_in_memory().unwrap();
        let empty = |_: &str, _: &[String]| Some(String::new());
        Resources::add(&mut db, &empty, &Resource::new("a.exe")).unwrap();
        assert_eq!(pattern_of(&db, "a.exe"), None);

        assert_eq!(PatternRefresher::update_patterns(db.conn(), &empty).unwrap(), 0);
        assert_eq!(PatternRefresher::pending_count(db.conn()).unwrap(), 1);
    }
}
