use std::collections::BTreeSet;
use std::path::Path;

use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::Database;
use crate::error::NamePulseError;
use crate::hash::Hash;
use crate::patterns::{LocalpartParser, PatternEngine};
use crate::utils::Utils;
use crate::verdict::Verdict;

/// A filename seen by the scanning pipeline, with the hash of its content
/// when known.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    filename: String,
    sha256: Option<String>,
}

impl Resource {
    pub fn new(filename: &str) -> Self {
        Resource {
            filename: filename.to_owned(),
            sha256: None,
        }
    }

    pub fn with_sha256(filename: &str, sha256: &str) -> Self {
        Resource {
            filename: filename.to_owned(),
            sha256: Some(sha256.to_owned()),
        }
    }

    /// Build a resource for a file on disk: the file's name plus the SHA-256
    /// of its bytes.
    pub fn from_path(path: &Path) -> Result<Self, NamePulseError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                NamePulseError::Error(format!("Path '{}' has no file name", path.display()))
            })?;
        let sha256 = Hash::compute_sha256(path)?;

        Ok(Resource {
            filename,
            sha256: Some(sha256),
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }
}

/// A stored row of the filenames table.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceRecord {
    pub id: i64,
    pub filename: String,
    pub pattern: Option<String>,
    pub infected: bool,
    pub timestamp: i64,
    pub sha256: Option<String>,
    pub positives: Option<u32>,
    pub total: Option<u32>,
    pub verdict_at: Option<i64>,
}

impl ResourceRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ResourceRecord {
            id: row.get(0)?,
            filename: row.get(1)?,
            pattern: row.get(2)?,
            infected: row.get::<_, Option<i64>>(3)?.unwrap_or(0) != 0,
            timestamp: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            sha256: row.get(5)?,
            positives: Utils::opt_i64_to_opt_u32(row.get(6)?),
            total: Utils::opt_i64_to_opt_u32(row.get(7)?),
            verdict_at: row.get(8)?,
        })
    }
}

pub struct Resources;

impl Resources {
    /// Record `resource`, inserting a new row or refreshing the existing row
    /// for the same filename.
    pub fn add(
        db: &mut Database,
        engine: &dyn PatternEngine,
        resource: &Resource,
    ) -> Result<(), NamePulseError> {
        Self::add_at(db, engine, resource, Utils::now_secs())
    }

    /// Upsert keyed on filename. The corpus snapshot, the pattern computation
    /// and the write all happen inside one IMMEDIATE transaction, so the row
    /// is either written in full or not at all.
    ///
    /// Only a conflict on `filename` turns the insert into an update. The
    /// update refreshes `pattern` and `timestamp`, replaces the hash when one
    /// is supplied and never touches `infected`. Any other failure is returned
    /// and the transaction rolls back.
    pub fn add_at(
        db: &mut Database,
        engine: &dyn PatternEngine,
        resource: &Resource,
        now: i64,
    ) -> Result<(), NamePulseError> {
        if resource.filename.is_empty() {
            return Err(NamePulseError::Error(
                "Resource filename must not be empty".into(),
            ));
        }

        Database::immediate_transaction(db.conn_mut(), |tx| {
            let corpus = Self::get_filenames(tx)?;
            let pattern = engine
                .compute(&resource.filename, &corpus)
                .filter(|pattern| !pattern.is_empty());

            debug!(
                "Recording {} with pattern {:?}",
                resource.filename, pattern
            );

            tx.execute(
                "INSERT INTO filenames (filename, pattern, infected, timestamp, sha256)
                 VALUES (?1, ?2, 0, ?3, ?4)
                 ON CONFLICT(filename) DO UPDATE SET
                    pattern = excluded.pattern,
                    timestamp = excluded.timestamp,
                    sha256 = COALESCE(excluded.sha256, filenames.sha256)",
                params![resource.filename, pattern, now, resource.sha256],
            )?;

            Ok(())
        })
    }

    pub fn get(conn: &Connection, filename: &str) -> Result<Option<ResourceRecord>, NamePulseError> {
        conn.query_row(
            "SELECT id, filename, pattern, infected, timestamp, sha256, positives, total, verdict_at
             FROM filenames
             WHERE filename = ?",
            [filename],
            ResourceRecord::from_row,
        )
        .optional()
        .map_err(NamePulseError::DatabaseError)
    }

    /// Distinct known filenames, read in a single statement.
    pub fn get_filenames(conn: &Connection) -> Result<Vec<String>, NamePulseError> {
        let mut stmt = conn.prepare("SELECT DISTINCT filename FROM filenames")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut filenames = Vec::new();
        for row in rows {
            filenames.push(row?);
        }
        Ok(filenames)
    }

    /// Distinct local parts that `parser` finds in the known filenames,
    /// in sorted order.
    pub fn get_filename_localparts(
        conn: &Connection,
        parser: &dyn LocalpartParser,
    ) -> Result<Vec<String>, NamePulseError> {
        let localparts: BTreeSet<String> = Self::get_filenames(conn)?
            .iter()
            .filter_map(|filename| parser.localpart(filename))
            .filter(|localpart| !localpart.is_empty())
            .collect();

        Ok(localparts.into_iter().collect())
    }

    /// Apply a verdict to every resource carrying its hash. Returns the number
    /// of rows updated; an unknown hash updates nothing and is not an error.
    pub fn update_result(conn: &Connection, verdict: &Verdict) -> Result<usize, NamePulseError> {
        let verdict_at = verdict.scan_date.unwrap_or_else(Utils::now_secs);

        let updated = conn.execute(
            "UPDATE filenames
             SET infected = ?1, positives = ?2, total = ?3, verdict_at = ?4
             WHERE sha256 = ?5",
            params![
                verdict.infected,
                Utils::opt_u32_to_opt_i64(verdict.positives),
                Utils::opt_u32_to_opt_i64(verdict.total),
                verdict_at,
                verdict.sha256,
            ],
        )?;

        if updated == 0 {
            debug!("No resource with hash {}", verdict.sha256);
        } else {
            debug!(
                "Verdict for {} (infected: {}) applied to {} resource(s)",
                verdict.sha256, verdict.infected, updated
            );
        }
        Ok(updated)
    }

    /// Whether the resource's filename generalizes to a pattern already
    /// shared by some other resource that has been flagged infected.
    pub fn filename_pattern_match(
        conn: &Connection,
        engine: &dyn PatternEngine,
        resource: &Resource,
    ) -> Result<bool, NamePulseError> {
        let corpus = Self::get_filenames(conn)?;
        let pattern = match engine.compute(&resource.filename, &corpus) {
            Some(pattern) => pattern,
            None => return Ok(false),
        };

        let infected: i64 = conn.query_row(
            "SELECT COUNT(*) FROM filenames
             WHERE pattern = ?1 AND infected = 1 AND filename != ?2",
            params![pattern, resource.filename],
            |row| row.get(0),
        )?;

        debug!(
            "Pattern {} for {} has {} infected sibling(s)",
            pattern, resource.filename, infected
        );
        Ok(infected > 0)
    }

    /// Hashes of resources not flagged infected, most recently seen first.
    pub fn clean_hashes(
        conn: &Connection,
        limit: Option<usize>,
    ) -> Result<Vec<String>, NamePulseError> {
        // SQLite treats a negative LIMIT as no limit
        let limit = limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);

        let mut stmt = conn.prepare(
            "SELECT sha256 FROM filenames
             WHERE (infected IS NULL OR infected = 0) AND sha256 IS NOT NULL
             GROUP BY sha256
             ORDER BY MAX(timestamp) DESC, sha256 ASC
             LIMIT ?",
        )?;
        let rows = stmt.query_map([limit], |row| row.get::<_, String>(0))?;

        let mut hashes = Vec::new();
        for row in rows {
            hashes.push(row?);
        }
        Ok(hashes)
    }
}
