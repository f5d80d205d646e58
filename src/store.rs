use std::path::{Path, PathBuf};

use log::info;

use crate::db::Database;
use crate::error::NamePulseError;
use crate::patterns::{LocalpartParser, PatternEngine};
use crate::refresh::PatternRefresher;
use crate::resources::{Resource, Resources};
use crate::retention::{RetentionCleaner, DEFAULT_RETENTION_DAYS};
use crate::verdict::Verdict;

/// The operations the scanning pipeline performs against the filename store.
///
/// Two implementations exist: [`SqliteStore`] persists everything, and
/// [`NoopStore`] is used when persistence is disabled, so callers never need
/// to branch on configuration.
///
/// The trait is object-safe so callers can hold a `Box<dyn FilenameStore>`.
pub trait FilenameStore: Send {
    /// Record a filename, inserting it or refreshing the existing entry
    fn add_resource(&mut self, resource: &Resource) -> Result<(), NamePulseError>;

    /// Distinct known filenames, in no particular order
    fn get_filenames(&self) -> Result<Vec<String>, NamePulseError>;

    /// Distinct local parts found in the known filenames
    fn get_filename_localparts(
        &self,
        parser: &dyn LocalpartParser,
    ) -> Result<Vec<String>, NamePulseError>;

    /// Fill in patterns that are still unset. Returns the number filled.
    fn update_patterns(&mut self) -> Result<usize, NamePulseError>;

    /// Drop resources outside the retention window. Returns the number dropped.
    fn clean(&mut self) -> Result<usize, NamePulseError>;

    /// Whether the resource's filename pattern is shared by an infected resource
    fn filename_pattern_match(&self, resource: &Resource) -> Result<bool, NamePulseError>;

    /// Hashes of resources not flagged infected, newest first
    fn clean_hashes(&self, limit: Option<usize>) -> Result<Vec<String>, NamePulseError>;

    /// Apply a verdict by content hash. Returns the number of resources updated.
    fn update_result(&mut self, verdict: &Verdict) -> Result<usize, NamePulseError>;

    /// Release the underlying connection
    fn close(self: Box<Self>) -> Result<(), NamePulseError>;
}

/// Everything needed to open a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub retention_days: i64,
}

impl StoreConfig {
    pub fn new(path: &Path) -> Self {
        StoreConfig {
            enabled: true,
            path: path.to_owned(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn disabled() -> Self {
        StoreConfig {
            enabled: false,
            path: PathBuf::new(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Open the store described by `config`.
///
/// A disabled config yields a [`NoopStore`]; otherwise the database is opened
/// and migrated before the handle is returned.
pub fn open_store(
    config: &StoreConfig,
    engine: Box<dyn PatternEngine + Send>,
) -> Result<Box<dyn FilenameStore>, NamePulseError> {
    if !config.enabled {
        info!("Filename persistence is disabled");
        return Ok(Box::new(NoopStore));
    }

    Ok(Box::new(SqliteStore::open(config, engine)?))
}

pub struct SqliteStore {
    db: Database,
    engine: Box<dyn PatternEngine + Send>,
    cleaner: RetentionCleaner,
}

impl SqliteStore {
    pub fn open(
        config: &StoreConfig,
        engine: Box<dyn PatternEngine + Send>,
    ) -> Result<Self, NamePulseError> {
        let cleaner = RetentionCleaner::with_days(config.retention_days)?;
        let db = Database::open(&config.path)?;
        info!(
            "Opened filename store {} (schema version {})",
            config.path.display(),
            db.schema_version()
        );

        Ok(SqliteStore {
            db,
            engine,
            cleaner,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl FilenameStore for SqliteStore {
    fn add_resource(&mut self, resource: &Resource) -> Result<(), NamePulseError> {
        Resources::add(&mut self.db, self.engine.as_ref(), resource)
    }

    fn get_filenames(&self) -> Result<Vec<String>, NamePulseError> {
        Resources::get_filenames(self.db.conn())
    }

    fn get_filename_localparts(
        &self,
        parser: &dyn LocalpartParser,
    ) -> Result<Vec<String>, NamePulseError> {
        Resources::get_filename_localparts(self.db.conn(), parser)
    }

    fn update_patterns(&mut self) -> Result<usize, NamePulseError> {
        PatternRefresher::update_patterns(self.db.conn(), self.engine.as_ref())
    }

    fn clean(&mut self) -> Result<usize, NamePulseError> {
        self.cleaner.clean(self.db.conn())
    }

    fn filename_pattern_match(&self, resource: &Resource) -> Result<bool, NamePulseError> {
        Resources::filename_pattern_match(self.db.conn(), self.engine.as_ref(), resource)
    }

    fn clean_hashes(&self, limit: Option<usize>) -> Result<Vec<String>, NamePulseError> {
        Resources::clean_hashes(self.db.conn(), limit)
    }

    fn update_result(&mut self, verdict: &Verdict) -> Result<usize, NamePulseError> {
        Resources::update_result(self.db.conn(), verdict)
    }

    fn close(self: Box<Self>) -> Result<(), NamePulseError> {
        self.db.close()
    }
}

/// Inert store used when persistence is disabled. Every operation succeeds
/// and nothing is remembered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl FilenameStore for NoopStore {
    fn add_resource(&mut self, _resource: &Resource) -> Result<(), NamePulseError> {
        Ok(())
    }

    fn get_filenames(&self) -> Result<Vec<String>, NamePulseError> {
        Ok(Vec::new())
    }

    fn get_filename_localparts(
        &self,
        _parser: &dyn LocalpartParser,
    ) -> Result<Vec<String>, NamePulseError> {
        Ok(Vec::new())
    }

    fn update_patterns(&mut self) -> Result<usize, NamePulseError> {
        Ok(0)
    }

    fn clean(&mut self) -> Result<usize, NamePulseError> {
        Ok(0)
    }

    fn filename_pattern_match(&self, _resource: &Resource) -> Result<bool, NamePulseError> {
        Ok(false)
    }

    fn clean_hashes(&self, _limit: Option<usize>) -> Result<Vec<String>, NamePulseError> {
        Ok(Vec::new())
    }

    fn update_result(&mut self, _verdict: &Verdict) -> Result<usize, NamePulseError> {
        Ok(0)
    }

    fn close(self: Box<Self>) -> Result<(), NamePulseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::DigitRunEngine;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct DotLocalparts;

    impl LocalpartParser for DotLocalparts {
        fn localpart(&self, filename: &str) -> Option<String> {
            filename.split_once('.').map(|(local, _)| local.to_owned())
        }
    }

    fn exercise(store: &mut dyn FilenameStore) {
        store
            .add_resource(&Resource::with_sha256("invoice123.pdf.exe", "h1"))
            .unwrap();
        store
            .add_resource(&Resource::with_sha256("invoice456.pdf.exe", "h2"))
            .unwrap();
        store.update_patterns().unwrap();
        store.update_result(&Verdict::new("h1", true)).unwrap();
        store.clean().unwrap();
    }

    #[test]
    fn test_noop_store_is_inert() {
        let mut store = open_store(&StoreConfig::disabled(), Box::new(DigitRunEngine)).unwrap();
        exercise(store.as_mut());

        assert!(store.get_filenames().unwrap().is_empty());
        assert!(store.get_filename_localparts(&DotLocalparts).unwrap().is_empty());
        assert!(store.clean_hashes(None).unwrap().is_empty());
        assert!(!store
            .filename_pattern_match(&Resource::new("invoice789.pdf.exe"))
            .unwrap());
        assert_eq!(store.update_patterns().unwrap(), 0);
        assert_eq!(store.clean().unwrap(), 0);
        store.close().unwrap();
    }

    #[test]
    fn test_sqlite_store_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(&dir.path().join("namepulse.db"));

        let mut store = open_store(&config, Box::new(DigitRunEngine)).unwrap();
        exercise(store.as_mut());

        let mut filenames = store.get_filenames().unwrap();
        filenames.sort();
        assert_eq!(
            filenames,
            vec![
                "invoice123.pdf.exe".to_string(),
                "invoice456.pdf.exe".to_string()
            ]
        );
        assert_eq!(
            store.get_filename_localparts(&DotLocalparts).unwrap(),
            vec!["invoice123".to_string(), "invoice456".to_string()]
        );
        assert!(store
            .filename_pattern_match(&Resource::new("invoice789.pdf.exe"))
            .unwrap());
        assert_eq!(store.clean_hashes(None).unwrap(), vec!["h2".to_string()]);
        store.close().unwrap();

        // Data survives a reopen
        let store = open_store(&config, Box::new(DigitRunEngine)).unwrap();
        assert_eq!(store.get_filenames().unwrap().len(), 2);
        store.close().unwrap();
    }

    #[test]
    fn test_open_store_surfaces_bootstrap_errors() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(&dir.path().join("missing").join("namepulse.db"));

        assert!(open_store(&config, Box::new(DigitRunEngine)).is_err());
    }

    #[test]
    fn test_open_rejects_invalid_retention() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("namepulse.db");

        for days in [0, i64::MAX] {
            let mut config = StoreConfig::new(&path);
            config.retention_days = days;
            let err = open_store(&config, Box::new(DigitRunEngine)).err().unwrap();
            assert!(matches!(err, NamePulseError::Error(_)));
        }
        // Rejected before the database file is created
        assert!(!path.exists());
    }

    #[test]
    fn test_store_applies_configured_retention() {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::new(&dir.path().join("namepulse.db"));
        config.retention_days = 1;

        let mut store = SqliteStore::open(&config, Box::new(DigitRunEngine)).unwrap();
        store.add_resource(&Resource::new("a.exe")).unwrap();
        store
            .database()
            .conn()
            .execute("UPDATE filenames SET timestamp = timestamp - 86400", [])
            .unwrap();

        assert_eq!(store.clean().unwrap(), 1);
        assert!(store.get_filenames().unwrap().is_empty());
    }
}
