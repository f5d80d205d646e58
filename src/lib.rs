//! namePulse remembers the filenames an attachment scanner has seen,
//! generalizes them into wildcard patterns and answers whether a new filename
//! shares a pattern with something already flagged as infected.
//!
//! The store is opened from a [`StoreConfig`] with [`open_store`], which runs
//! schema migrations before handing back a ready [`FilenameStore`]. When
//! persistence is disabled the same call returns an inert [`NoopStore`].

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub mod patterns;
pub mod refresh;
pub mod resources;
pub mod retention;
pub mod store;
pub mod utils;
pub mod verdict;

pub use error::NamePulseError;
pub use patterns::{DigitRunEngine, LocalpartParser, PatternEngine};
pub use resources::{Resource, ResourceRecord};
pub use store::{open_store, FilenameStore, NoopStore, SqliteStore, StoreConfig};
pub use verdict::Verdict;
