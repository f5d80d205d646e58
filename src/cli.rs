use std::path::PathBuf;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use flexi_logger::{Logger, LoggerHandle};
use log::{debug, info};

use crate::config::Config;
use crate::error::NamePulseError;
use crate::hash::Hash;
use crate::patterns::{DigitRunEngine, LocalpartParser};
use crate::resources::Resource;
use crate::store::{open_store, FilenameStore};
use crate::verdict::Verdict;

#[derive(Parser)]
#[command(
    name = "namepulse",
    version,
    about = "namePulse: remembers attachment filenames and the patterns they share"
)]
pub struct Cli {
    /// Configuration file (default: config.toml in the data directory)
    #[arg(long = "config", short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a filename (or a file on disk, hashing its content)
    Add {
        /// Filename to record
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        filename: Option<String>,

        /// Content hash to store with the filename
        #[arg(long = "sha256", conflicts_with = "file")]
        sha256: Option<String>,

        /// Record this file: its name plus the SHA-256 of its bytes
        #[arg(long = "file", short = 'f')]
        file: Option<PathBuf>,
    },

    /// List every known filename
    Filenames,

    /// List local parts of filenames that carry an email address
    Localparts,

    /// Fill in patterns that are still missing
    #[command(name = "update-patterns")]
    UpdatePatterns,

    /// Remove filenames older than the retention window
    Clean,

    /// Check whether a filename shares a pattern with an infected one
    Match {
        /// Filename to check
        filename: String,
    },

    /// List hashes of resources not flagged infected
    #[command(name = "clean-hashes")]
    CleanHashes {
        /// Maximum number of hashes to list
        #[arg(long = "limit", short = 'n')]
        limit: Option<usize>,
    },

    /// Apply a verdict given as JSON, e.g. {"sha256":"..","infected":true}
    Verdict {
        /// Verdict JSON
        json: String,
    },
}

/// Treats the text before an `@` as the local part of an address-shaped
/// filename (`john.doe@example.com.pdf` → `john.doe`).
struct AddressLocalparts;

impl LocalpartParser for AddressLocalparts {
    fn localpart(&self, filename: &str) -> Option<String> {
        let (local, domain) = filename.split_once('@')?;
        (!local.is_empty() && !domain.is_empty()).then(|| local.to_owned())
    }
}

impl Cli {
    pub fn handle_command_line() -> Result<(), NamePulseError> {
        let args = Cli::parse();

        let project_dirs = ProjectDirs::from("", "", "namepulse").ok_or_else(|| {
            NamePulseError::Error("Could not determine the data directory".into())
        })?;
        let data_dir = project_dirs.data_local_dir().to_owned();

        let config = match &args.config {
            Some(path) => Config::load_from(path),
            None => Config::load_config(&project_dirs),
        };

        let _logger = Self::start_logger(&config)?;
        debug!(
            "Command-line args: {:?}",
            std::env::args_os().collect::<Vec<_>>()
        );

        let mut store = open_store(&config.store_config(&data_dir), Box::new(DigitRunEngine))?;

        // Close on every path, including when the command fails
        let result = Self::run_command(store.as_mut(), args.command);
        let close_result = store.close();
        result?;
        close_result
    }

    fn start_logger(config: &Config) -> Result<LoggerHandle, NamePulseError> {
        Logger::try_with_env_or_str(config.logging.log_spec())
            .and_then(|logger| logger.log_to_stderr().start())
            .map_err(|e| NamePulseError::Error(format!("Failed to start logger: {}", e)))
    }

    pub fn run_command(store: &mut dyn FilenameStore, command: Command) -> Result<(), NamePulseError> {
        match command {
            Command::Add {
                filename,
                sha256,
                file,
            } => {
                let resource = match (file, filename) {
                    (Some(path), _) => Resource::from_path(&path)?,
                    (None, Some(filename)) => match sha256 {
                        Some(sha256) => Resource::with_sha256(&filename, &sha256),
                        None => Resource::new(&filename),
                    },
                    (None, None) => {
                        return Err(NamePulseError::Error(
                            "Either a filename or --file is required".into(),
                        ))
                    }
                };

                store.add_resource(&resource)?;
                info!(
                    "Recorded {} ({})",
                    resource.filename(),
                    Hash::short_sha256(resource.sha256())
                );
            }
            Command::Filenames => {
                let mut filenames = store.get_filenames()?;
                filenames.sort();
                for filename in filenames {
                    println!("{}", filename);
                }
            }
            Command::Localparts => {
                for localpart in store.get_filename_localparts(&AddressLocalparts)? {
                    println!("{}", localpart);
                }
            }
            Command::UpdatePatterns => {
                let updated = store.update_patterns()?;
                println!("Updated {} pattern(s)", updated);
            }
            Command::Clean => {
                let deleted = store.clean()?;
                println!("Removed {} filename(s)", deleted);
            }
            Command::Match { filename } => {
                let matched = store.filename_pattern_match(&Resource::new(&filename))?;
                println!("{}", if matched { "match" } else { "no match" });
            }
            Command::CleanHashes { limit } => {
                for hash in store.clean_hashes(limit)? {
                    println!("{}", hash);
                }
            }
            Command::Verdict { json } => {
                let verdict = Verdict::from_json(&json)?;
                let updated = store.update_result(&verdict)?;
                println!("Updated {} resource(s)", updated);
            }
        }

        Ok(())
    }
}
