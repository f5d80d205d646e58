use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use hex::encode;
use sha2::{Digest, Sha256};

use crate::error::NamePulseError;

pub struct Hash;

impl Hash {
    pub fn compute_sha256(path: &Path) -> Result<String, NamePulseError> {
        let f = File::open(path)?;

        let mut reader = BufReader::new(f);
        let mut hasher = Sha256::new();
        let mut buffer = [0; 8192]; // Read in 8KB chunks

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(encode(hasher.finalize()))
    }

    /// First 12 characters of a hash for display. Hashes supplied on the
    /// command line are not validated, so the cut falls on a char boundary.
    pub fn short_sha256(hash: Option<&str>) -> &str {
        match hash {
            Some(hash) => match hash.char_indices().nth(12) {
                Some((end, _)) => &hash[..end],
                None => hash,
            },
            None => "-",
        }
    }
}
