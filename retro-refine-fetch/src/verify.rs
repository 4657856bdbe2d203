//! Advisory checksum verification of finished downloads.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

const CHUNK_SIZE: usize = 64 * 1024; // 64 KB

/// How a file compared against its catalog checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyStatus {
    Matched,
    Mismatched { expected: String },
    /// No checksum to compare against
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub crc32: String,
    #[serde(flatten)]
    pub status: VerifyStatus,
}

pub trait Verifier: Send + Sync {
    /// Checksum `path`, comparing against `expected` or the verifier's own
    /// catalog for `file_name`.
    fn verify(&self, path: &Path, file_name: &str, expected: Option<&str>)
    -> io::Result<Verification>;
}

/// CRC32 verifier with an optional file name → checksum catalog.
#[derive(Debug, Clone, Default)]
pub struct Crc32Verifier {
    known: HashMap<String, String>,
}

impl Crc32Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known(known: HashMap<String, String>) -> Self {
        let known = known
            .into_iter()
            .map(|(name, crc)| (name, crc.to_ascii_lowercase()))
            .collect();
        Self { known }
    }
}

impl Verifier for Crc32Verifier {
    fn verify(
        &self,
        path: &Path,
        file_name: &str,
        expected: Option<&str>,
    ) -> io::Result<Verification> {
        let crc32 = compute_crc32(&mut File::open(path)?)?;
        let expected = expected
            .map(str::to_ascii_lowercase)
            .or_else(|| self.known.get(file_name).cloned());
        let status = match expected {
            None => VerifyStatus::Unknown,
            Some(e) if e == crc32 => VerifyStatus::Matched,
            Some(e) => VerifyStatus::Mismatched { expected: e },
        };
        Ok(Verification { crc32, status })
    }
}

/// CRC32 of a stream as 8 lowercase hex digits, read in 64 KB chunks.
pub fn compute_crc32<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:08x}", hasher.finalize()))
}
