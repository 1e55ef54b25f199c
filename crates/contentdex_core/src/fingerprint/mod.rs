//! Content fingerprinting.
//!
//! # Responsibility
//! - Derive a deterministic `ContentId` from a file, reader or byte slice.
//! - Keep the digest function a configuration choice with a fixed default.
//!
//! # Invariants
//! - Bytes are hashed exactly as read; no decoding or newline handling.
//! - Empty input is an error, never an identity.
//! - Fingerprinting has no side effects on the catalog or the file.

use crate::model::content::ContentId;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const READ_CHUNK_BYTES: usize = 64 * 1024;

pub type FingerprintResult<T> = Result<T, FingerprintError>;

/// Digest function used to derive content identities.
///
/// `Md5` is the default so identities stay comparable with catalogs built
/// by earlier runs and other machines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Length of the hex identity this algorithm produces.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 | Self::Blake3 => 64,
        }
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!(
                "unsupported digest `{other}`; expected md5|sha256|blake3"
            )),
        }
    }
}

/// Failure to derive an identity.
#[derive(Debug)]
pub enum FingerprintError {
    /// The path does not resolve to a regular file.
    NotFound(PathBuf),
    /// Bytes could not be obtained (permission, I/O fault, file vanished).
    Unreadable {
        path: Option<PathBuf>,
        source: std::io::Error,
    },
    /// The source produced zero bytes.
    Empty { path: Option<PathBuf> },
}

impl FingerprintError {
    /// Stable short code used in logs and skip reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unreadable { .. } => "unreadable",
            Self::Empty { .. } => "empty",
        }
    }

    fn with_path(self, path: &Path) -> Self {
        match self {
            Self::Unreadable { path: None, source } => Self::Unreadable {
                path: Some(path.to_path_buf()),
                source,
            },
            Self::Empty { path: None } => Self::Empty {
                path: Some(path.to_path_buf()),
            },
            other => other,
        }
    }
}

impl Display for FingerprintError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "not a regular file: `{}`", path.display()),
            Self::Unreadable { path, source } => {
                write!(f, "cannot read {}: {source}", describe(path.as_deref()))
            }
            Self::Empty { path } => write!(f, "{} is empty", describe(path.as_deref())),
        }
    }
}

impl Error for FingerprintError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unreadable { source, .. } => Some(source),
            Self::NotFound(_) | Self::Empty { .. } => None,
        }
    }
}

fn describe(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("`{}`", path.display()),
        None => "input stream".to_string(),
    }
}

/// Stateless content fingerprinter.
///
/// Cheap to copy and safe to share across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fingerprinter {
    algorithm: DigestAlgorithm,
}

impl Fingerprinter {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Fingerprints the regular file at `path`.
    ///
    /// Symlinks are resolved here; the traverser decides whether symlinked
    /// files are ever offered.
    pub fn fingerprint_file(&self, path: impl AsRef<Path>) -> FingerprintResult<ContentId> {
        let path = path.as_ref();
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(FingerprintError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(FingerprintError::Unreadable {
                    path: Some(path.to_path_buf()),
                    source,
                });
            }
        };
        if !metadata.is_file() {
            return Err(FingerprintError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|source| FingerprintError::Unreadable {
            path: Some(path.to_path_buf()),
            source,
        })?;
        self.fingerprint_reader(file)
            .map_err(|err| err.with_path(path))
    }

    /// Fingerprints everything `reader` yields until end of stream.
    pub fn fingerprint_reader(&self, mut reader: impl Read) -> FingerprintResult<ContentId> {
        let mut hasher = ContentHasher::new(self.algorithm);
        let mut buffer = vec![0_u8; READ_CHUNK_BYTES];
        let mut total = 0_u64;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => return Err(FingerprintError::Unreadable { path: None, source }),
            };
            hasher.update(&buffer[..read]);
            total += read as u64;
        }

        if total == 0 {
            return Err(FingerprintError::Empty { path: None });
        }
        Ok(hasher.finalize())
    }

    /// Fingerprints an in-memory byte slice.
    pub fn fingerprint_bytes(&self, bytes: &[u8]) -> FingerprintResult<ContentId> {
        if bytes.is_empty() {
            return Err(FingerprintError::Empty { path: None });
        }
        let mut hasher = ContentHasher::new(self.algorithm);
        hasher.update(bytes);
        Ok(hasher.finalize())
    }
}

enum ContentHasher {
    Md5(Md5),
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl ContentHasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(Md5::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Md5(hasher) => hasher.update(chunk),
            Self::Sha256(hasher) => hasher.update(chunk),
            Self::Blake3(hasher) => {
                hasher.update(chunk);
            }
        }
    }

    fn finalize(self) -> ContentId {
        match self {
            Self::Md5(hasher) => ContentId::from_digest(&hasher.finalize()),
            Self::Sha256(hasher) => ContentId::from_digest(&hasher.finalize()),
            Self::Blake3(hasher) => ContentId::from_digest(hasher.finalize().as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DigestAlgorithm, Fingerprinter};
    use std::io::Cursor;

    #[test]
    fn reader_and_bytes_agree_across_chunk_boundaries() {
        let payload: Vec<u8> = (0..200_000_u32).map(|i| (i % 251) as u8).collect();
        for algorithm in [
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Blake3,
        ] {
            let fingerprinter = Fingerprinter::new(algorithm);
            let from_bytes = fingerprinter.fingerprint_bytes(&payload).expect("fingerprint bytes");
            let from_reader = fingerprinter
                .fingerprint_reader(Cursor::new(payload.clone()))
                .expect("fingerprint reader");
            assert_eq!(from_bytes, from_reader);
            assert_eq!(from_bytes.as_str().len(), algorithm.hex_len());
        }
    }

    #[test]
    fn digest_algorithm_parses_case_insensitively() {
        assert_eq!("SHA256".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha256));
        assert!("crc32".parse::<DigestAlgorithm>().is_err());
    }
}
