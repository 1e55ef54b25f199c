//! Content identity and content record model.
//!
//! # Responsibility
//! - Represent a content fingerprint as a validated, comparable value.
//! - Define the canonical record stored once per fingerprint.
//!
//! # Invariants
//! - A `ContentId` is lowercase hex of a 128-bit or 256-bit digest.
//! - `ContentId` values are never empty; an empty digest cannot be built.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Accepted hex lengths: 128-bit (md5) and 256-bit (sha256, blake3) digests.
const VALID_HEX_LENGTHS: [usize; 2] = [32, 64];

/// Weak reference to a publication row in the metadata table group.
pub type MetadataRef = i64;

/// Validation failure for textual content identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentIdError {
    InvalidLength(usize),
    InvalidCharacter(char),
}

impl Display for ContentIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLength(len) => {
                write!(f, "content id must be 32 or 64 hex characters, got {len}")
            }
            Self::InvalidCharacter(c) => {
                write!(f, "content id must be lowercase hex, found `{c}`")
            }
        }
    }
}

impl Error for ContentIdError {}

/// Content fingerprint in lowercase hex form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Parses a textual identity, accepting upper-case hex and normalizing it.
    pub fn parse(value: &str) -> Result<Self, ContentIdError> {
        let normalized = value.trim().to_ascii_lowercase();
        if !VALID_HEX_LENGTHS.contains(&normalized.len()) {
            return Err(ContentIdError::InvalidLength(normalized.len()));
        }
        if let Some(bad) = normalized.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ContentIdError::InvalidCharacter(bad));
        }
        Ok(Self(normalized))
    }

    /// Builds an identity from raw digest bytes.
    pub(crate) fn from_digest(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = ContentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(value: ContentId) -> Self {
        value.0
    }
}

/// Canonical record for one unique piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content_id: ContentId,
    /// Optional link into the bibliographic tables; never joined by core.
    pub metadata_ref: Option<MetadataRef>,
}
