//! Storage name generation and validation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use time::OffsetDateTime;

/// Upper bound (inclusive) of the random suffix.
const RANDOM_SUFFIX_MAX: u64 = 1_000_000_000;

/// Longest extension carried over from the original file name.
const MAX_EXTENSION_LEN: usize = 16;

/// Longest accepted storage name. Matches common filesystem component limits.
const MAX_NAME_LEN: usize = 255;

/// The name a blob is physically stored under.
///
/// Always a single, safe path component: ASCII alphanumerics plus `-`, `_`
/// and `.`, never starting with a dot.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageName(String);

impl StorageName {
    /// Generate a fresh storage name for an upload.
    ///
    /// The name is `<unix millis>-<random 0..=1e9><.ext>`, where the extension
    /// is the original name's final extension when it is plain ASCII
    /// alphanumeric. Names produced here are never reused: the catalog's
    /// unique index rejects the astronomically unlikely collision.
    pub fn generate(original_name: &str) -> Self {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let suffix = rand::rng().random_range(0..=RANDOM_SUFFIX_MAX);
        let name = match extension_of(original_name) {
            Some(ext) => format!("{millis}-{suffix}.{ext}"),
            None => format!("{millis}-{suffix}"),
        };
        Self(name)
    }

    /// Parse an externally supplied storage name.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidStorageName(
                "storage name cannot be empty".to_string(),
            ));
        }
        if s.len() > MAX_NAME_LEN {
            return Err(crate::Error::InvalidStorageName(format!(
                "storage name exceeds {MAX_NAME_LEN} bytes"
            )));
        }
        if s.starts_with('.') {
            return Err(crate::Error::InvalidStorageName(
                "storage name cannot start with '.'".to_string(),
            ));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.'))
        {
            return Err(crate::Error::InvalidStorageName(format!(
                "invalid character in storage name: {c:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The extension (without the dot), if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.0).extension().and_then(|e| e.to_str())
    }
}

/// Extension of the final path component of a client-supplied name.
fn extension_of(original_name: &str) -> Option<&str> {
    // Clients may send Windows-style paths; only the last component counts.
    let file_name = original_name.rsplit(['/', '\\']).next()?;
    let ext = Path::new(file_name).extension()?.to_str()?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

impl TryFrom<String> for StorageName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<StorageName> for String {
    fn from(name: StorageName) -> Self {
        name.0
    }
}

impl AsRef<str> for StorageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StorageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageName({})", self.0)
    }
}

impl fmt::Display for StorageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
