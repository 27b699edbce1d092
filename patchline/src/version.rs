use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A database schema version, made of a major version line and a patch level within that line.
///
/// Versions are ordered by major first and patch second, so `1.9 < 2.0 < 2.1`.
/// Within a major line, patch `0` is the state produced by that line's `setup.sql`
/// (or by the migration script from the previous line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, patch: u32) -> Self {
        Self { major, patch }
    }

    /// Returns true if this version is strictly newer than `other`.
    pub fn is_newer(&self, other: &SchemaVersion) -> bool {
        self > other
    }

    /// Returns true if this version is strictly older than `other`.
    pub fn is_older(&self, other: &SchemaVersion) -> bool {
        self < other
    }

    /// Read a version from a file containing a single `Major.Patch` string.
    ///
    /// Surrounding whitespace (including a trailing newline) is ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        raw.trim().parse()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidVersion(s.to_string());
        let (major, patch) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.trim().parse().map_err(|_| invalid())?,
            patch: patch.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl From<(u32, u32)> for SchemaVersion {
    fn from((major, patch): (u32, u32)) -> Self {
        Self { major, patch }
    }
}
