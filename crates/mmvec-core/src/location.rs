use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const SCHEME: &str = "s3://";

/// A bucket/key pair addressed as `s3://bucket/key`.
///
/// The key may be empty (`s3://bucket/`), which addresses a bucket root when
/// used as an output prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }

    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri.strip_prefix(SCHEME).ok_or_else(|| Error::InvalidLocation(uri.to_string()))?;
        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(Error::InvalidLocation(uri.to_string()));
        }
        Ok(Self::new(bucket, key))
    }

    /// Append one path component under this location's key.
    pub fn join(&self, name: &str) -> Self {
        let prefix = self.key.trim_end_matches('/');
        let name = name.trim_start_matches('/');
        let key = if prefix.is_empty() { name.to_string() } else { format!("{prefix}/{name}") };
        Self::new(self.bucket.clone(), key)
    }

    pub fn uri(&self) -> String {
        format!("{SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl FromStr for ObjectLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}
