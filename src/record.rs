//! Record types
//!
//! A record is an id plus an opaque payload. Ids are rendered as decimal
//! strings wherever they are persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BucketError;

/// Identifier of a record, allocated once and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Decimal form used as a hash field/value in the backend
    pub fn to_bytes(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }

    /// Parse a backend-stored id
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BucketError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| BucketError::MalformedId(String::from_utf8_lossy(bytes).into_owned()))?;
        text.parse()
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = BucketError;

    /// Accepts plain decimal digits only; 0 is never allocated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BucketError::MalformedId(s.to_string()));
        }
        match s.parse::<u64>() {
            Ok(0) | Err(_) => Err(BucketError::MalformedId(s.to_string())),
            Ok(id) => Ok(Self(id)),
        }
    }
}

/// A stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub data: Vec<u8>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }
}

/// Short printable form of a payload for error messages and logs
pub(crate) fn preview(data: &[u8]) -> String {
    const MAX: usize = 64;
    let text = String::from_utf8_lossy(data);
    if text.chars().count() <= MAX {
        text.into_owned()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}
