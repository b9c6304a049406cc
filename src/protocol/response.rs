//! Response definitions
//!
//! Represents responses to clients.

use serde::{Deserialize, Serialize};

use crate::backend::{ScanPage, TxnOutcome};
use crate::error::{BucketError, Result};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    Error = 0x01,
}

/// Typed result of a command, carried in an `Ok` response payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Pong,
    Done,
    Bool(bool),
    Int(u64),
    Value(Option<Vec<u8>>),
    Text(Option<String>),
    Versions(Vec<u64>),
    Txn(TxnOutcome),
    Keys(ScanPage<String>),
    Fields(ScanPage<(Vec<u8>, Vec<u8>)>),
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (encoded reply for OK, error message for ERROR)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response carrying `reply`
    pub fn ok(reply: &Reply) -> Result<Self> {
        Ok(Self {
            status: Status::Ok,
            payload: Some(bincode::serialize(reply)?),
        })
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Decode the reply; an ERROR response becomes `BucketError::Backend`
    pub fn into_reply(self) -> Result<Reply> {
        match self.status {
            Status::Ok => {
                let payload = self.payload.ok_or_else(|| {
                    BucketError::Protocol("OK response without reply".to_string())
                })?;
                Ok(bincode::deserialize(&payload)?)
            }
            Status::Error => {
                let message = self
                    .payload
                    .map(|p| String::from_utf8_lossy(&p).into_owned())
                    .unwrap_or_default();
                Err(BucketError::Backend(message))
            }
        }
    }
}
