//! Protocol Module
//!
//! Defines the wire protocol between `RemoteBackend` and `bucketdb-server`.
//!
//! ## Protocol Format (V1 - Framed bincode)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01 PING       0x02 EXISTS     0x03 GET       0x04 SET
//! - 0x05 HEXISTS    0x06 HGET       0x07 HSET      0x08 HDEL
//! - 0x09 HLEN       0x0A CONFIG GET 0x0B WATCH     0x0C EXEC
//! - 0x0D SCAN       0x0E HSCAN
//!
//! A transaction travels as a single EXEC carrying its queued writes and the
//! versions returned by an earlier WATCH, so MULTI/DISCARD never hit the wire.
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: ERROR

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Reply, Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
