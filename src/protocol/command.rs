//! Command definitions
//!
//! Backend requests sent by `RemoteBackend`.

use serde::{Deserialize, Serialize};

use crate::backend::TxnRequest;

/// Command types (first byte of a request frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Ping = 0x01,
    Exists = 0x02,
    Get = 0x03,
    Set = 0x04,
    HExists = 0x05,
    HGet = 0x06,
    HSet = 0x07,
    HDel = 0x08,
    HLen = 0x09,
    ConfigGet = 0x0A,
    Watch = 0x0B,
    Exec = 0x0C,
    Scan = 0x0D,
    HScan = 0x0E,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let command_type = match byte {
            0x01 => CommandType::Ping,
            0x02 => CommandType::Exists,
            0x03 => CommandType::Get,
            0x04 => CommandType::Set,
            0x05 => CommandType::HExists,
            0x06 => CommandType::HGet,
            0x07 => CommandType::HSet,
            0x08 => CommandType::HDel,
            0x09 => CommandType::HLen,
            0x0A => CommandType::ConfigGet,
            0x0B => CommandType::Watch,
            0x0C => CommandType::Exec,
            0x0D => CommandType::Scan,
            0x0E => CommandType::HScan,
            _ => return None,
        };
        Some(command_type)
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Health check
    Ping,

    Exists { key: String },

    Get { key: String },

    Set { key: String, value: Vec<u8> },

    HExists { key: String, field: Vec<u8> },

    HGet { key: String, field: Vec<u8> },

    HSet { key: String, field: Vec<u8>, value: Vec<u8> },

    HDel { key: String, field: Vec<u8> },

    HLen { key: String },

    ConfigGet { name: String },

    /// Read key versions for a later `Exec`
    Watch { keys: Vec<String> },

    /// Queued writes plus watched versions, applied atomically
    Exec { txn: TxnRequest },

    Scan { cursor: u64, pattern: String, count: u32 },

    HScan {
        key: String,
        cursor: u64,
        pattern: Option<Vec<u8>>,
        count: u32,
    },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Ping => CommandType::Ping,
            Command::Exists { .. } => CommandType::Exists,
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
            Command::HExists { .. } => CommandType::HExists,
            Command::HGet { .. } => CommandType::HGet,
            Command::HSet { .. } => CommandType::HSet,
            Command::HDel { .. } => CommandType::HDel,
            Command::HLen { .. } => CommandType::HLen,
            Command::ConfigGet { .. } => CommandType::ConfigGet,
            Command::Watch { .. } => CommandType::Watch,
            Command::Exec { .. } => CommandType::Exec,
            Command::Scan { .. } => CommandType::Scan,
            Command::HScan { .. } => CommandType::HScan,
        }
    }
}
