//! Remote backend
//!
//! `Backend` over one TCP connection to a `bucketdb-server`. Calls are
//! serialized on the connection; each is one request/response round trip.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{BucketError, Result};
use crate::protocol::{read_response, write_command, Command, Reply};

use super::{Backend, ScanPage, TxnOutcome, TxnRequest};

struct Stream {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// Client side of the backend protocol
pub struct RemoteBackend {
    stream: Mutex<Option<Stream>>,
    peer_addr: String,
}

impl RemoteBackend {
    /// Connect without timeouts
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_timeouts(addr, 0, 0)
    }

    /// Connect with read/write timeouts in milliseconds (0 = none)
    pub fn connect_with_timeouts(addr: impl ToSocketAddrs, read_ms: u64, write_ms: u64) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        if read_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::debug!("Connected to backend at {}", peer_addr);

        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);

        Ok(Self {
            stream: Mutex::new(Some(Stream { reader, writer })),
            peer_addr,
        })
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Health check
    pub fn ping(&self) -> Result<()> {
        match self.call(Command::Ping)? {
            Reply::Pong => Ok(()),
            other => Err(unexpected("PING", &other)),
        }
    }

    /// One request/response round trip
    fn call(&self, command: Command) -> Result<Reply> {
        let mut guard = self.stream.lock();
        let stream = guard
            .as_mut()
            .ok_or_else(|| BucketError::Backend("connection closed".to_string()))?;

        tracing::trace!("-> {} {:?}", self.peer_addr, command.command_type());
        write_command(&mut stream.writer, &command)?;
        read_response(&mut stream.reader)?.into_reply()
    }

    fn call_bool(&self, command: Command) -> Result<bool> {
        match self.call(command)? {
            Reply::Bool(value) => Ok(value),
            other => Err(unexpected("boolean", &other)),
        }
    }

    fn call_value(&self, command: Command) -> Result<Option<Vec<u8>>> {
        match self.call(command)? {
            Reply::Value(value) => Ok(value),
            other => Err(unexpected("value", &other)),
        }
    }
}

impl Backend for RemoteBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        self.call_bool(Command::Exists { key: key.to_string() })
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.call_value(Command::Get { key: key.to_string() })
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        match self.call(Command::Set {
            key: key.to_string(),
            value: value.to_vec(),
        })? {
            Reply::Done => Ok(()),
            other => Err(unexpected("SET", &other)),
        }
    }

    fn hexists(&self, key: &str, field: &[u8]) -> Result<bool> {
        self.call_bool(Command::HExists {
            key: key.to_string(),
            field: field.to_vec(),
        })
    }

    fn hget(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
        self.call_value(Command::HGet {
            key: key.to_string(),
            field: field.to_vec(),
        })
    }

    fn hset(&self, key: &str, field: &[u8], value: &[u8]) -> Result<bool> {
        self.call_bool(Command::HSet {
            key: key.to_string(),
            field: field.to_vec(),
            value: value.to_vec(),
        })
    }

    fn hdel(&self, key: &str, field: &[u8]) -> Result<bool> {
        self.call_bool(Command::HDel {
            key: key.to_string(),
            field: field.to_vec(),
        })
    }

    fn hlen(&self, key: &str) -> Result<u64> {
        match self.call(Command::HLen { key: key.to_string() })? {
            Reply::Int(len) => Ok(len),
            other => Err(unexpected("HLEN", &other)),
        }
    }

    fn config_get(&self, name: &str) -> Result<Option<String>> {
        match self.call(Command::ConfigGet { name: name.to_string() })? {
            Reply::Text(value) => Ok(value),
            other => Err(unexpected("CONFIG GET", &other)),
        }
    }

    fn watch(&self, keys: &[String]) -> Result<Vec<u64>> {
        match self.call(Command::Watch { keys: keys.to_vec() })? {
            Reply::Versions(versions) if versions.len() == keys.len() => Ok(versions),
            other => Err(unexpected("WATCH", &other)),
        }
    }

    fn exec(&self, txn: &TxnRequest) -> Result<TxnOutcome> {
        match self.call(Command::Exec { txn: txn.clone() })? {
            Reply::Txn(outcome) => Ok(outcome),
            other => Err(unexpected("EXEC", &other)),
        }
    }

    fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage<String>> {
        match self.call(Command::Scan {
            cursor,
            pattern: pattern.to_string(),
            count: clamp_count(count),
        })? {
            Reply::Keys(page) => Ok(page),
            other => Err(unexpected("SCAN", &other)),
        }
    }

    fn hscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: Option<&[u8]>,
        count: usize,
    ) -> Result<ScanPage<(Vec<u8>, Vec<u8>)>> {
        match self.call(Command::HScan {
            key: key.to_string(),
            cursor,
            pattern: pattern.map(|p| p.to_vec()),
            count: clamp_count(count),
        })? {
            Reply::Fields(page) => Ok(page),
            other => Err(unexpected("HSCAN", &other)),
        }
    }

    fn close(&self) -> Result<()> {
        if let Some(stream) = self.stream.lock().take() {
            tracing::debug!("Closing connection to {}", self.peer_addr);
            match stream.writer.get_ref().shutdown(Shutdown::Both) {
                Err(e) if e.kind() != std::io::ErrorKind::NotConnected => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Drop for RemoteBackend {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn clamp_count(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn unexpected(expected: &str, reply: &Reply) -> BucketError {
    BucketError::Protocol(format!("Expected {} reply, got {:?}", expected, reply))
}
