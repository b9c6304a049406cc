//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use crate::backend::Backend;
use crate::error::{BucketError, Result};
use crate::protocol::{read_command, write_response, Command, Reply, Response};

/// Handles a single client connection
pub struct Connection<B: Backend> {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Backend the commands run against
    backend: B,

    /// Peer address for logging
    peer_addr: String,
}

impl<B: Backend> Connection<B> {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, backend: B) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            backend,
            peer_addr,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads commands in a loop and sends responses.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(BucketError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} disconnected ({:?})", self.peer_addr, e.kind());
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = self.send_response(Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!("Received command from {}: {:?}", self.peer_addr, command.command_type());

            let response = self.execute_command(command);

            if let Err(e) = self.send_response(response) {
                if let BucketError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Execute a command and return a response
    fn execute_command(&self, command: Command) -> Response {
        let reply = dispatch(&self.backend, command);
        match reply.and_then(|reply| Response::ok(&reply)) {
            Ok(response) => response,
            Err(e) => Response::error(&e.to_string()),
        }
    }

    fn send_response(&mut self, response: Response) -> Result<()> {
        write_response(&mut self.writer, &response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Run one command against a backend
pub fn dispatch<B: Backend + ?Sized>(backend: &B, command: Command) -> Result<Reply> {
    let reply = match command {
        Command::Ping => Reply::Pong,
        Command::Exists { key } => Reply::Bool(backend.exists(&key)?),
        Command::Get { key } => Reply::Value(backend.get(&key)?),
        Command::Set { key, value } => {
            backend.set(&key, &value)?;
            Reply::Done
        }
        Command::HExists { key, field } => Reply::Bool(backend.hexists(&key, &field)?),
        Command::HGet { key, field } => Reply::Value(backend.hget(&key, &field)?),
        Command::HSet { key, field, value } => Reply::Bool(backend.hset(&key, &field, &value)?),
        Command::HDel { key, field } => Reply::Bool(backend.hdel(&key, &field)?),
        Command::HLen { key } => Reply::Int(backend.hlen(&key)?),
        Command::ConfigGet { name } => Reply::Text(backend.config_get(&name)?),
        Command::Watch { keys } => Reply::Versions(backend.watch(&keys)?),
        Command::Exec { txn } => Reply::Txn(backend.exec(&txn)?),
        Command::Scan { cursor, pattern, count } => {
            Reply::Keys(backend.scan(cursor, &pattern, count as usize)?)
        }
        Command::HScan {
            key,
            cursor,
            pattern,
            count,
        } => Reply::Fields(backend.hscan(&key, cursor, pattern.as_deref(), count as usize)?),
    };
    Ok(reply)
}

fn is_disconnect(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}
