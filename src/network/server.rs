//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel;

use crate::backend::Backend;
use crate::config::ServerConfig;
use crate::error::Result;

use super::Connection;

/// TCP server exposing one backend
pub struct Server<B: Backend + Clone + 'static> {
    config: ServerConfig,
    backend: B,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
}

/// Stops a running server from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Stop accepting; workers finish their current connections
    pub fn shutdown(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            // Wake the blocking accept
            let _ = TcpStream::connect(self.addr);
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl<B: Backend + Clone + 'static> Server<B> {
    /// Bind the listen address
    pub fn bind(config: ServerConfig, backend: B) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            backend,
            listener,
            local_addr,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            addr: self.local_addr,
        }
    }

    /// Serve until shut down (blocking)
    pub fn run(&self) -> Result<()> {
        let workers = self.config.workers.max(1);
        let (sender, receiver) = channel::bounded::<TcpStream>(workers * 4);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let receiver = receiver.clone();
            let backend = self.backend.clone();
            let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

            handles.push(thread::spawn(move || {
                for stream in receiver.iter() {
                    let served = Connection::new(stream, backend.clone()).and_then(|mut conn| {
                        conn.set_timeouts(read_ms, write_ms)?;
                        conn.handle()
                    });
                    if let Err(e) = served {
                        tracing::warn!("Worker {} connection error: {}", worker_id, e);
                    }
                }
                tracing::debug!("Worker {} stopped", worker_id);
            }));
        }

        tracing::info!("Listening on {} with {} workers", self.local_addr, workers);

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    if sender.send(stream).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        drop(sender);
        for handle in handles {
            let _ = handle.join();
        }

        tracing::info!("Server on {} stopped", self.local_addr);
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown_handle().shutdown();
    }
}
