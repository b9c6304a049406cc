//! BucketDB Backend Server
//!
//! Serves an in-memory hash-map-capable backend over TCP.

use clap::Parser;
use bucketdb::network::Server;
use bucketdb::{MemoryBackend, ServerConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// BucketDB backend server
#[derive(Parser, Debug)]
#[command(name = "bucketdb-server")]
#[command(about = "In-memory hash-map backend for BucketDB stores")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7379")]
    listen: String,

    /// Worker threads serving connections
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Hash capacity reported to stores (their shard size)
    #[arg(long, default_value = "512")]
    hash_max_entries: u64,

    /// Connection read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    /// Connection write timeout in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    write_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bucketdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("BucketDB Server v{}", bucketdb::VERSION);
    tracing::info!("Listen address: {}", args.listen);
    tracing::info!("hash-max-entries: {}", args.hash_max_entries);

    let config = ServerConfig::builder()
        .listen_addr(&args.listen)
        .workers(args.workers)
        .hash_max_entries(args.hash_max_entries)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms)
        .build();

    let backend = MemoryBackend::with_hash_max_entries(config.hash_max_entries);

    let server = match Server::bind(config, backend) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
