//! Network Module
//!
//! TCP server side of the backend protocol.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Fixed worker pool fed over a crossbeam channel
//! - Each command dispatched straight to the served `Backend`

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::{dispatch, Connection};
