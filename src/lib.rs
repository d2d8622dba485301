//! # pollkv - A Single-Threaded Key-Value Server
//!
//! pollkv is an in-memory key-value server that multiplexes every client on
//! one thread with a readiness-based event loop. It speaks a compact
//! length-prefixed binary protocol and keeps its data in a chained hash
//! table that grows incrementally, so no single request pays for a full
//! rehash.
//!
//! ## Features
//!
//! - **Event Loop**: One `mio` poller drives every socket, no locks anywhere
//! - **Pipelining**: Any number of requests may share one TCP segment
//! - **Incremental Resizing**: Rehash work is spread over later operations
//! - **Binary Safe**: Keys and values are arbitrary bytes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              pollkv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │  Reactor    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (mio Poll)  │    │ state mach. │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │                     ┌─────────────┐    ┌──────────────────────────────┐ │
//! │                     │   Frame     │    │            Store             │ │
//! │                     │   Codec     │    │  ┌────────────────────────┐  │ │
//! │                     └─────────────┘    │  │ HashIndex              │  │ │
//! │                                        │  │  primary  │  retiring  │  │ │
//! │                                        │  └────────────────────────┘  │ │
//! │                                        └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use pollkv::commands::CommandHandler;
//! use pollkv::server::{Reactor, ReactorConfig};
//! use pollkv::storage::Store;
//!
//! fn main() -> anyhow::Result<()> {
//!     let listener = std::net::TcpListener::bind("127.0.0.1:1234")?;
//!     let reactor = Reactor::new(
//!         listener,
//!         Store::new(),
//!         CommandHandler::new(),
//!         ReactorConfig::default(),
//!     )?;
//!     reactor.run()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `GET key`
//! - `SET key value`
//! - `DEL key`
//!
//! ## Module Overview
//!
//! - [`protocol`]: Frame codec, status codes and limits
//! - [`storage`]: Incrementally resized hash index and the store built on it
//! - [`commands`]: Command dispatch
//! - [`connection`]: Per-client read/process/write state machine
//! - [`server`]: The event loop
//! - [`client`]: Async client used by the CLI and tests
//!
//! ## Design Highlights
//!
//! ### Incremental Rehashing
//!
//! When the table's load factor passes 8 the current table is retired and a
//! table twice the size takes its place. Every later operation moves a
//! bounded number of entries across, and idle poll cycles do the same, until
//! the retiring table is empty.
//!
//! ### Bounded Buffers
//!
//! A connection never buffers more than one maximum-size frame of input.
//! Frames announcing a length above 4096 bytes close the connection.

pub mod client;
pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use commands::{CommandHandler, CommandProcessor};
pub use connection::{Connection, ConnectionStats};
pub use protocol::{ProtocolError, Response, Status};
pub use server::{Reactor, ReactorConfig, ServerError};
pub use storage::{HashIndex, Store};

/// The default port pollkv listens on
pub const DEFAULT_PORT: u16 = 1234;

/// The default host pollkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of pollkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
