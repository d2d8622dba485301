//! Connection Handling Module
//!
//! This module manages individual client connections to pollkv.
//! Every connection is a small state machine owned by the reactor; nothing
//! here spawns tasks or blocks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Reactor (server module)                    │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ readiness event
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Connection::handle_io                    │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Decode frame│───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │         ▲                                     │             │
//! │         │                                     ▼             │
//! │         │                            ┌─────────────┐        │
//! │         └─────── fully flushed ──────│ Flush resp  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Non-blocking I/O**: would-block hands control back to the reactor
//! - **Bounded Buffers**: the read buffer never exceeds one maximum frame
//! - **Pipelining**: multiple requests in a single TCP packet are all answered
//! - **Statistics**: tracks connection and command metrics

pub mod handler;

// Re-export commonly used types
pub use handler::{Connection, ConnectionError, ConnectionStats, Phase};
