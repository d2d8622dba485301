//! Server Module
//!
//! The readiness-driven event loop that multiplexes every client connection
//! on one thread. The reactor owns the store outright, so commands never
//! contend for locks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   accept    ┌───────────────────────────┐
//! │ TcpListener  │────────────>│ HashMap<Token, Connection>│
//! └──────────────┘             └─────────────┬─────────────┘
//!                                            │ handle_io
//!                                            ▼
//!                              ┌───────────────────────────┐
//!                              │  CommandProcessor + Store │
//!                              └───────────────────────────┘
//! ```

pub mod reactor;

pub use reactor::{Reactor, ReactorConfig, ServerError, ServerResult, DEFAULT_POLL_TIMEOUT};
