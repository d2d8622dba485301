//! Command Handler Module
//!
//! This module implements the command processing layer for pollkv.
//! It receives decoded requests, executes them against the store,
//! and returns a status code plus payload.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Frame Codec    │  (protocol module)
//! └────────┬────────┘
//!          │ Vec<Bytes>
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │ &mut Store
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `GET`, `SET`, `DEL`

pub mod handler;

// Re-export the command handler and its trait
pub use handler::{CommandHandler, CommandProcessor};
