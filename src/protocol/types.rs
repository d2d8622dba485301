//! Wire Protocol Data Types
//!
//! This module defines the constants, status codes and response type used by
//! the pollkv wire protocol. Every message is a length-prefixed binary frame.
//!
//! ## Frame Format
//!
//! All integers are 4-byte little-endian unsigned values.
//!
//! ```text
//! request:   +-----------+-----------+---------+------+---------+------+
//!            | total_len | arg_count | arg_len | arg  | arg_len | arg  | ...
//!            +-----------+-----------+---------+------+---------+------+
//!
//! response:  +-----------+-------------+---------+
//!            | total_len | status_code | payload |
//!            +-----------+-------------+---------+
//! ```
//!
//! `total_len` counts every byte that follows it.
//!
//! ## Examples
//!
//! `GET foo` is encoded as:
//! `0f000000 02000000 03000000 "GET" 03000000 "foo"`
//!
//! An OK response carrying `bar`:
//! `07000000 00000000 "bar"`

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Size of the `total_len` header preceding every frame.
pub const HEADER_LEN: usize = 4;

/// Size of every length and count field inside a frame.
pub const LEN_FIELD: usize = 4;

/// Maximum value of `total_len` accepted in either direction.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Largest complete frame on the wire (header plus body).
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_MESSAGE_SIZE;

/// Maximum number of arguments in a single request.
pub const MAX_ARGS: usize = 1024;

/// Largest payload a response can carry.
pub const MAX_PAYLOAD_LEN: usize = MAX_MESSAGE_SIZE - LEN_FIELD;

/// Status code carried in the header of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Status {
    /// The command succeeded.
    Ok = 0,
    /// The command was rejected; the payload holds a message.
    Error = 1,
    /// The requested key does not exist.
    NotFound = 2,
}

impl Status {
    /// Returns the wire code of this status.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Maps a wire code back to a status, if it is known.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::Error),
            2 => Some(Status::NotFound),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Error => write!(f, "ERROR"),
            Status::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

/// A decoded or to-be-encoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: Bytes,
}

impl Response {
    /// Creates a response with the given status and payload.
    pub fn new(status: Status, payload: impl Into<Bytes>) -> Self {
        Self {
            status,
            payload: payload.into(),
        }
    }

    /// Common response for successful operations without a payload.
    pub fn ok() -> Self {
        Self::new(Status::Ok, Bytes::new())
    }

    /// Successful response carrying a value.
    ///
    /// # Example
    /// ```
    /// use pollkv::protocol::types::{Response, Status};
    /// use bytes::Bytes;
    /// let res = Response::value(Bytes::from("bar"));
    /// assert_eq!(res.status, Status::Ok);
    /// ```
    pub fn value(data: impl Into<Bytes>) -> Self {
        Self::new(Status::Ok, data)
    }

    /// Response for a missing key.
    pub fn not_found() -> Self {
        Self::new(Status::NotFound, Bytes::new())
    }

    /// Creates an error response with a human-readable message.
    ///
    /// # Example
    /// ```
    /// use pollkv::protocol::types::Response;
    /// let err = Response::error("ERR unknown command");
    /// assert!(err.is_error());
    /// ```
    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(Status::Error, Bytes::from(msg.into()))
    }

    /// Returns true if this response carries the ERROR status.
    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Number of bytes this response occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + LEN_FIELD + self.wire_payload().len()
    }

    /// Appends the wire form of this response to `buf`.
    ///
    /// A payload longer than [`MAX_PAYLOAD_LEN`] is cut at that length, so the
    /// frame never exceeds [`MAX_MESSAGE_SIZE`]. See
    /// [`crate::protocol::encode_response`] for the variant that rejects it
    /// instead.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let payload = self.wire_payload();
        buf.reserve(HEADER_LEN + LEN_FIELD + payload.len());
        buf.put_u32_le((LEN_FIELD + payload.len()) as u32);
        buf.put_u32_le(self.status.code());
        buf.put_slice(payload);
    }

    fn wire_payload(&self) -> &[u8] {
        &self.payload[..self.payload.len().min(MAX_PAYLOAD_LEN)]
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.payload) {
            Ok(s) => write!(f, "[{}] {}", self.status, s),
            Err(_) => write!(
                f,
                "[{}] (binary data, {} bytes)",
                self.status,
                self.payload.len()
            ),
        }
    }
}
