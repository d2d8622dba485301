//! Wire Protocol Implementation
//!
//! This module implements the length-prefixed binary protocol spoken between
//! pollkv clients and the server.
//!
//! ## Overview
//!
//! Every message is a frame: a 4-byte little-endian length followed by that
//! many bytes. Requests carry an argument list, responses carry a status code
//! and an optional payload. Decoding tolerates partial input, so the same
//! buffer can be retried as more bytes arrive from the socket.
//!
//! ## Modules
//!
//! - `types`: Status codes, `Response`, and protocol limits
//! - `codec`: Pure encode/decode functions over byte buffers
//!
//! ## Example
//!
//! ```
//! use pollkv::protocol::{decode_response, encode_request, encode_response, Status};
//!
//! let request = encode_request(&["GET", "name"]).unwrap();
//! assert_eq!(request.len(), 23);
//!
//! let reply = encode_response(Status::Ok, b"Ariz").unwrap();
//! let (response, consumed) = decode_response(&reply).unwrap().unwrap();
//! assert_eq!(consumed, reply.len());
//! assert_eq!(&response.payload[..], b"Ariz");
//! ```

pub mod codec;
pub mod types;

// Re-export commonly used types for convenience
pub use codec::{
    decode_request, decode_response, encode_request, encode_request_into, encode_response,
    ProtocolError, ProtocolResult,
};
pub use types::{Response, Status, MAX_ARGS, MAX_FRAME_LEN, MAX_MESSAGE_SIZE, MAX_PAYLOAD_LEN};
