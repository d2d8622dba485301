//! Length-Prefixed Frame Codec
//!
//! This module encodes and decodes the request and response frames described in
//! [`crate::protocol::types`]. All functions are pure: they operate on byte
//! slices and never touch a socket.
//!
//! ## How Decoding Works
//!
//! The decoders read from a buffer and return either:
//! - `Ok(Some((value, consumed)))` - a complete frame, `consumed` bytes were used
//! - `Ok(None)` - the frame is incomplete, nothing was consumed
//! - `Err(ProtocolError)` - the bytes can never form a valid frame
//!
//! This design allows the caller to:
//! 1. Append incoming network data to a buffer
//! 2. Call `decode_request()` to attempt decoding
//! 3. If successful, advance the buffer by `consumed` bytes
//! 4. If incomplete, wait for more data
//! 5. If error, drop the client

use crate::protocol::types::{
    Response, Status, HEADER_LEN, LEN_FIELD, MAX_ARGS, MAX_MESSAGE_SIZE, MAX_PAYLOAD_LEN,
};
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The declared or computed frame body exceeds the maximum
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The request declares more arguments than allowed
    #[error("too many arguments: {count} (max: {max})")]
    TooManyArgs { count: usize, max: usize },

    /// A length field points past the end of the frame
    #[error("truncated frame: field at offset {offset} needs {needed} bytes, frame has {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// The arguments end before the frame does
    #[error("{count} trailing bytes after the last argument")]
    TrailingBytes { count: usize },

    /// A response carries a status code we do not know
    #[error("unknown status code: {0}")]
    UnknownStatus(u32),
}

/// Result type for codec operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[inline]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; LEN_FIELD];
    raw.copy_from_slice(&buf[offset..offset + LEN_FIELD]);
    u32::from_le_bytes(raw)
}

/// Splits a complete frame off the front of `buf`.
///
/// Returns the frame body (everything after the header) and the total number
/// of bytes the frame occupies, or `None` if the frame has not fully arrived.
fn frame_body(buf: &[u8]) -> ProtocolResult<Option<(&[u8], usize)>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let total_len = read_u32(buf, 0) as usize;
    if total_len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: total_len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let frame_len = HEADER_LEN + total_len;
    if buf.len() < frame_len {
        return Ok(None);
    }

    Ok(Some((&buf[HEADER_LEN..frame_len], frame_len)))
}

/// Encodes a request into `buf`.
///
/// Nothing is written if the request would exceed the protocol limits.
pub fn encode_request_into<A: AsRef<[u8]>>(args: &[A], buf: &mut BytesMut) -> ProtocolResult<()> {
    if args.len() > MAX_ARGS {
        return Err(ProtocolError::TooManyArgs {
            count: args.len(),
            max: MAX_ARGS,
        });
    }

    let total_len = args
        .iter()
        .fold(LEN_FIELD, |acc, arg| acc + LEN_FIELD + arg.as_ref().len());
    if total_len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: total_len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    buf.reserve(HEADER_LEN + total_len);
    buf.put_u32_le(total_len as u32);
    buf.put_u32_le(args.len() as u32);
    for arg in args {
        let arg = arg.as_ref();
        buf.put_u32_le(arg.len() as u32);
        buf.put_slice(arg);
    }

    Ok(())
}

/// Encodes a request frame.
///
/// # Example
///
/// ```
/// use pollkv::protocol::{decode_request, encode_request};
///
/// let frame = encode_request(&["SET", "foo", "bar"]).unwrap();
/// let (args, consumed) = decode_request(&frame).unwrap().unwrap();
/// assert_eq!(consumed, frame.len());
/// assert_eq!(args[1], "foo");
/// ```
pub fn encode_request<A: AsRef<[u8]>>(args: &[A]) -> ProtocolResult<Bytes> {
    let mut buf = BytesMut::new();
    encode_request_into(args, &mut buf)?;
    Ok(buf.freeze())
}

/// Attempts to decode one request from the front of `buf`.
pub fn decode_request(buf: &[u8]) -> ProtocolResult<Option<(Vec<Bytes>, usize)>> {
    let (body, consumed) = match frame_body(buf)? {
        Some(frame) => frame,
        None => return Ok(None),
    };

    if body.len() < LEN_FIELD {
        return Err(ProtocolError::Truncated {
            offset: 0,
            needed: LEN_FIELD,
            len: body.len(),
        });
    }

    let count = read_u32(body, 0) as usize;
    if count > MAX_ARGS {
        return Err(ProtocolError::TooManyArgs {
            count,
            max: MAX_ARGS,
        });
    }

    let mut args = Vec::with_capacity(count);
    let mut pos = LEN_FIELD;
    for _ in 0..count {
        if pos + LEN_FIELD > body.len() {
            return Err(ProtocolError::Truncated {
                offset: pos,
                needed: LEN_FIELD,
                len: body.len(),
            });
        }
        let arg_len = read_u32(body, pos) as usize;
        pos += LEN_FIELD;

        if arg_len > body.len() - pos {
            return Err(ProtocolError::Truncated {
                offset: pos,
                needed: arg_len,
                len: body.len(),
            });
        }
        args.push(Bytes::copy_from_slice(&body[pos..pos + arg_len]));
        pos += arg_len;
    }

    if pos != body.len() {
        return Err(ProtocolError::TrailingBytes {
            count: body.len() - pos,
        });
    }

    Ok(Some((args, consumed)))
}

/// Encodes a response frame, rejecting payloads that cannot fit in one frame.
pub fn encode_response(status: Status, payload: &[u8]) -> ProtocolResult<Bytes> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::MessageTooLarge {
            size: LEN_FIELD + payload.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + LEN_FIELD + payload.len());
    buf.put_u32_le((LEN_FIELD + payload.len()) as u32);
    buf.put_u32_le(status.code());
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Attempts to decode one response from the front of `buf`.
pub fn decode_response(buf: &[u8]) -> ProtocolResult<Option<(Response, usize)>> {
    let (body, consumed) = match frame_body(buf)? {
        Some(frame) => frame,
        None => return Ok(None),
    };

    if body.len() < LEN_FIELD {
        return Err(ProtocolError::Truncated {
            offset: 0,
            needed: LEN_FIELD,
            len: body.len(),
        });
    }

    let code = read_u32(body, 0);
    let status = Status::from_code(code).ok_or(ProtocolError::UnknownStatus(code))?;
    let payload = Bytes::copy_from_slice(&body[LEN_FIELD..]);

    Ok(Some((Response::new(status, payload), consumed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn test_encode_get_request() {
        let encoded = encode_request(&["GET", "foo"]).unwrap();
        let expected = frame(&[
            &15u32.to_le_bytes(),
            &2u32.to_le_bytes(),
            &3u32.to_le_bytes(),
            b"GET",
            &3u32.to_le_bytes(),
            b"foo",
        ]);
        assert_eq!(&encoded[..], &expected[..]);
    }

    #[test]
    fn test_decode_request() {
        let input = encode_request(&["SET", "user:101", "Ariz"]).unwrap();
        let (args, consumed) = decode_request(&input).unwrap().unwrap();
        assert_eq!(consumed, input.len());
        assert_eq!(
            args,
            vec![
                Bytes::from("SET"),
                Bytes::from("user:101"),
                Bytes::from("Ariz"),
            ]
        );
    }

    #[test]
    fn test_decode_request_leaves_following_frame() {
        let mut input = encode_request(&["GET", "a"]).unwrap().to_vec();
        let first_len = input.len();
        input.extend_from_slice(&encode_request(&["GET", "b"]).unwrap());

        let (args, consumed) = decode_request(&input).unwrap().unwrap();
        assert_eq!(consumed, first_len);
        assert_eq!(args[1], Bytes::from("a"));

        let (args, _) = decode_request(&input[consumed..]).unwrap().unwrap();
        assert_eq!(args[1], Bytes::from("b"));
    }

    #[test]
    fn test_decode_request_every_split_point() {
        let input = encode_request(&["SET", "key", "some value"]).unwrap();

        for split in 0..input.len() {
            assert!(
                decode_request(&input[..split]).unwrap().is_none(),
                "prefix of {} bytes decoded as complete",
                split
            );

            // second delivery completes the frame
            let mut buf = BytesMut::from(&input[..split]);
            buf.extend_from_slice(&input[split..]);
            let (args, consumed) = decode_request(&buf).unwrap().unwrap();
            assert_eq!(consumed, input.len());
            assert_eq!(args[2], Bytes::from("some value"));
        }
    }

    #[test]
    fn test_request_roundtrip_sweep() {
        let body_limit = MAX_MESSAGE_SIZE - LEN_FIELD;
        let mut cases: Vec<Vec<Vec<u8>>> = vec![
            vec![],
            vec![vec![]],
            vec![vec![]; 10],
            // every slot holds an empty argument; exactly fills the frame
            vec![vec![]; body_limit / LEN_FIELD],
            vec![vec![b'a'; body_limit - LEN_FIELD]],
            vec![vec![b'a'; body_limit - LEN_FIELD - 1]],
            vec![vec![1u8; 2000], vec![2u8; body_limit - 2000 - 2 * LEN_FIELD]],
        ];
        for count in 1..=64usize {
            cases.push(
                (0..count)
                    .map(|i| (0..(i * 7 + count) % 23).map(|b| (b * 31 + i) as u8).collect())
                    .collect(),
            );
        }

        for args in &cases {
            let encoded = encode_request(args).unwrap();
            let expected_len =
                HEADER_LEN + LEN_FIELD + args.iter().map(|a| LEN_FIELD + a.len()).sum::<usize>();
            assert_eq!(encoded.len(), expected_len);
            assert!(encoded.len() <= HEADER_LEN + MAX_MESSAGE_SIZE);

            let (decoded, consumed) = decode_request(&encoded).unwrap().unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decoded.len(), args.len());
            for (got, want) in decoded.iter().zip(args) {
                assert_eq!(&got[..], &want[..]);
            }
        }
    }

    #[test]
    fn test_encode_rejects_just_over_limits() {
        let body_limit = MAX_MESSAGE_SIZE - LEN_FIELD;

        let one_too_long = vec![vec![b'a'; body_limit - LEN_FIELD + 1]];
        assert!(matches!(
            encode_request(&one_too_long),
            Err(ProtocolError::MessageTooLarge { .. })
        ));

        // MAX_ARGS empty arguments already overflow the size limit
        let empties = vec![Vec::<u8>::new(); MAX_ARGS];
        assert!(matches!(
            encode_request(&empties),
            Err(ProtocolError::MessageTooLarge { .. })
        ));

        let too_many = vec![Vec::<u8>::new(); MAX_ARGS + 1];
        assert_eq!(
            encode_request(&too_many),
            Err(ProtocolError::TooManyArgs {
                count: MAX_ARGS + 1,
                max: MAX_ARGS,
            })
        );
    }

    #[test]
    fn test_decode_empty_request() {
        let input = encode_request::<&str>(&[]).unwrap();
        let (args, consumed) = decode_request(&input).unwrap().unwrap();
        assert!(args.is_empty());
        assert_eq!(consumed, 8);
    }

    #[test]
    fn test_binary_safe_arguments() {
        let value: &[u8] = b"hel\x00o\xff";
        let input = encode_request(&[b"SET".as_ref(), b"k".as_ref(), value]).unwrap();
        let (args, _) = decode_request(&input).unwrap().unwrap();
        assert_eq!(&args[2][..], value);
    }

    #[test]
    fn test_decode_oversized_frame() {
        let input = ((MAX_MESSAGE_SIZE + 1) as u32).to_le_bytes();
        assert_eq!(
            decode_request(&input),
            Err(ProtocolError::MessageTooLarge {
                size: MAX_MESSAGE_SIZE + 1,
                max: MAX_MESSAGE_SIZE,
            })
        );
    }

    #[test]
    fn test_decode_max_size_frame() {
        // count + one length field + payload fills the frame exactly
        let arg = vec![b'x'; MAX_MESSAGE_SIZE - 2 * LEN_FIELD];
        let input = encode_request(&[&arg]).unwrap();
        assert_eq!(input.len(), HEADER_LEN + MAX_MESSAGE_SIZE);
        let (args, _) = decode_request(&input).unwrap().unwrap();
        assert_eq!(args[0].len(), arg.len());
    }

    #[test]
    fn test_encode_oversized_request() {
        let arg = vec![b'x'; MAX_MESSAGE_SIZE];
        assert!(matches!(
            encode_request(&[&arg]),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_too_many_args() {
        let input = frame(&[&4u32.to_le_bytes(), &((MAX_ARGS + 1) as u32).to_le_bytes()]);
        assert_eq!(
            decode_request(&input),
            Err(ProtocolError::TooManyArgs {
                count: MAX_ARGS + 1,
                max: MAX_ARGS,
            })
        );
    }

    #[test]
    fn test_decode_argument_overruns_frame() {
        // one argument claiming 10 bytes but only 3 present
        let input = frame(&[
            &11u32.to_le_bytes(),
            &1u32.to_le_bytes(),
            &10u32.to_le_bytes(),
            b"abc",
        ]);
        assert!(matches!(
            decode_request(&input),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_missing_argument() {
        // declares two arguments, carries one
        let input = frame(&[
            &11u32.to_le_bytes(),
            &2u32.to_le_bytes(),
            &3u32.to_le_bytes(),
            b"GET",
        ]);
        assert!(matches!(
            decode_request(&input),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let input = frame(&[
            &13u32.to_le_bytes(),
            &1u32.to_le_bytes(),
            &3u32.to_le_bytes(),
            b"GET",
            b"xx",
        ]);
        assert_eq!(
            decode_request(&input),
            Err(ProtocolError::TrailingBytes { count: 2 })
        );
    }

    #[test]
    fn test_decode_body_without_count() {
        let input = frame(&[&2u32.to_le_bytes(), b"ab"]);
        assert!(matches!(
            decode_request(&input),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_response_roundtrip() {
        let encoded = encode_response(Status::Ok, b"bar").unwrap();
        let (response, consumed) = decode_response(&encoded).unwrap().unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(response, Response::value(Bytes::from("bar")));
    }

    #[test]
    fn test_encode_response_matches_encode_into() {
        let response = Response::error("ERR unknown command 'PING'");
        let mut buf = BytesMut::new();
        response.encode_into(&mut buf);
        assert_eq!(
            encode_response(response.status, &response.payload).unwrap(),
            buf.freeze()
        );
    }

    #[test]
    fn test_decode_response_incomplete() {
        let encoded = encode_response(Status::NotFound, b"").unwrap();
        for split in 0..encoded.len() {
            assert!(decode_response(&encoded[..split]).unwrap().is_none());
        }
    }

    #[test]
    fn test_decode_response_unknown_status() {
        let input = frame(&[&4u32.to_le_bytes(), &9u32.to_le_bytes()]);
        assert_eq!(decode_response(&input), Err(ProtocolError::UnknownStatus(9)));
    }

    #[test]
    fn test_encode_response_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(encode_response(Status::Ok, &payload).is_err());
        let payload = vec![0u8; MAX_PAYLOAD_LEN];
        assert!(encode_response(Status::Ok, &payload).is_ok());
    }
}
