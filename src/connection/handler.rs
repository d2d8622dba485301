//! Connection State Machine
//!
//! This module implements the per-socket state machine the reactor drives.
//! A connection never blocks: every read and write either makes progress or
//! reports would-block, in which case control goes back to the poll loop.
//!
//! ## Connection Lifecycle
//!
//! ```text
//!                 accept()
//!                    │
//!                    ▼
//!        ┌───────────────────────┐   complete frame(s) decoded,
//!   ┌──> │    AwaitingRequest    │ ─────── responses queued ───────┐
//!   │    └───────────┬───────────┘                                 │
//!   │                │ EOF / read error / protocol error           ▼
//!   │                │                              ┌───────────────────────┐
//!   │                ▼                              │   DrainingResponse    │
//!   │    ┌───────────────────────┐  write error     └───────────┬───────────┘
//!   │    │        Closing        │ <────────────────────────────┤
//!   │    └───────────────────────┘                              │
//!   └──────────────────── write buffer fully flushed ───────────┘
//! ```
//!
//! ## Buffer Management
//!
//! The read buffer never holds more than one maximum-size frame. Because any
//! frame that fits is decoded as soon as it is complete, a full buffer always
//! contains a whole frame, so reading can always make progress.
//!
//! Responses to pipelined requests are appended to the write buffer in
//! arrival order and flushed together; a short write leaves the cursor
//! partway through and the rest goes out on the next writable event.

use crate::commands::CommandProcessor;
use crate::protocol::{decode_request, ProtocolError, MAX_FRAME_LEN};
use crate::storage::Store;
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Initial write buffer capacity
const INITIAL_WRITE_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Connections refused because the server was full
    pub connections_rejected: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Connections closed for sending malformed frames
    pub protocol_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Where a connection is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for (more of) a request; interested in readability.
    AwaitingRequest,
    /// Responses are queued; interested in writability.
    DrainingResponse,
    /// Terminal. The reactor releases the connection when it sees this.
    Closing,
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Malformed frame
    #[error("Protocol error: {0}")]
    ProtocolError(#[from] ProtocolError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial frame)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// The socket accepted zero bytes of a non-empty write
    #[error("Socket accepted no data")]
    WriteZero,
}

impl ConnectionError {
    /// Returns true for closes that are part of normal operation.
    pub fn is_graceful(&self) -> bool {
        match self {
            ConnectionError::ClientDisconnected => true,
            ConnectionError::IoError(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// A single client connection.
///
/// This struct manages the read buffer, frame decoding and response
/// flushing for one socket. It is generic over the stream so the state
/// machine can be driven by anything that implements `Read + Write` with
/// non-blocking semantics.
pub struct Connection<S> {
    /// The non-blocking stream for this connection
    stream: S,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Current phase
    phase: Phase,

    /// Bytes read but not yet decoded
    read_buf: BytesMut,

    /// Encoded responses waiting to be sent
    write_buf: BytesMut,

    /// How much of `write_buf` has already been sent
    write_pos: usize,

    /// Why the connection entered `Closing`
    close_reason: Option<ConnectionError>,
}

impl<S: Read + Write> Connection<S> {
    /// Wraps a freshly accepted non-blocking stream.
    pub fn new(stream: S, addr: SocketAddr) -> Self {
        Self {
            stream,
            addr,
            phase: Phase::AwaitingRequest,
            read_buf: BytesMut::with_capacity(MAX_FRAME_LEN),
            write_buf: BytesMut::with_capacity(INITIAL_WRITE_BUFFER_SIZE),
            write_pos: 0,
            close_reason: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Why the connection is closing, if it is.
    pub fn close_reason(&self) -> Option<&ConnectionError> {
        self.close_reason.as_ref()
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn pending_input(&self) -> usize {
        self.read_buf.len()
    }

    /// Number of response bytes not yet written.
    pub fn pending_output(&self) -> usize {
        self.write_buf.len() - self.write_pos
    }

    /// Forces the connection into `Closing`.
    pub fn close(&mut self, reason: ConnectionError) {
        if self.phase != Phase::Closing {
            self.phase = Phase::Closing;
            self.close_reason = Some(reason);
        }
    }

    /// Runs the state machine until it would block or closes.
    ///
    /// Called by the reactor whenever the socket reports readiness.
    pub fn handle_io<P: CommandProcessor>(
        &mut self,
        processor: &P,
        store: &mut Store,
        stats: &ConnectionStats,
    ) {
        loop {
            let progressed = match self.phase {
                Phase::AwaitingRequest => self.try_fill_buffer(processor, store, stats),
                Phase::DrainingResponse => self.try_flush_buffer(stats),
                Phase::Closing => false,
            };
            if !progressed {
                break;
            }
        }
    }

    /// Answers buffered frames, then reads once from the socket.
    ///
    /// Returns true if the caller should keep driving the connection.
    fn try_fill_buffer<P: CommandProcessor>(
        &mut self,
        processor: &P,
        store: &mut Store,
        stats: &ConnectionStats,
    ) -> bool {
        self.process_requests(processor, store, stats);
        match self.phase {
            Phase::AwaitingRequest => {}
            // responses are queued; flush them before reading further
            Phase::DrainingResponse => return true,
            Phase::Closing => return false,
        }

        debug_assert!(self.read_buf.len() < MAX_FRAME_LEN);
        let filled = self.read_buf.len();
        self.read_buf.resize(MAX_FRAME_LEN, 0);
        let result = self.stream.read(&mut self.read_buf[filled..]);

        let n = match result {
            Ok(n) => n,
            Err(e) => {
                self.read_buf.truncate(filled);
                return match e.kind() {
                    io::ErrorKind::WouldBlock => false,
                    io::ErrorKind::Interrupted => true,
                    _ => {
                        self.close(e.into());
                        false
                    }
                };
            }
        };
        self.read_buf.truncate(filled + n);

        if n == 0 {
            if self.read_buf.is_empty() {
                self.close(ConnectionError::ClientDisconnected);
            } else {
                // Partial frame in buffer
                self.close(ConnectionError::UnexpectedEof);
            }
            return false;
        }

        stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");
        true
    }

    /// Decodes and executes every complete frame in the read buffer.
    fn process_requests<P: CommandProcessor>(
        &mut self,
        processor: &P,
        store: &mut Store,
        stats: &ConnectionStats,
    ) {
        loop {
            let (args, consumed) = match decode_request(&self.read_buf) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(client = %self.addr, error = %e, "Protocol error");
                    stats.protocol_error();
                    self.close(e.into());
                    return;
                }
            };

            self.read_buf.advance(consumed);
            trace!(
                client = %self.addr,
                consumed = consumed,
                remaining = self.read_buf.len(),
                "Decoded request"
            );

            let response = processor.execute(store, &args);
            stats.command_processed();
            response.encode_into(&mut self.write_buf);
            self.phase = Phase::DrainingResponse;
        }
    }

    /// Writes as much of the write buffer as the socket accepts.
    ///
    /// Returns true once everything is flushed and the connection is back in
    /// `AwaitingRequest`.
    fn try_flush_buffer(&mut self, stats: &ConnectionStats) -> bool {
        while self.write_pos < self.write_buf.len() {
            match self.stream.write(&self.write_buf[self.write_pos..]) {
                Ok(0) => {
                    self.close(ConnectionError::WriteZero);
                    return false;
                }
                Ok(n) => {
                    self.write_pos += n;
                    stats.bytes_written(n);
                    trace!(client = %self.addr, bytes = n, "Wrote data");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    debug!(
                        client = %self.addr,
                        pending = self.pending_output(),
                        "Short write, waiting for writable"
                    );
                    return false;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.close(e.into());
                    return false;
                }
            }
        }

        debug_assert!(self.write_pos <= self.write_buf.len());
        self.write_buf.clear();
        self.write_pos = 0;
        self.phase = Phase::AwaitingRequest;
        true
    }
}
