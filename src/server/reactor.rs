//! Single-Threaded Reactor
//!
//! The reactor owns the listening socket, every connection and the store. It
//! waits for readiness with `mio`, hands each ready connection to its state
//! machine, re-arms interest when a connection changes phase, reaps closed
//! connections and finally accepts new clients.
//!
//! ## One Poll Cycle
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ poll(timeout)                                                │
//! │   │                                                          │
//! │   ├─ no events ──> housekeeping (advance index resize)       │
//! │   │                                                          │
//! │   ├─ for each ready connection:                              │
//! │   │     handle_io ─> re-register interest ─> reap if Closing │
//! │   │                                                          │
//! │   └─ listener ready (or backlog left over) ─> accept all     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Interest follows the phase: readable while awaiting a request, writable
//! while draining a response. `mio` readiness is edge-triggered, so a
//! connection is only parked once its socket has reported would-block.

use crate::commands::CommandProcessor;
use crate::connection::{Connection, ConnectionError, ConnectionStats, Phase};
use crate::storage::Store;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::convert::Infallible;
use std::io;
use std::mem;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Token reserved for the listening socket.
const LISTENER: Token = Token(0);

/// Default time a poll may block before housekeeping runs.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Reactor configuration
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Upper bound on a single wait for readiness
    pub poll_timeout: Duration,
    /// Readiness events collected per poll
    pub events_capacity: usize,
    /// Connections beyond this are closed right after accept
    pub max_connections: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            events_capacity: 1024,
            max_connections: 10_000,
        }
    }
}

/// Errors that stop the reactor. Each one is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to set up listening socket: {0}")]
    Listener(#[source] io::Error),

    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// A connection together with the interest it is currently registered for.
struct Registered {
    conn: Connection<TcpStream>,
    interest: Interest,
}

fn interest_for(phase: Phase) -> Option<Interest> {
    match phase {
        Phase::AwaitingRequest => Some(Interest::READABLE),
        Phase::DrainingResponse => Some(Interest::WRITABLE),
        Phase::Closing => None,
    }
}

/// The event loop.
///
/// # Example
///
/// ```no_run
/// use pollkv::commands::CommandHandler;
/// use pollkv::server::{Reactor, ReactorConfig};
/// use pollkv::storage::Store;
///
/// let listener = std::net::TcpListener::bind("127.0.0.1:1234")?;
/// let reactor = Reactor::new(listener, Store::new(), CommandHandler::new(), ReactorConfig::default())?;
/// reactor.run()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Reactor<P> {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    connections: HashMap<Token, Registered>,
    next_token: usize,
    /// Set when an accept round stopped before the backlog was drained
    accept_backlog: bool,
    ready: Vec<Token>,
    store: Store,
    processor: P,
    config: ReactorConfig,
    stats: Arc<ConnectionStats>,
}

impl<P: CommandProcessor> Reactor<P> {
    /// Takes over a bound, listening socket and prepares the poll loop.
    ///
    /// Fails if the socket cannot be switched to non-blocking mode or
    /// registered with the poller.
    pub fn new(
        listener: std::net::TcpListener,
        store: Store,
        processor: P,
        config: ReactorConfig,
    ) -> ServerResult<Self> {
        listener
            .set_nonblocking(true)
            .map_err(ServerError::Listener)?;
        let mut listener = TcpListener::from_std(listener);

        let poll = Poll::new().map_err(ServerError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(ServerError::Listener)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(config.events_capacity.max(1)),
            listener,
            connections: HashMap::new(),
            next_token: LISTENER.0 + 1,
            accept_backlog: false,
            ready: Vec::new(),
            store,
            processor,
            config,
            stats: Arc::new(ConnectionStats::new()),
        })
    }

    /// Address the listening socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the connection counters.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Runs the event loop forever.
    ///
    /// Only returns if polling itself fails.
    pub fn run(mut self) -> ServerResult<Infallible> {
        info!(
            addr = ?self.listener.local_addr().ok(),
            poll_timeout_ms = self.config.poll_timeout.as_millis() as u64,
            max_connections = self.config.max_connections,
            "Reactor started"
        );

        loop {
            self.poll_once()?;
        }
    }

    /// Runs a single poll cycle.
    pub fn poll_once(&mut self) -> ServerResult<()> {
        match self
            .poll
            .poll(&mut self.events, Some(self.config.poll_timeout))
        {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(ServerError::Poll(e)),
        }

        if self.events.is_empty() && !self.accept_backlog {
            self.housekeeping();
            return Ok(());
        }

        let mut ready = mem::take(&mut self.ready);
        let mut listener_ready = self.accept_backlog;
        for event in self.events.iter() {
            if event.token() == LISTENER {
                listener_ready = true;
            } else {
                ready.push(event.token());
            }
        }

        for token in ready.drain(..) {
            self.service(token);
        }
        self.ready = ready;

        if listener_ready {
            self.accept_connections();
        }

        Ok(())
    }

    /// Drives one connection and releases it if it is done.
    fn service(&mut self, token: Token) {
        // may already be gone if it appeared twice in one batch
        let Some(entry) = self.connections.get_mut(&token) else {
            return;
        };

        entry
            .conn
            .handle_io(&self.processor, &mut self.store, &self.stats);

        if let Some(wanted) = interest_for(entry.conn.phase()) {
            if wanted != entry.interest {
                match self
                    .poll
                    .registry()
                    .reregister(entry.conn.stream_mut(), token, wanted)
                {
                    Ok(()) => entry.interest = wanted,
                    Err(e) => entry.conn.close(ConnectionError::IoError(e)),
                }
            }
        }

        if entry.conn.phase() == Phase::Closing {
            self.release(token);
        }
    }

    /// Deregisters and drops a connection, closing its socket.
    fn release(&mut self, token: Token) {
        let Some(mut entry) = self.connections.remove(&token) else {
            return;
        };

        if let Err(e) = self.poll.registry().deregister(entry.conn.stream_mut()) {
            debug!(token = token.0, error = %e, "Deregister failed");
        }
        self.stats.connection_closed();

        let addr = entry.conn.addr();
        match entry.conn.close_reason() {
            None | Some(ConnectionError::ClientDisconnected) => {
                info!(client = %addr, "Client disconnected")
            }
            Some(e) if e.is_graceful() => debug!(client = %addr, error = %e, "Connection reset by client"),
            Some(e) => warn!(client = %addr, error = %e, "Connection closed"),
        }
    }

    /// Accepts every pending connection.
    fn accept_connections(&mut self) {
        self.accept_backlog = false;

        loop {
            let (mut stream, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // e.g. out of descriptors; retry on the next cycle
                    error!(error = %e, "Failed to accept connection");
                    self.accept_backlog = true;
                    break;
                }
            };

            if self.connections.len() >= self.config.max_connections {
                warn!(
                    client = %addr,
                    limit = self.config.max_connections,
                    "Connection limit reached, refusing client"
                );
                self.stats.connection_rejected();
                continue;
            }

            if let Err(e) = stream.set_nodelay(true) {
                debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
            }

            let token = self.next_token();
            if let Err(e) = self
                .poll
                .registry()
                .register(&mut stream, token, Interest::READABLE)
            {
                error!(client = %addr, error = %e, "Failed to register connection");
                continue;
            }

            self.connections.insert(
                token,
                Registered {
                    conn: Connection::new(stream, addr),
                    interest: Interest::READABLE,
                },
            );
            self.stats.connection_opened();
            info!(client = %addr, token = token.0, "Client connected");
        }
    }

    fn next_token(&mut self) -> Token {
        loop {
            let token = Token(self.next_token);
            self.next_token = self.next_token.wrapping_add(1);
            if token != LISTENER && !self.connections.contains_key(&token) {
                return token;
            }
        }
    }

    /// Work done on cycles where nothing was ready.
    fn housekeeping(&mut self) {
        if self.store.housekeeping() {
            trace!("Index resize still in progress");
        }

        debug!(
            connections = self.connections.len(),
            keys = self.store.len(),
            commands = self.stats.commands_processed.load(Ordering::Relaxed),
            "Idle"
        );
    }
}
