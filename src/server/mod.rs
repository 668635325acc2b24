//! The relay core.
//!
//! A single-threaded, readiness-driven broadcast server built on mio.
//! One poll wait is the only suspension point; accept, read, write, and
//! broadcast fan-out all run to completion between waits, so no operation
//! can interleave with another and no synchronization is needed anywhere.

mod messages;
mod outbound;
mod registry;

pub use messages::{arrival_message, client_message, departure_message};
pub use outbound::{FlushProgress, OutboundQueue};
pub use registry::{Client, ClientRegistry};

use crate::config::get_usize_with_default;
use crate::error::Error;
use ::config::Config;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::io::{ErrorKind, Read};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{error, info, instrument, trace, warn};

// The listener owns a reserved token below the client token range.
const LISTENER_ID: usize = 0;

// Default configuration values. The read scratch size matches one line of
// typical interactive traffic; each read call of up to this many bytes is
// relayed as one message.
const DEFAULT_MAX_READ_SIZE: usize = 1024;
const DEFAULT_MAX_CLIENTS: usize = 1024;
const DEFAULT_POLL_CAPACITY: usize = 1024;

// Internal outcome of servicing a readable client
enum ReadOutcome {
    Open,
    Disconnected,
}

/// Broadcast relay over a single listening socket.
///
/// Every chunk of bytes a client sends is rebroadcast to every other live
/// client, prefixed with `client <identity>: `. Arrivals and departures are
/// announced with `server: client <identity> just arrived\n` and
/// `server: client <identity> just left\n`. A client never receives its own
/// arrival, departure, or lines.
///
/// Not thread-safe: the server and everything it owns live on the thread
/// that calls [`RelayServer::run`].
#[derive(Debug)]
pub struct RelayServer {
    registry: ClientRegistry,
    listener: TcpListener,
    local_addr: SocketAddr,
    poll: Poll,
    poll_capacity: usize,
    scratch: Vec<u8>,
}

// ============================================================================
// Constructors
// ============================================================================

impl RelayServer {
    /// Creates a relay listening on loopback at `port`.
    ///
    /// Port 0 binds an ephemeral port; see [`RelayServer::local_addr`] for
    /// the address actually bound.
    ///
    /// # Configuration Keys
    ///
    /// - `max_read_size`: receive scratch size per read call (default 1024)
    /// - `max_clients`: concurrent-connection ceiling (default 1024)
    /// - `poll_capacity`: readiness event buffer capacity (default 1024)
    pub fn new(config: &Config, port: u16) -> Result<Self, Error> {
        Self::new_named(config, "", port)
    }

    /// Creates a named relay with configuration namespacing.
    ///
    /// Configuration lookup follows this priority:
    /// 1. `{name}.{key}` (e.g., `lobby.max_clients`)
    /// 2. `{key}` (e.g., `max_clients`)
    /// 3. Hard-coded default
    pub fn new_named(config: &Config, name: &str, port: u16) -> Result<Self, Error> {
        let max_read_size =
            get_usize_with_default(config, name, "max_read_size", DEFAULT_MAX_READ_SIZE)?;
        let max_clients = get_usize_with_default(config, name, "max_clients", DEFAULT_MAX_CLIENTS)?;
        let poll_capacity =
            get_usize_with_default(config, name, "poll_capacity", DEFAULT_POLL_CAPACITY)?;

        let poll = Poll::new()?;

        // Loopback only: the relay is plaintext and carries no authentication.
        let mut listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))?;
        let local_addr = listener.local_addr()?;
        poll.registry()
            .register(&mut listener, Token(LISTENER_ID), Interest::READABLE)?;
        info!(%local_addr, "Listening for connections");

        Ok(Self {
            registry: ClientRegistry::new(max_clients),
            listener,
            local_addr,
            poll,
            poll_capacity,
            scratch: vec![0; max_read_size],
        })
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl RelayServer {
    /// The address the relay is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }
}

// ============================================================================
// Event Loop
// ============================================================================

impl RelayServer {
    /// Runs the relay forever.
    ///
    /// Only an unrecoverable error returns, and only after every live
    /// connection and the listener have been torn down.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            if let Err(err) = self.poll_once(None) {
                error!(?err, "Fatal error in event loop");
                self.teardown();
                return Err(err);
            }
        }
    }

    /// Drives one event-loop iteration: block until readiness (or `timeout`),
    /// then dispatch accept, read, and write handlers.
    ///
    /// Within one wake-up, ready connections are serviced in ascending token
    /// order regardless of the order the OS reported them. Messages enqueued
    /// while dispatching are flushed no earlier than the wake-up in which the
    /// recipient next reports writable.
    #[instrument(skip(self, timeout))]
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> Result<(), Error> {
        let mut events = Events::with_capacity(self.poll_capacity);
        if let Err(err) = self.poll.poll(&mut events, timeout) {
            if err.kind() == ErrorKind::Interrupted {
                // A signal woke us; the caller simply waits again.
                return Ok(());
            }
            return Err(err.into());
        }

        let mut batch: Vec<(usize, bool, bool)> = events
            .iter()
            .map(|event| {
                let Token(id) = event.token();
                (id, event.is_readable(), event.is_writable())
            })
            .collect();
        batch.sort_unstable_by_key(|&(id, ..)| id);

        for (id, readable, writable) in batch {
            if id == LISTENER_ID {
                if readable {
                    self.accept_clients()?;
                }
                continue;
            }

            // The slot may already be gone: the read handler below can remove
            // it, and a removed connection must not be serviced again within
            // the same wake-up.
            if !self.registry.contains(id) {
                continue;
            }

            if readable {
                if let ReadOutcome::Disconnected = self.read_client(id) {
                    continue;
                }
            }

            if writable && self.registry.contains(id) {
                self.write_client(id);
            }
        }

        Ok(())
    }
}

// ============================================================================
// Connection Lifecycle
// ============================================================================

impl RelayServer {
    /// Accepts every connection currently queued on the listener.
    ///
    /// A connection arriving while the table is at capacity is dropped on
    /// the spot: nothing is sent to it and nothing is announced. Existing
    /// clients never learn it existed.
    #[instrument(skip(self))]
    fn accept_clients(&mut self) -> Result<(), Error> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => {
                    stream.set_nodelay(true)?;

                    let Some((token, identity)) = self.registry.claim(stream, peer_addr) else {
                        warn!(%peer_addr, "Connection ceiling reached, rejecting connection");
                        continue;
                    };
                    info!(token, identity, %peer_addr, "Accepting connection");

                    // Announce before watching: the arriving client is
                    // already in the table but excluded as origin, so it
                    // never sees its own arrival.
                    self.broadcast_except(&messages::arrival_message(identity), token);

                    let client = self
                        .registry
                        .get_mut(token)
                        .expect("Client should exist after claim");
                    self.poll
                        .registry()
                        .register(&mut client.stream, Token(token), client.interest)
                        .expect("Failed to register connection");
                }
                Err(err) => match err.kind() {
                    ErrorKind::WouldBlock => {
                        // Further accepting would block, so we are done
                        break;
                    }
                    ErrorKind::Interrupted => continue,
                    ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset => {
                        warn!(?err, "Transient accept error");
                        continue;
                    }
                    _ => {
                        error!(?err, "Error accepting connection");
                        return Err(err.into());
                    }
                },
            }
        }

        Ok(())
    }

    /// Services a readable client: each successful read call relays exactly
    /// the bytes it returned as one tagged message to every other client.
    #[instrument(skip(self))]
    fn read_client(&mut self, token: usize) -> ReadOutcome {
        loop {
            let client = self
                .registry
                .get_mut(token)
                .expect("Client should exist for readable event");
            let identity = client.identity;
            let peer_addr = client.peer_addr;

            match client.stream.read(&mut self.scratch) {
                Ok(0) => {
                    info!(identity, %peer_addr, "Connection closed by peer");
                    self.remove_client(token);
                    return ReadOutcome::Disconnected;
                }
                Ok(sz) => {
                    trace!(len = sz, identity, %peer_addr, "Read data from socket");
                    let line = messages::client_message(identity, &self.scratch[..sz]);
                    self.broadcast_except(&line, token);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    // Nothing more to read this cycle
                    return ReadOutcome::Open;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    if err.kind() == ErrorKind::ConnectionReset {
                        warn!(identity, %peer_addr, "Connection reset");
                    } else {
                        error!(identity, %peer_addr, ?err, "Error reading from socket");
                    }
                    self.remove_client(token);
                    return ReadOutcome::Disconnected;
                }
            }
        }
    }

    /// Services a writable client with a single flush attempt.
    #[instrument(skip(self))]
    fn write_client(&mut self, token: usize) {
        let client = self
            .registry
            .get_mut(token)
            .expect("Client should exist for writable event");
        let identity = client.identity;
        let peer_addr = client.peer_addr;

        match client.outbound.flush(&mut client.stream) {
            FlushProgress::Flushed => {
                trace!(identity, %peer_addr, "Flushed pending output");
                // Nothing left to send: stop watching for write-readiness.
                let old_interest = client.interest;
                client.interest = Interest::READABLE;
                if old_interest != client.interest {
                    self.poll
                        .registry()
                        .reregister(&mut client.stream, Token(token), client.interest)
                        .expect("Failed to reregister connection");
                }
            }
            FlushProgress::Partial => {
                trace!(
                    remaining = client.outbound.len(),
                    identity,
                    %peer_addr,
                    "Partial write, deferring rest"
                );
                // Re-arm so the edge-triggered poll reports this connection
                // writable again; the remainder goes out next cycle, never in
                // a retry loop here.
                self.poll
                    .registry()
                    .reregister(&mut client.stream, Token(token), client.interest)
                    .expect("Failed to reregister connection");
            }
            FlushProgress::Closed => {
                warn!(identity, %peer_addr, "Peer unreachable on write");
                self.remove_client(token);
            }
        }
    }

    /// Removes a client: departure announcement first, then the slot, then
    /// the handle. Calling this for a token that is already gone is a no-op.
    #[instrument(skip(self))]
    fn remove_client(&mut self, token: usize) {
        let Some(identity) = self.registry.identity(token) else {
            return;
        };

        // The departing client is still in the table here, but fan-out skips
        // the origin, so it never sees its own departure.
        self.broadcast_except(&messages::departure_message(identity), token);

        let mut client = self
            .registry
            .release(token)
            .expect("Client should exist for release");
        self.poll
            .registry()
            .deregister(&mut client.stream)
            .expect("Failed to deregister connection");
        info!(identity, peer_addr = %client.peer_addr, "Closed connection");
        // Dropping the client closes the stream and frees its pending output.
    }

    /// Closes every live connection and the listener. Runs once, on the way
    /// out of a fatal error.
    fn teardown(&mut self) {
        for (token, mut client) in self.registry.drain() {
            if let Err(err) = self.poll.registry().deregister(&mut client.stream) {
                warn!(token, ?err, "Error deregistering connection during teardown");
            }
        }
        if let Err(err) = self.poll.registry().deregister(&mut self.listener) {
            warn!(?err, "Error deregistering listener during teardown");
        }
    }
}

// ============================================================================
// Broadcast Fan-out
// ============================================================================

impl RelayServer {
    /// Enqueues `msg` to every live client except `origin`, in ascending
    /// token order. The listener is never a recipient.
    #[instrument(skip(self, msg))]
    fn broadcast_except(&mut self, msg: &[u8], origin: usize) {
        for token in self.registry.tokens() {
            if token == origin {
                continue;
            }
            self.queue_to(token, msg);
        }
    }

    // Queues data to a client and enables write-readiness watching.
    fn queue_to(&mut self, token: usize, msg: &[u8]) {
        let Some(client) = self.registry.get_mut(token) else {
            warn!(token, "Client not found when queuing data");
            return;
        };

        client.outbound.enqueue(msg);

        // We need to be WRITABLE to send
        let old_interest = client.interest;
        client.interest = Interest::READABLE | Interest::WRITABLE;
        if old_interest != client.interest {
            self.poll
                .registry()
                .reregister(&mut client.stream, Token(token), client.interest)
                .expect("Failed to reregister connection");
        }
    }
}
