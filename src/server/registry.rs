//! Connection table: one slot per live client connection.

use mio::net::TcpStream;
use mio::Interest;
use std::collections::BTreeMap;
use std::net::SocketAddr;

use super::outbound::OutboundQueue;

// Client tokens start above the reserved listener token so the two ranges
// can never collide.
pub const CLIENT_TOKEN_RANGE_START: usize = 1000;

/// One live client connection.
#[derive(Debug)]
pub struct Client {
    pub stream: TcpStream,
    pub identity: u64,
    pub peer_addr: SocketAddr,
    pub interest: Interest,
    pub outbound: OutboundQueue,
}

/// Fixed-capacity table of live client connections.
///
/// Slots are keyed by their poll token. Tokens come from a monotonic counter
/// and are never reused, so a token observed after its slot was released can
/// never alias a newer connection. Identities are a separate monotonic
/// sequence starting at 0: they name clients in broadcast messages and stay
/// strictly increasing across arbitrary connect/disconnect patterns for the
/// lifetime of the process.
#[derive(Debug)]
pub struct ClientRegistry {
    // Ordered map so fan-out and teardown iterate in ascending token order.
    clients: BTreeMap<usize, Client>,
    capacity: usize,
    next_token: usize,
    next_identity: u64,
}

impl ClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            capacity,
            next_token: CLIENT_TOKEN_RANGE_START,
            next_identity: 0,
        }
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Claims a slot for `stream` and assigns the next identity.
    ///
    /// Returns `None` when the table is full. The stream is dropped (and the
    /// connection thereby closed) in that case, with no other side effects:
    /// no slot is consumed, no identity is burned.
    pub fn claim(&mut self, stream: TcpStream, peer_addr: SocketAddr) -> Option<(usize, u64)> {
        if self.clients.len() >= self.capacity {
            return None;
        }

        let token = self.next_token;
        self.next_token += 1;
        let identity = self.next_identity;
        self.next_identity += 1;

        self.clients.insert(
            token,
            Client {
                stream,
                identity,
                peer_addr,
                interest: Interest::READABLE,
                outbound: OutboundQueue::new(),
            },
        );

        Some((token, identity))
    }

    /// Releases a slot, handing its connection back for deregistration.
    ///
    /// Releasing a token that is not in the table is a no-op returning
    /// `None`, so the removal path can run twice without double-closing.
    pub fn release(&mut self, token: usize) -> Option<Client> {
        self.clients.remove(&token)
    }

    /// Whether `token` maps to a live connection.
    pub fn contains(&self, token: usize) -> bool {
        self.clients.contains_key(&token)
    }

    pub fn get_mut(&mut self, token: usize) -> Option<&mut Client> {
        self.clients.get_mut(&token)
    }

    /// Identity of the connection behind `token`, if it is live.
    pub fn identity(&self, token: usize) -> Option<u64> {
        self.clients.get(&token).map(|client| client.identity)
    }

    /// Live tokens in ascending order. This fixes fan-out delivery order
    /// when several recipients become writable in the same cycle.
    pub fn tokens(&self) -> Vec<usize> {
        self.clients.keys().copied().collect()
    }

    /// Empties the table, yielding every slot in ascending token order.
    pub fn drain(&mut self) -> impl Iterator<Item = (usize, Client)> {
        std::mem::take(&mut self.clients).into_iter()
    }
}
