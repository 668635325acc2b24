//! Relaycast - a connection-multiplexing broadcast relay
//!
//! Relaycast accepts many concurrent TCP connections on a single listening
//! port and rebroadcasts whatever bytes each client sends to every other
//! connected client, tagged with the sender's identity. Arrivals and
//! departures are announced to the remaining clients. The whole relay runs
//! on one thread: a readiness-driven event loop multiplexes every connection
//! and buffers outbound data per connection to survive partial writes.
//!
//! See the README for quick start, the `relaycast` binary, and configuration
//! options.

// Internal-only modules
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod server;

// These are the intended public API
pub use error::Error;
pub use server::RelayServer;

// Re-export types that are only needed for testing
// Hidden from documentation to discourage use in production code
#[doc(hidden)]
pub use server::{
    arrival_message, client_message, departure_message, Client, ClientRegistry, FlushProgress,
    OutboundQueue,
};
