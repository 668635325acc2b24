use thiserror::Error;

/// The error type for relaycast operations.
///
/// Only unrecoverable failures surface here: they should be handled by
/// logging and shutting the process down. Connection-specific failures
/// (peer disconnects, failed sends) are handled inside the relay by
/// dropping the affected connection and are never reported as errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Low-level I/O error from the operating system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration key lookup returned an unusable value.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
