use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the instrument.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The read deadline expired before a complete line arrived.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// The stream was closed before a complete line arrived.
    #[error("connection closed (incomplete response line)")]
    ConnectionClosed,

    /// The instrument replied with something the session layer cannot
    /// interpret (e.g. a non-integer existence probe reply).
    #[error("unexpected response to {query}: {response:?}")]
    UnexpectedResponse { query: String, response: String },

    /// The software-version reply does not carry a parsable version triple.
    #[error("malformed version string: {0:?}")]
    MalformedVersion(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
