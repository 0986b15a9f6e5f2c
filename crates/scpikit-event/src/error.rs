use scpikit_param::ParamError;
use scpikit_transport::TransportError;

/// Errors that can occur in event decoding and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The event format schema is malformed or incomplete.
    #[error("event format schema rejected: {0}")]
    Schema(String),

    /// An event ordinal carries a format selector the schema does not
    /// declare. Fatal in strict mode; lenient decoding swallows it.
    #[error("unknown event format selector: {0}")]
    UnknownFormat(u64),

    /// An event page violates the fixed record grammar.
    #[error("{name}: malformed event record: {detail}")]
    MalformedRecord { name: String, detail: String },

    /// Endpoint-level error (schema parameter fetch).
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, EventError>;
