use scpikit_transport::TransportError;

/// Errors that can occur on parameter and reading endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    /// `restore()` was called without a prior `store()`.
    #[error("{0}: restore() requires a prior store()")]
    NotStored(String),

    /// A reply violates the fixed response grammar for this endpoint.
    #[error("{name}: malformed reply: {response:?}")]
    MalformedReading { name: String, response: String },

    /// The declared element count does not match the payload width.
    #[error("{name}: inconsistent reply length: declared {declared}, got {actual}")]
    InconsistentLength {
        name: String,
        declared: usize,
        actual: usize,
    },

    /// A final-data window lies past the end of the available values.
    /// Client-detected: final-data queries have no instrument-side windowing.
    #[error("{name}: index out of range (available length {used_length})")]
    IndexOutOfRange { name: String, used_length: usize },

    /// A reading-group root carried more than one ellipsis placeholder.
    #[error("group {group}: only one wildcard position supported: {root:?}")]
    UnsupportedWildcard { group: String, root: String },

    /// A key was registered twice within one group.
    #[error("group {group}: registered name must be unique: {name:?}")]
    DuplicateName { group: String, name: String },

    /// `get()` was called on a group with nothing registered.
    #[error("group {0}: no readings registered")]
    NothingRegistered(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, ParamError>;
