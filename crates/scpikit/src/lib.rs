//! Typed client layer for line-oriented SCPI instrument control.
//!
//! scpikit talks to instruments that speak a text dialect of
//! command/query pairs over a single blocking connection: settings and
//! results are strongly-typed endpoints whose wire type is discovered
//! lazily and cached, and event lists decode packed integer records against
//! a JSON-declared bitfield schema.
//!
//! # Crate Structure
//!
//! - [`wire`] — pure token classification and SCPI string quoting
//! - [`transport`] — the blocking session boundary ([`transport::TcpLineClient`])
//! - [`param`] — lazily-typed scalar/block parameters, readings, groups
//!   (behind `param` feature)
//! - [`event`] — bitfield event decoding and paged retrieval (behind
//!   `event` feature)

/// Re-export wire codec types.
pub mod wire {
    pub use scpikit_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use scpikit_transport::*;
}

/// Re-export parameter and reading types (requires `param` feature).
#[cfg(feature = "param")]
pub mod param {
    pub use scpikit_param::*;
}

/// Re-export event decoding types (requires `event` feature).
#[cfg(feature = "event")]
pub mod event {
    pub use scpikit_event::*;
}
