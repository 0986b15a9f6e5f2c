//! Blocking transport boundary for SCPI-style instrument sessions.
//!
//! This is the lowest layer of scpikit. Everything above it consumes exactly
//! two primitives: a fire-and-forget command send and a synchronous
//! query round trip ([`ScpiSession`]). The concrete [`TcpLineClient`] speaks
//! newline-terminated ASCII lines over a TCP stream with a read deadline as
//! the only timeout semantics.
//!
//! Sessions are exclusively owned by one logical client; [`SessionHandle`]
//! encodes that single-threaded ownership. No internal locking is provided —
//! callers serialize externally.

pub mod error;
pub mod session;
pub mod tcp;
pub mod version;

pub use error::{Result, TransportError};
pub use session::{session_handle, ScpiSession, SessionHandle};
pub use tcp::{ClientConfig, TcpLineClient};
pub use version::FirmwareVersion;
