//! Wire token codec for SCPI-style text protocols.
//!
//! Instruments speak in bare ASCII tokens: decimal integers, decimal
//! fractions, discrete mnemonics (`ON`, `AUTO`) and quote-delimited strings
//! with doubled internal quotes. This crate classifies a received token into
//! the [`Value`] it denotes and provides the quoting transforms needed to
//! compose writes. Everything here is pure and total — no I/O, no failure
//! paths.

pub mod text;
pub mod value;

pub use text::{quote, unquote};
pub use value::{classify, Value, ValueKind};
