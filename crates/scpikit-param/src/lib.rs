//! Typed access to instrument settings and readings.
//!
//! Instruments expose settings and measurement results as named command
//! paths whose value class (integer, numeric, discrete, string) is not
//! published anywhere — it is only observable from wire responses. The
//! endpoint types here discover the class lazily on first access, bind it
//! for the lifetime of the endpoint, and from then on encode writes and
//! decode reads accordingly:
//!
//! - [`Parameter`] / [`BlockParameter`] — writable settings, scalar and
//!   windowed-vector
//! - [`Reading`] / [`BlockReading`] / [`ExtendedBlockReading`] — read-only
//!   results carrying validity envelopes
//! - [`ParameterGroup`] / [`ReadingGroup`] — aggregation, bulk
//!   store/restore, and batched fetch-and-split

pub mod block;
pub mod error;
pub mod group;
pub mod scalar;

pub use block::{BlockParameter, BlockReading, ExtendedBlockReading};
pub use error::{ParamError, Result};
pub use group::{GroupMember, ParameterGroup, ReadingGroup, ReadingNode};
pub use scalar::{Parameter, Reading};
