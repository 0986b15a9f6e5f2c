//! Self-describing event decoding and paged event retrieval.
//!
//! Instruments report events as packed integer ordinals. The layout is not
//! fixed: the instrument publishes a JSON document declaring how to extract
//! a format selector from the ordinal and, per format, the bit fields and
//! enum translations of the packed payload. [`EventDecoder`] ingests that
//! document once; [`EventList`] retrieves event records page by page,
//! reconstructs timestamps and durations, and runs each record through the
//! decoder when one could be negotiated.

pub mod decoder;
pub mod error;
pub mod log;

pub use decoder::{DecodedEvent, EventDecoder, FieldValue};
pub use error::{EventError, Result};
pub use log::{EventFilter, EventList, EventListConfig, EventRecord, MIN_DECODE_VERSION};
