use chrono::{TimeZone, Utc};
use scpikit_param::Parameter;
use scpikit_transport::{FirmwareVersion, ScpiSession, SessionHandle};
use scpikit_wire::Value;
use tracing::debug;

use crate::decoder::{DecodedEvent, EventDecoder};
use crate::error::{EventError, Result};

/// Lowest instrument version whose event lists publish a format document.
pub const MIN_DECODE_VERSION: FirmwareVersion = FirmwareVersion::new(37, 0, 2);

/// Upper bound on events fetched per request.
const MAX_PER_REQUEST: usize = 100;

/// Fixed token width of one event record on the wire.
const TOKENS_PER_RECORD: usize = 25;

/// Trailing time-unit nodes replaced by the format node when deriving the
/// schema endpoint from the event list name.
const TIME_UNIT_NODES: [&str; 3] = ["SEC", "MIN", "HOUR"];
const FORMAT_NODE: &str = "FORM";

const NSEC_PER_SEC: i64 = 1_000_000_000;
const NSEC_PER_MSEC: i64 = 1_000_000;

/// One retrieved event. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// The packed event ordinal.
    pub id: i64,
    /// Start timestamp, nanoseconds since epoch; `None` when the calendar
    /// tokens were not resolvable.
    pub start_time: Option<i64>,
    /// Stop timestamp, nanoseconds since epoch; `None` when unresolvable.
    pub stop_time: Option<i64>,
    /// Event duration in nanoseconds.
    pub duration: i64,
    /// Instrument-assigned event type.
    pub event_type: i64,
    /// Occurrence count reported with the event.
    pub count: i64,
    /// Schema-decoded fields, when a decoder is active and knows the
    /// event's format.
    pub decoded: Option<DecodedEvent>,
}

/// Record filter for [`EventList::get_filtered`].
pub enum EventFilter {
    /// Keep records whose ordinal equals the given ID.
    Id(i64),
    /// Keep records the predicate accepts, evaluated per decoded record.
    Where(Box<dyn Fn(&EventRecord) -> bool>),
}

impl EventFilter {
    fn accepts(&self, record: &EventRecord) -> bool {
        match self {
            EventFilter::Id(id) => record.id == *id,
            EventFilter::Where(predicate) => predicate(record),
        }
    }
}

/// Configuration for an [`EventList`].
///
/// The negotiated firmware version and the decode switch are passed in
/// explicitly; the event list reads no ambient session state.
#[derive(Debug, Clone)]
pub struct EventListConfig {
    /// Attempt to negotiate a format decoder for retrieved events.
    pub decode_events: bool,
    /// The negotiated instrument version, gating decoder activation.
    pub firmware: FirmwareVersion,
    /// Strict schema validation and fatal unknown formats.
    pub strict_decoding: bool,
}

impl Default for EventListConfig {
    fn default() -> Self {
        Self {
            decode_events: true,
            firmware: FirmwareVersion::new(0, 0, 0),
            strict_decoding: false,
        }
    }
}

enum DecoderState {
    /// Activation not yet attempted.
    Unresolved,
    /// Negotiation succeeded; records are decoded.
    Active(EventDecoder),
    /// Negotiation declined or impossible; records pass through undecoded.
    Inactive,
}

/// Paged access to an instrument event list.
///
/// Decoder activation is lazy and one-way: the first record to be decoded
/// (or an [`additional_info`](EventList::additional_info) call) attempts
/// negotiation once, and the list stays on the resulting decode path for
/// its lifetime.
pub struct EventList {
    session: SessionHandle,
    name: String,
    config: EventListConfig,
    decoder: DecoderState,
}

impl EventList {
    /// Register an event list endpoint.
    pub fn new(session: SessionHandle, wire_name: &str, config: EventListConfig) -> Self {
        Self {
            session,
            name: wire_name.to_string(),
            config,
            decoder: DecoderState::Unresolved,
        }
    }

    /// The wire-level event list name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Move the read position back to the oldest entry.
    pub fn reset_read_position(&mut self) -> Result<()> {
        let cmd = format!("{}:FIRS", self.name);
        self.session.borrow_mut().send_command(&cmd)?;
        Ok(())
    }

    /// Number of entries left to read.
    pub fn entries_to_read(&mut self) -> Result<i64> {
        let cmd = format!("{}:NUMB?", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        response
            .trim()
            .parse()
            .map_err(|_| EventError::MalformedRecord {
                name: self.name.clone(),
                detail: format!("unreadable entry count: {response:?}"),
            })
    }

    /// Fetch up to `number` events.
    ///
    /// The requested number is clamped to the available count and fetched
    /// in pages of at most 100 records per round trip.
    pub fn get(&mut self, number: usize) -> Result<Vec<EventRecord>> {
        self.fetch(number, None)
    }

    /// Like [`get`](EventList::get), keeping only records the filter
    /// accepts. Filtering happens client-side on decoded records; the
    /// number of round trips does not change.
    pub fn get_filtered(&mut self, number: usize, filter: &EventFilter) -> Result<Vec<EventRecord>> {
        self.fetch(number, Some(filter))
    }

    /// Fetch a single record; `None` when the list is drained.
    pub fn next(&mut self) -> Result<Option<EventRecord>> {
        if self.entries_to_read()? <= 0 {
            return Ok(None);
        }
        let cmd = format!("{}? 1", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        let records = self.parse_page(&response, 1)?;
        let record = records.into_iter().next().expect("page carries one record");
        Ok(Some(self.attach_decode(record)?))
    }

    /// Consume and discard up to `number` records, in the same paged
    /// pattern as [`get`](EventList::get). Returns the count actually
    /// skipped.
    pub fn skip(&mut self, number: usize) -> Result<usize> {
        if number == 0 {
            return Ok(0);
        }
        let available = self.entries_to_read()?.max(0) as usize;
        let mut remaining = number.min(available);
        let mut skipped = 0;
        while remaining > 0 {
            let per_call = remaining.min(MAX_PER_REQUEST);
            let cmd = format!("{}? {}", self.name, per_call);
            // Nobody inspects the payload.
            self.session.borrow_mut().query_text(&cmd)?;
            remaining -= per_call;
            skipped += per_call;
        }
        Ok(skipped)
    }

    /// The de-duplicated union, in first-seen order, of the additional
    /// field names across all declared formats. `None` when no decoder is
    /// active.
    pub fn additional_info(&mut self) -> Result<Option<Vec<String>>> {
        self.ensure_decoder()?;
        let DecoderState::Active(decoder) = &self.decoder else {
            return Ok(None);
        };
        let mut merged: Vec<String> = Vec::new();
        for names in decoder.additional_info() {
            for name in names {
                if !merged.contains(&name) {
                    merged.push(name);
                }
            }
        }
        Ok(Some(merged))
    }

    fn fetch(&mut self, number: usize, filter: Option<&EventFilter>) -> Result<Vec<EventRecord>> {
        let available = self.entries_to_read()?.max(0) as usize;
        let mut remaining = number.min(available);
        let mut events = Vec::new();

        while remaining > 0 {
            let per_call = remaining.min(MAX_PER_REQUEST);
            let cmd = format!("{}? {}", self.name, per_call);
            let response = self.session.borrow_mut().query_text(&cmd)?;
            let records = self.parse_page(&response, per_call)?;
            remaining -= per_call;

            for record in records {
                let record = self.attach_decode(record)?;
                if filter.is_none_or(|f| f.accepts(&record)) {
                    events.push(record);
                }
            }
        }
        Ok(events)
    }

    fn parse_page(&self, response: &str, expected: usize) -> Result<Vec<EventRecord>> {
        let tokens: Vec<&str> = response.split(',').collect();
        let malformed = |detail: String| EventError::MalformedRecord {
            name: self.name.clone(),
            detail,
        };

        let echoed: i64 = tokens[0]
            .parse()
            .map_err(|_| malformed(format!("unreadable record count: {:?}", tokens[0])))?;
        if echoed != expected as i64 {
            return Err(malformed(format!(
                "requested {expected} events, instrument reported {echoed}"
            )));
        }
        let width = 1 + TOKENS_PER_RECORD * expected;
        if tokens.len() != width {
            return Err(malformed(format!(
                "expected {width} tokens, received {}",
                tokens.len()
            )));
        }

        tokens[1..]
            .chunks_exact(TOKENS_PER_RECORD)
            .map(|chunk| self.parse_record(chunk))
            .collect()
    }

    fn parse_record(&self, tokens: &[&str]) -> Result<EventRecord> {
        Ok(EventRecord {
            id: self.parse_int(tokens[0])?,
            start_time: parse_timestamp(&tokens[1..9]),
            stop_time: parse_timestamp(&tokens[9..17]),
            duration: self.assemble_duration(&tokens[17..23])?,
            event_type: self.parse_int(tokens[23])?,
            count: self.parse_int(tokens[24])?,
            decoded: None,
        })
    }

    fn parse_int(&self, token: &str) -> Result<i64> {
        token.parse().map_err(|_| EventError::MalformedRecord {
            name: self.name.clone(),
            detail: format!("unreadable integer token: {token:?}"),
        })
    }

    /// `(((days*24 + hours)*60 + minutes)*60 + seconds)*1e9 + ms*1e6 + ns`.
    fn assemble_duration(&self, tokens: &[&str]) -> Result<i64> {
        let mut fields = [0i64; 6];
        for (slot, token) in fields.iter_mut().zip(tokens) {
            *slot = self.parse_int(token)?;
        }
        let [days, hours, minutes, seconds, ms, ns] = fields;
        Ok((((days * 24 + hours) * 60 + minutes) * 60 + seconds) * NSEC_PER_SEC
            + ms * NSEC_PER_MSEC
            + ns)
    }

    fn attach_decode(&mut self, mut record: EventRecord) -> Result<EventRecord> {
        self.ensure_decoder()?;
        if let DecoderState::Active(decoder) = &self.decoder {
            record.decoded = decoder.decode_event(record.id as u64)?;
        }
        Ok(record)
    }

    /// Attempt decoder negotiation once; afterwards the list is permanently
    /// on the decoding or the pass-through path.
    fn ensure_decoder(&mut self) -> Result<()> {
        if !matches!(self.decoder, DecoderState::Unresolved) {
            return Ok(());
        }
        self.decoder = DecoderState::Inactive;

        if !self.config.decode_events || self.config.firmware < MIN_DECODE_VERSION {
            return Ok(());
        }
        let schema_name = schema_endpoint_name(&self.name);
        if !self.session.borrow_mut().exists(&schema_name)? {
            return Ok(());
        }

        let mut schema_param = Parameter::new(self.session.clone(), &schema_name);
        let schema_text = match schema_param.get()? {
            Value::Text(text) => text,
            other => other.to_string(),
        };
        let decoder = EventDecoder::new(&schema_text, self.config.strict_decoding)?;
        debug!(name = %self.name, schema = %schema_name, "event decoder active");
        self.decoder = DecoderState::Active(decoder);
        Ok(())
    }
}

/// Derive the format document endpoint from the event list name: a trailing
/// time-unit node is replaced by the format node, otherwise the format node
/// is appended.
fn schema_endpoint_name(list_name: &str) -> String {
    let mut nodes: Vec<&str> = list_name.split(':').collect();
    if nodes
        .last()
        .is_some_and(|last| TIME_UNIT_NODES.contains(last))
    {
        nodes.pop();
    }
    nodes.push(FORMAT_NODE);
    nodes.join(":")
}

/// Epoch nanoseconds from `[year, month, day, hour, minute, second, ms,
/// ns]` tokens; `None` when any token or the calendar date itself is not
/// resolvable.
fn parse_timestamp(tokens: &[&str]) -> Option<i64> {
    let mut fields = [0i64; 8];
    for (slot, token) in fields.iter_mut().zip(tokens) {
        *slot = token.parse().ok()?;
    }
    let timestamp = Utc
        .with_ymd_and_hms(
            i32::try_from(fields[0]).ok()?,
            u32::try_from(fields[1]).ok()?,
            u32::try_from(fields[2]).ok()?,
            u32::try_from(fields[3]).ok()?,
            u32::try_from(fields[4]).ok()?,
            u32::try_from(fields[5]).ok()?,
        )
        .single()?
        .timestamp();
    Some(timestamp * NSEC_PER_SEC + fields[6] * NSEC_PER_MSEC + fields[7])
}
