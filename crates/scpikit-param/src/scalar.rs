use scpikit_transport::{ScpiSession, SessionHandle};
use scpikit_wire::{classify, quote, unquote, Value, ValueKind};
use tracing::trace;

use crate::error::{ParamError, Result};

/// Send a write, optionally awaiting the acknowledgement query appended to
/// the same request. With ack the write stops being fire-and-forget: the
/// round trip completes only once the instrument confirms.
pub(crate) fn transmit(session: &SessionHandle, cmd: &str, ack: bool) -> Result<()> {
    if ack {
        let cmd = format!("{cmd};*OPC?");
        session.borrow_mut().query_text(&cmd)?;
    } else {
        session.borrow_mut().send_command(cmd)?;
    }
    Ok(())
}

/// Decode the two-token `valid,value` reading envelope.
///
/// The flag must parse as an integer; 1 means valid. An invalid reading
/// yields `None` regardless of what the value token contains.
pub(crate) fn decode_reading(response: &str, name: &str) -> Result<Option<Value>> {
    let malformed = || ParamError::MalformedReading {
        name: name.to_string(),
        response: response.to_string(),
    };

    let tokens: Vec<&str> = response.split(',').collect();
    if tokens.len() != 2 {
        return Err(malformed());
    }
    let flag: i64 = tokens[0].parse().map_err(|_| malformed())?;
    if flag != 1 {
        return Ok(None);
    }
    let (_, value) = classify(tokens[1]);
    Ok(Some(value))
}

/// A writable scalar instrument setting.
///
/// The wire value class is discovered on the first access (read or write)
/// and bound for the lifetime of the endpoint; it is never re-probed.
pub struct Parameter {
    session: SessionHandle,
    name: String,
    kind: Option<ValueKind>,
    stored: Option<Value>,
    ack: bool,
}

impl Parameter {
    /// Register a scalar setting. A trailing `?` on the wire name is
    /// stripped; the name is immutable afterwards.
    pub fn new(session: SessionHandle, wire_name: &str) -> Self {
        Self::build(session, wire_name, false)
    }

    /// Like [`Parameter::new`], but every write awaits an acknowledgement
    /// query in the same request.
    pub fn with_ack(session: SessionHandle, wire_name: &str) -> Self {
        Self::build(session, wire_name, true)
    }

    fn build(session: SessionHandle, wire_name: &str, ack: bool) -> Self {
        Self {
            session,
            name: wire_name.trim_end_matches('?').to_string(),
            kind: None,
            stored: None,
            ack,
        }
    }

    /// The wire-level command path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the current value.
    ///
    /// The first call classifies the reply and binds the endpoint's value
    /// class. Later calls decode with the bound class: numeric endpoints
    /// keep choosing `Int` vs `Num` per reply by the decimal-point
    /// heuristic, textual endpoints unquote.
    pub fn get(&mut self) -> Result<Value> {
        let cmd = format!("{}?", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        match self.kind {
            None => {
                let (kind, value) = classify(&response);
                self.kind = Some(kind);
                trace!(name = %self.name, ?kind, "bound parameter value class");
                Ok(value)
            }
            Some(kind) => self.decode_bound(kind, &response),
        }
    }

    /// Write a value.
    ///
    /// On an endpoint whose value class is still unresolved this first
    /// performs an implicit [`get`](Parameter::get) to resolve it, then
    /// replays the write — resolution works from either direction.
    pub fn set(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if self.kind.is_none() {
            self.get()?;
        }
        let token = self.encode(&value);
        transmit(&self.session, &format!("{} {}", self.name, token), self.ack)
    }

    /// Read the permitted `(min, max)` range in one round trip.
    ///
    /// The pair is numeric if either token carries a decimal point, integer
    /// otherwise. Meaningful for numeric settings only.
    pub fn range(&mut self) -> Result<(Value, Value)> {
        let query = format!("{}?", self.name);
        let cmd = format!("{query} min;{query} max");
        let response = self.session.borrow_mut().query_text(&cmd)?;

        let malformed = || ParamError::MalformedReading {
            name: self.name.clone(),
            response: response.clone(),
        };
        let tokens: Vec<&str> = response.split(';').collect();
        if tokens.len() != 2 {
            return Err(malformed());
        }
        if tokens.iter().any(|t| t.contains('.')) {
            let min: f64 = tokens[0].parse().map_err(|_| malformed())?;
            let max: f64 = tokens[1].parse().map_err(|_| malformed())?;
            Ok((Value::Num(min), Value::Num(max)))
        } else {
            let min: i64 = tokens[0].parse().map_err(|_| malformed())?;
            let max: i64 = tokens[1].parse().map_err(|_| malformed())?;
            Ok((Value::Int(min), Value::Int(max)))
        }
    }

    /// Snapshot the current value for a later [`restore`](Parameter::restore).
    pub fn store(&mut self) -> Result<()> {
        let value = self.get()?;
        self.stored = Some(value);
        Ok(())
    }

    /// Write back the stored snapshot. No read round trip is needed: the
    /// snapshot is the value source.
    pub fn restore(&mut self) -> Result<()> {
        let value = self
            .stored
            .clone()
            .ok_or_else(|| ParamError::NotStored(self.name.clone()))?;
        self.set(value)
    }

    /// The bound value class, resolving it with a read if necessary.
    pub fn kind(&mut self) -> Result<ValueKind> {
        if self.kind.is_none() {
            self.get()?;
        }
        Ok(self.kind.expect("kind is bound after get"))
    }

    /// List the permitted discrete values. Discrete settings only.
    pub fn cat(&mut self) -> Result<Vec<String>> {
        let cmd = format!("{}:CAT?", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        let mut values: Vec<String> = response.split(',').map(str::to_string).collect();
        if values.first().is_some_and(|v| v.is_empty()) {
            values.remove(0);
        }
        Ok(values)
    }

    fn decode_bound(&self, kind: ValueKind, response: &str) -> Result<Value> {
        match kind {
            ValueKind::Integer | ValueKind::Numeric => {
                let parsed = if response.contains('.') {
                    response.parse::<f64>().map(Value::Num).ok()
                } else {
                    response.parse::<i64>().map(Value::Int).ok()
                };
                parsed.ok_or_else(|| ParamError::MalformedReading {
                    name: self.name.clone(),
                    response: response.to_string(),
                })
            }
            ValueKind::Discrete | ValueKind::Text => Ok(Value::Text(unquote(response))),
        }
    }

    fn encode(&self, value: &Value) -> String {
        match self.kind {
            Some(ValueKind::Text) => quote(&value.to_string()),
            _ => value.to_string(),
        }
    }
}

/// A read-only scalar measurement result with a validity envelope.
pub struct Reading {
    session: SessionHandle,
    name: String,
}

impl Reading {
    /// Register a scalar result. A trailing `?` on the wire name is
    /// stripped.
    pub fn new(session: SessionHandle, wire_name: &str) -> Self {
        Self {
            session,
            name: wire_name.trim_end_matches('?').to_string(),
        }
    }

    /// The wire-level command path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the current value; `None` when the instrument flags the result
    /// invalid.
    pub fn get(&mut self) -> Result<Option<Value>> {
        let cmd = format!("{}?", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        decode_reading(&response, &self.name)
    }

    /// Read the final value after the measurement was stopped; `None` when
    /// flagged invalid.
    pub fn final_value(&mut self) -> Result<Option<Value>> {
        let cmd = format!(":SENS:DATA:FIN? \"{}\"", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        decode_reading(&response, &self.name)
    }
}
