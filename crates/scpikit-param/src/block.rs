use scpikit_transport::{ScpiSession, SessionHandle};
use scpikit_wire::{classify, quote, Value, ValueKind};
use tracing::trace;

use crate::error::{ParamError, Result};
use crate::scalar::transmit;

/// Strip a trailing `?` and then a trailing block-marker node (matched
/// case-insensitively) from a wire name.
fn strip_marker(wire_name: &str, marker: &str) -> String {
    let trimmed = wire_name.trim_end_matches('?');
    let lower = trimmed.to_ascii_lowercase();
    match lower.rfind(marker) {
        Some(pos) if pos > 0 => trimmed[..pos].to_string(),
        _ => trimmed.to_string(),
    }
}

/// One layer of quoting off a list element. Block string replies keep their
/// internal doubled quotes verbatim; only the delimiters go.
fn strip_quote_layer(token: &str) -> String {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        token[1..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

/// Parse a reply value list with no pre-bound class: numeric first (the
/// whole list, `Int` vs `Num` decided by the first element), falling back to
/// string handling when any element refuses to parse.
fn parse_list_untyped(tokens: &[&str]) -> Vec<Value> {
    let Some(first) = tokens.first() else {
        return Vec::new();
    };

    if !first.starts_with('"') {
        if first.contains('.') {
            if let Ok(values) = tokens
                .iter()
                .map(|t| t.parse::<f64>().map(Value::Num))
                .collect::<std::result::Result<Vec<_>, _>>()
            {
                return values;
            }
        } else if let Ok(values) = tokens
            .iter()
            .map(|t| t.parse::<i64>().map(Value::Int))
            .collect::<std::result::Result<Vec<_>, _>>()
        {
            return values;
        }
    }

    if first.starts_with('"') {
        tokens
            .iter()
            .map(|t| Value::Text(strip_quote_layer(t)))
            .collect()
    } else {
        tokens
            .iter()
            .map(|t| Value::Text((*t).to_string()))
            .collect()
    }
}

/// A writable block (vector) instrument setting with windowed access.
///
/// The wire name may carry the whole-block marker node (`...:BLOC`), which
/// is stripped at construction; windowed and whole-block queries are derived
/// from the base name.
pub struct BlockParameter {
    session: SessionHandle,
    name: String,
    kind: Option<ValueKind>,
    stored: Option<Vec<Value>>,
    ack: bool,
}

impl BlockParameter {
    /// Register a block setting.
    pub fn new(session: SessionHandle, wire_name: &str) -> Self {
        Self::build(session, wire_name, false)
    }

    /// Like [`BlockParameter::new`], but every write awaits an
    /// acknowledgement query in the same request.
    pub fn with_ack(session: SessionHandle, wire_name: &str) -> Self {
        Self::build(session, wire_name, true)
    }

    fn build(session: SessionHandle, wire_name: &str, ack: bool) -> Self {
        Self {
            session,
            name: strip_marker(wire_name, ":bloc"),
            kind: None,
            stored: None,
            ack,
        }
    }

    /// The wire-level command path (block marker stripped).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `values` starting at the zero-based `index`.
    ///
    /// The first write probes the value class with a windowed read of the
    /// same span, then replays as the vector write
    /// `NAME <index>,<count>,v1,v2,...`. String elements are quoted
    /// per element; already-quoted inputs pass through unchanged.
    pub fn set(&mut self, index: usize, values: &[Value]) -> Result<()> {
        if self.kind.is_none() {
            let cmd = format!("{}? {},{}", self.name, index, values.len());
            let response = self.session.borrow_mut().query_text(&cmd)?;
            let first = response.split(',').next().unwrap_or("");
            let (kind, _) = classify(first);
            self.kind = Some(kind);
            trace!(name = %self.name, ?kind, "bound block value class");
        }

        let mut cmd = format!("{} {},{}", self.name, index, values.len());
        for value in values {
            cmd.push(',');
            match self.kind {
                Some(ValueKind::Text) => cmd.push_str(&quote(&value.to_string())),
                _ => cmd.push_str(&value.to_string()),
            }
        }
        transmit(&self.session, &cmd, self.ack)
    }

    /// Single-value convenience for [`set`](BlockParameter::set).
    pub fn set_one(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.set(index, &[value.into()])
    }

    /// Read values. `length == None` reads to the end of the block via the
    /// whole-block query; an explicit length issues a windowed query.
    ///
    /// Whole-block reads with a nonzero index are windowed client-side. An
    /// empty window reissues a one-element windowed query at that index so
    /// the instrument's own out-of-range fault reaches the caller.
    pub fn get(&mut self, index: usize, length: Option<usize>) -> Result<Vec<Value>> {
        let cmd = match length {
            None => format!("{}:BLOC?", self.name),
            Some(len) => format!("{}? {},{}", self.name, index, len),
        };
        let response = self.session.borrow_mut().query_text(&cmd)?;
        let tokens: Vec<&str> = response.split(',').collect();

        if length.is_none() && index > 0 {
            if index >= tokens.len() {
                // Out of range: the windowed query faults instrument-side.
                // A reply means the window was readable after all.
                let cmd = format!("{}? {},1", self.name, index);
                let response = self.session.borrow_mut().query_text(&cmd)?;
                let tokens: Vec<&str> = response.split(',').collect();
                return self.parse_values(&tokens, &response);
            }
            return self.parse_values(&tokens[index..], &response);
        }
        self.parse_values(&tokens, &response)
    }

    /// List the permitted discrete values at `index`. Discrete block
    /// settings only.
    pub fn cat(&mut self, index: usize) -> Result<Vec<String>> {
        let cmd = format!("{}:CAT? {}", self.name, index);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        Ok(response.split(',').map(str::to_string).collect())
    }

    /// Snapshot the whole block for a later
    /// [`restore`](BlockParameter::restore).
    pub fn store(&mut self) -> Result<()> {
        let values = self.get(0, None)?;
        self.stored = Some(values);
        Ok(())
    }

    /// Write the stored snapshot back at index 0.
    pub fn restore(&mut self) -> Result<()> {
        let values = self
            .stored
            .clone()
            .ok_or_else(|| ParamError::NotStored(self.name.clone()))?;
        self.set(0, &values)
    }

    /// Number of values the block currently holds.
    pub fn length(&mut self) -> Result<i64> {
        let cmd = format!("{}:LENG?", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        response
            .trim()
            .parse()
            .map_err(|_| ParamError::MalformedReading {
                name: self.name.clone(),
                response,
            })
    }

    /// The bound value class, probing with a one-element read if necessary.
    pub fn kind(&mut self) -> Result<ValueKind> {
        if self.kind.is_none() {
            self.get(0, Some(1))?;
        }
        self.kind.ok_or_else(|| ParamError::MalformedReading {
            name: self.name.clone(),
            response: String::new(),
        })
    }

    fn parse_values(&mut self, tokens: &[&str], response: &str) -> Result<Vec<Value>> {
        if self.kind.is_none() {
            if let Some(first) = tokens.first() {
                let (kind, _) = classify(first);
                self.kind = Some(kind);
                trace!(name = %self.name, ?kind, "bound block value class");
            }
        }
        match self.kind {
            Some(ValueKind::Integer) | Some(ValueKind::Numeric) => {
                let first_is_fractional = tokens.first().is_some_and(|t| t.contains('.'));
                let parsed = if first_is_fractional {
                    tokens
                        .iter()
                        .map(|t| t.parse::<f64>().map(Value::Num))
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .ok()
                } else {
                    tokens
                        .iter()
                        .map(|t| t.parse::<i64>().map(Value::Int))
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .ok()
                };
                parsed.ok_or_else(|| ParamError::MalformedReading {
                    name: self.name.clone(),
                    response: response.to_string(),
                })
            }
            Some(ValueKind::Text) => Ok(tokens
                .iter()
                .map(|t| Value::Text(strip_quote_layer(t)))
                .collect()),
            _ => Ok(tokens
                .iter()
                .map(|t| Value::Text((*t).to_string()))
                .collect()),
        }
    }
}

/// A read-only block measurement result: `count,v1,v2,...` envelope where a
/// negative count flags the whole reading invalid.
pub struct BlockReading {
    session: SessionHandle,
    name: String,
}

impl BlockReading {
    /// Register a block result (a trailing `...:BLOC` node is stripped).
    pub fn new(session: SessionHandle, wire_name: &str) -> Self {
        Self {
            session,
            name: strip_marker(wire_name, ":bloc"),
        }
    }

    /// The wire-level command path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read current values; an invalid reading decodes to an empty
    /// sequence. Windowing behaves as in [`BlockParameter::get`], including
    /// the out-of-range reissue.
    pub fn get(&mut self, index: usize, length: Option<usize>) -> Result<Vec<Value>> {
        let cmd = match length {
            None => format!("{}:BLOC?", self.name),
            Some(len) => format!("{}? {},{}", self.name, index, len),
        };
        let Some(values) = self.read_values(&cmd)? else {
            return Ok(Vec::new());
        };

        if length.is_none() && index > 0 {
            if index >= values.len() {
                let cmd = format!("{}? {},1", self.name, index);
                return Ok(self.read_values(&cmd)?.unwrap_or_default());
            }
            return Ok(values[index..].to_vec());
        }
        Ok(values)
    }

    /// Number of currently available values.
    pub fn length(&mut self) -> Result<i64> {
        let cmd = format!("{}:LENG?", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        response
            .trim()
            .parse()
            .map_err(|_| ParamError::MalformedReading {
                name: self.name.clone(),
                response,
            })
    }

    /// Read final values after the measurement was stopped.
    ///
    /// Final data has no instrument-side windowing, so an empty post-slice
    /// window fails locally with `IndexOutOfRange` instead of provoking an
    /// instrument fault.
    pub fn final_values(&mut self, index: usize, length: Option<usize>) -> Result<Vec<Value>> {
        let cmd = format!(":SENS:DATA:FIN? \"{}\"", self.name);
        let Some(values) = self.read_values(&cmd)? else {
            return Ok(Vec::new());
        };
        window_final(values, index, length, &self.name)
    }

    fn read_values(&mut self, cmd: &str) -> Result<Option<Vec<Value>>> {
        let response = self.session.borrow_mut().query_text(cmd)?;
        let tokens: Vec<&str> = response.split(',').collect();

        let count: i64 = tokens[0].parse().map_err(|_| ParamError::MalformedReading {
            name: self.name.clone(),
            response: response.clone(),
        })?;
        if count < 0 {
            return Ok(None);
        }

        let rest = &tokens[1..];
        if count as usize != rest.len() {
            return Err(ParamError::InconsistentLength {
                name: self.name.clone(),
                declared: count as usize,
                actual: rest.len(),
            });
        }
        Ok(Some(parse_list_untyped(rest)))
    }
}

/// Client-side window over a final-data value list; empty windows are a
/// local fault.
fn window_final<T>(
    values: Vec<T>,
    index: usize,
    length: Option<usize>,
    name: &str,
) -> Result<Vec<T>> {
    let used_length = values.len();
    let mut windowed: Vec<T> = values.into_iter().skip(index).collect();
    if let Some(len) = length {
        windowed.truncate(len);
    }
    if windowed.is_empty() {
        return Err(ParamError::IndexOutOfRange {
            name: name.to_string(),
            used_length,
        });
    }
    Ok(windowed)
}

/// A read-only block result with per-element validity flags:
/// `count,flag1,v1,flag2,v2,...`. Elements flagged 0 decode to `None`
/// while the envelope stays valid.
pub struct ExtendedBlockReading {
    session: SessionHandle,
    name: String,
}

impl ExtendedBlockReading {
    /// Register an extended block result (a trailing `...:EBLOC` node is
    /// stripped).
    pub fn new(session: SessionHandle, wire_name: &str) -> Self {
        Self {
            session,
            name: strip_marker(wire_name, ":ebloc"),
        }
    }

    /// The wire-level command path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read current values; invalid elements are `None`, an invalid
    /// envelope decodes to an empty sequence.
    pub fn get(&mut self, index: usize, length: Option<usize>) -> Result<Vec<Option<Value>>> {
        let cmd = match length {
            None => format!("{}:EBLOC?", self.name),
            Some(len) => format!("{}:ERANG? {},{}", self.name, index, len),
        };
        let Some(values) = self.read_values(&cmd)? else {
            return Ok(Vec::new());
        };

        if length.is_none() && index > 0 {
            if index >= values.len() {
                let cmd = format!("{}:ERANG? {},1", self.name, index);
                return Ok(self.read_values(&cmd)?.unwrap_or_default());
            }
            return Ok(values[index..].to_vec());
        }
        Ok(values)
    }

    /// Number of currently available values.
    pub fn length(&mut self) -> Result<i64> {
        let cmd = format!("{}:LENG?", self.name);
        let response = self.session.borrow_mut().query_text(&cmd)?;
        response
            .trim()
            .parse()
            .map_err(|_| ParamError::MalformedReading {
                name: self.name.clone(),
                response,
            })
    }

    /// Read final values; empty post-slice windows fail locally with
    /// `IndexOutOfRange`, as in [`BlockReading::final_values`].
    pub fn final_values(
        &mut self,
        index: usize,
        length: Option<usize>,
    ) -> Result<Vec<Option<Value>>> {
        let cmd = format!(":SENS:DATA:FIN? \"{}\"", self.name);
        let Some(values) = self.read_values(&cmd)? else {
            return Ok(Vec::new());
        };
        window_final(values, index, length, &self.name)
    }

    fn read_values(&mut self, cmd: &str) -> Result<Option<Vec<Option<Value>>>> {
        let response = self.session.borrow_mut().query_text(cmd)?;
        let tokens: Vec<&str> = response.split(',').collect();
        let malformed = || ParamError::MalformedReading {
            name: self.name.clone(),
            response: response.clone(),
        };

        let count: i64 = tokens[0].parse().map_err(|_| malformed())?;
        if count < 0 {
            return Ok(None);
        }

        let rest = &tokens[1..];
        if rest.len() != 2 * count as usize {
            return Err(ParamError::InconsistentLength {
                name: self.name.clone(),
                declared: count as usize,
                actual: rest.len() / 2,
            });
        }

        let mut values = Vec::with_capacity(count as usize);
        for pair in rest.chunks_exact(2) {
            let flag: i64 = pair[0].parse().map_err(|_| malformed())?;
            if flag == 1 {
                let (_, value) = classify(pair[1]);
                values.push(Some(value));
            } else {
                values.push(None);
            }
        }
        Ok(Some(values))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use scpikit_test_harness::ScriptedSession;

    use super::*;

    fn session() -> Rc<RefCell<ScriptedSession>> {
        Rc::new(RefCell::new(ScriptedSession::new()))
    }

    // -----------------------------------------------------------------------
    // BlockParameter
    // -----------------------------------------------------------------------

    #[test]
    fn block_name_strips_marker_node() {
        let s = session();
        assert_eq!(
            BlockParameter::new(s.clone(), ":PM:CHAN:BLOC?").name(),
            ":PM:CHAN"
        );
        assert_eq!(
            BlockParameter::new(s.clone(), ":pm:chan:bloc").name(),
            ":pm:chan"
        );
        assert_eq!(BlockParameter::new(s, ":PM:CHAN").name(), ":PM:CHAN");
    }

    #[test]
    fn first_set_probes_then_replays_as_vector_write() {
        let s = session();
        s.borrow_mut()
            .expect_query(":PM:THR? 2,2", "10,20")
            .expect_command(":PM:THR 2,2,7,8");

        let mut block = BlockParameter::new(s.clone(), ":PM:THR:BLOC");
        block
            .set(2, &[Value::Int(7), Value::Int(8)])
            .expect("set should probe and write");
        s.borrow().assert_done();
    }

    #[test]
    fn later_sets_skip_the_probe() {
        let s = session();
        s.borrow_mut()
            .expect_query(":PM:THR? 0,1", "10")
            .expect_command(":PM:THR 0,1,7")
            .expect_command(":PM:THR 3,1,9");

        let mut block = BlockParameter::new(s.clone(), ":PM:THR:BLOC");
        block.set_one(0, 7).expect("first set");
        block.set_one(3, 9).expect("second set");
        s.borrow().assert_done();
    }

    #[test]
    fn string_elements_are_quoted_tolerating_prequoted_input() {
        let s = session();
        s.borrow_mut()
            .expect_query(":PM:LAB? 0,2", "\"a\",\"b\"")
            .expect_command(":PM:LAB 0,2,\"x\",\"y\"");

        let mut block = BlockParameter::new(s.clone(), ":PM:LAB:BLOC");
        block
            .set(
                0,
                &[Value::Text("x".into()), Value::Text("\"y\"".into())],
            )
            .expect("set should quote each element exactly once");
        s.borrow().assert_done();
    }

    #[test]
    fn whole_block_read() {
        let s = session();
        s.borrow_mut().expect_query(":PM:THR:BLOC?", "1,2,3");

        let mut block = BlockParameter::new(s.clone(), ":PM:THR:BLOC");
        assert_eq!(
            block.get(0, None).expect("read"),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn windowed_read_uses_windowed_query() {
        let s = session();
        s.borrow_mut().expect_query(":PM:THR? 1,2", "2.5,3.5");

        let mut block = BlockParameter::new(s.clone(), ":PM:THR:BLOC");
        assert_eq!(
            block.get(1, Some(2)).expect("read"),
            vec![Value::Num(2.5), Value::Num(3.5)]
        );
    }

    #[test]
    fn whole_block_read_with_index_slices_client_side() {
        let s = session();
        s.borrow_mut().expect_query(":PM:THR:BLOC?", "1,2,3");

        let mut block = BlockParameter::new(s.clone(), ":PM:THR:BLOC");
        assert_eq!(block.get(2, None).expect("read"), vec![Value::Int(3)]);
    }

    #[test]
    fn empty_window_reissues_to_surface_the_instrument_fault() {
        let s = session();
        s.borrow_mut()
            .expect_query(":PM:THR:BLOC?", "1,2")
            .expect_query(":PM:THR? 5,1", "9");

        let mut block = BlockParameter::new(s.clone(), ":PM:THR:BLOC");
        assert_eq!(block.get(5, None).expect("read"), vec![Value::Int(9)]);
        s.borrow().assert_done();
    }

    #[test]
    fn discrete_block_values_pass_through() {
        let s = session();
        s.borrow_mut().expect_query(":PM:MODE:BLOC?", "AUTO,OFF");

        let mut block = BlockParameter::new(s.clone(), ":PM:MODE:BLOC");
        assert_eq!(
            block.get(0, None).expect("read"),
            vec![
                Value::Text("AUTO".to_string()),
                Value::Text("OFF".to_string())
            ]
        );
    }

    #[test]
    fn string_block_values_lose_one_quote_layer_only() {
        let s = session();
        s.borrow_mut()
            .expect_query(":PM:LAB:BLOC?", "\"a\",\"b\"\"c\"");

        let mut block = BlockParameter::new(s.clone(), ":PM:LAB:BLOC");
        assert_eq!(
            block.get(0, None).expect("read"),
            vec![
                Value::Text("a".to_string()),
                Value::Text("b\"\"c".to_string())
            ]
        );
    }

    #[test]
    fn block_store_restore_round_trip() {
        let s = session();
        s.borrow_mut()
            .expect_query(":PM:THR:BLOC?", "1,2")
            .expect_command(":PM:THR 0,2,1,2");

        let mut block = BlockParameter::new(s.clone(), ":PM:THR:BLOC");
        block.store().expect("store");
        block.restore().expect("restore");
        s.borrow().assert_done();
    }

    #[test]
    fn block_restore_without_store_fails() {
        let s = session();
        let mut block = BlockParameter::new(s, ":PM:THR:BLOC");
        assert!(matches!(block.restore(), Err(ParamError::NotStored(_))));
    }

    #[test]
    fn block_cat_lists_choices_at_index() {
        let s = session();
        s.borrow_mut().expect_query(":PM:MODE:CAT? 3", "AUTO,OFF");

        let mut block = BlockParameter::new(s.clone(), ":PM:MODE:BLOC");
        assert_eq!(block.cat(3).expect("cat"), vec!["AUTO", "OFF"]);
    }

    #[test]
    fn block_kind_probes_one_element() {
        let s = session();
        s.borrow_mut().expect_query(":PM:THR? 0,1", "1.5");

        let mut block = BlockParameter::new(s.clone(), ":PM:THR:BLOC");
        assert_eq!(block.kind().expect("kind"), ValueKind::Numeric);
        s.borrow().assert_done();
    }

    // -----------------------------------------------------------------------
    // BlockReading
    // -----------------------------------------------------------------------

    #[test]
    fn block_reading_decodes_count_envelope() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:BLOC?", "3,1,2,3");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert_eq!(
            reading.get(0, None).expect("read"),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn invalid_block_reading_is_an_empty_sequence() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:BLOC?", "-1");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert!(reading.get(0, None).expect("read").is_empty());
    }

    #[test]
    fn count_mismatch_is_inconsistent_length() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:BLOC?", "3,1,2");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert!(matches!(
            reading.get(0, None),
            Err(ParamError::InconsistentLength {
                declared: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn garbage_count_is_malformed() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:BLOC?", "lots,1,2");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert!(matches!(
            reading.get(0, None),
            Err(ParamError::MalformedReading { .. })
        ));
    }

    #[test]
    fn mixed_numeric_tokens_fall_back_to_raw_strings() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:BLOC?", "2,1,x");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert_eq!(
            reading.get(0, None).expect("read"),
            vec![Value::Text("1".to_string()), Value::Text("x".to_string())]
        );
    }

    #[test]
    fn block_reading_window_reissues_past_the_end() {
        let s = session();
        s.borrow_mut()
            .expect_query(":FETC:CHAN:BLOC?", "2,1,2")
            .expect_query(":FETC:CHAN? 7,1", "1,9");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert_eq!(reading.get(7, None).expect("read"), vec![Value::Int(9)]);
        s.borrow().assert_done();
    }

    #[test]
    fn block_reading_length() {
        let s = session();
        s.borrow_mut()
            .expect_query(":FETC:CHAN:LENG?", "5")
            .expect_query(":FETC:CHAN:LENG?", "soon");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert_eq!(reading.length().expect("length"), 5);
        assert!(matches!(
            reading.length(),
            Err(ParamError::MalformedReading { .. })
        ));
    }

    #[test]
    fn final_values_window_locally() {
        let s = session();
        s.borrow_mut()
            .expect_query(":SENS:DATA:FIN? \":FETC:CHAN\"", "3,1,2,3");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert_eq!(
            reading.final_values(1, Some(1)).expect("final"),
            vec![Value::Int(2)]
        );
    }

    #[test]
    fn final_values_out_of_range_is_a_local_fault() {
        let s = session();
        s.borrow_mut()
            .expect_query(":SENS:DATA:FIN? \":FETC:CHAN\"", "2,1,2");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert!(
            matches!(
                reading.final_values(5, None),
                Err(ParamError::IndexOutOfRange { used_length: 2, .. })
            ),
            "no reissue: final data has no instrument-side windowing"
        );
        s.borrow().assert_done();
    }

    #[test]
    fn invalid_final_values_are_an_empty_sequence() {
        let s = session();
        s.borrow_mut()
            .expect_query(":SENS:DATA:FIN? \":FETC:CHAN\"", "-1");

        let mut reading = BlockReading::new(s.clone(), ":FETC:CHAN:BLOC");
        assert!(reading.final_values(0, None).expect("final").is_empty());
    }

    // -----------------------------------------------------------------------
    // ExtendedBlockReading
    // -----------------------------------------------------------------------

    #[test]
    fn extended_name_strips_its_marker() {
        let s = session();
        assert_eq!(
            ExtendedBlockReading::new(s, ":FETC:CHAN:EBLOC?").name(),
            ":FETC:CHAN"
        );
    }

    #[test]
    fn extended_reading_decodes_per_element_validity() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:EBLOC?", "2,1,5,0,7");

        let mut reading = ExtendedBlockReading::new(s.clone(), ":FETC:CHAN:EBLOC");
        assert_eq!(
            reading.get(0, None).expect("read"),
            vec![Some(Value::Int(5)), None],
            "a zero flag blanks the element, not the envelope"
        );
    }

    #[test]
    fn extended_windowed_read_uses_erang() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:ERANG? 1,2", "2,1,5,1,6");

        let mut reading = ExtendedBlockReading::new(s.clone(), ":FETC:CHAN:EBLOC");
        assert_eq!(
            reading.get(1, Some(2)).expect("read"),
            vec![Some(Value::Int(5)), Some(Value::Int(6))]
        );
    }

    #[test]
    fn extended_pair_count_mismatch_is_inconsistent_length() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:EBLOC?", "2,1,5,0");

        let mut reading = ExtendedBlockReading::new(s.clone(), ":FETC:CHAN:EBLOC");
        assert!(matches!(
            reading.get(0, None),
            Err(ParamError::InconsistentLength { declared: 2, .. })
        ));
    }

    #[test]
    fn extended_garbage_flag_is_malformed() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:EBLOC?", "1,maybe,5");

        let mut reading = ExtendedBlockReading::new(s.clone(), ":FETC:CHAN:EBLOC");
        assert!(matches!(
            reading.get(0, None),
            Err(ParamError::MalformedReading { .. })
        ));
    }

    #[test]
    fn extended_invalid_envelope_is_empty() {
        let s = session();
        s.borrow_mut().expect_query(":FETC:CHAN:EBLOC?", "-1");

        let mut reading = ExtendedBlockReading::new(s.clone(), ":FETC:CHAN:EBLOC");
        assert!(reading.get(0, None).expect("read").is_empty());
    }

    #[test]
    fn extended_window_reissues_with_erang() {
        let s = session();
        s.borrow_mut()
            .expect_query(":FETC:CHAN:EBLOC?", "1,1,5")
            .expect_query(":FETC:CHAN:ERANG? 4,1", "1,1,9");

        let mut reading = ExtendedBlockReading::new(s.clone(), ":FETC:CHAN:EBLOC");
        assert_eq!(
            reading.get(4, None).expect("read"),
            vec![Some(Value::Int(9))]
        );
        s.borrow().assert_done();
    }

    #[test]
    fn extended_final_values_fail_locally_past_the_end() {
        let s = session();
        s.borrow_mut()
            .expect_query(":SENS:DATA:FIN? \":FETC:CHAN\"", "1,1,5");

        let mut reading = ExtendedBlockReading::new(s.clone(), ":FETC:CHAN:EBLOC");
        assert!(matches!(
            reading.final_values(3, None),
            Err(ParamError::IndexOutOfRange { used_length: 1, .. })
        ));
    }
}
