use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use serde::Deserialize;

use crate::error::{EventError, Result};

/// The field name every format must lead with (strict mode enforces it).
pub const EVENT_ID_FIELD: &str = "eventID";

/// The field type tag that marks a plain number (no enum translation).
const NUMERIC_TYPE: &str = "NUM";

// The schema document as the instrument publishes it. Enum tables map
// label -> value on the wire and are inverted at build time.

#[derive(Debug, Deserialize)]
struct SchemaDoc {
    #[serde(rename = "MFEVENTID")]
    event_id: EventIdDoc,
    #[serde(rename = "ENUMS", default)]
    enums: HashMap<String, HashMap<String, u64>>,
}

#[derive(Debug, Deserialize)]
struct EventIdDoc {
    #[serde(rename = "FORMATID")]
    format_id: SelectorDoc,
    #[serde(rename = "FORMATS")]
    formats: Vec<FormatDoc>,
}

#[derive(Debug, Deserialize)]
struct SelectorDoc {
    shift: u32,
    mask: u64,
}

#[derive(Debug, Deserialize)]
struct FormatDoc {
    #[serde(rename = "formatId")]
    format_id: u64,
    #[serde(rename = "FORMAT")]
    fields: Vec<FieldDoc>,
}

#[derive(Debug, Deserialize)]
struct FieldDoc {
    name: String,
    shift: u32,
    mask: u64,
    #[serde(rename = "type")]
    type_tag: String,
}

/// One bit field of a declared format.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub shift: u32,
    pub mask: u64,
    pub type_tag: String,
}

#[derive(Debug)]
struct FormatSpec {
    id: u64,
    fields: Vec<FieldSpec>,
}

/// An extracted field: the raw bits and the enum label, when the field's
/// type has a translation table carrying that value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub raw: u64,
    pub label: Option<String>,
}

/// A decoded event ordinal: the mandatory event ID field split from the
/// format's remaining fields, which keep their declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedEvent {
    pub event_id: Option<FieldValue>,
    pub additional_info: Vec<(String, FieldValue)>,
}

/// Decoder built once from the instrument's JSON format document.
///
/// Immutable after construction; a reconnect rebuilds it wholesale rather
/// than patching.
pub struct EventDecoder {
    selector_shift: u32,
    selector_mask: u64,
    formats: Vec<FormatSpec>,
    enums: HashMap<String, HashMap<u64, String>>,
    strict: bool,
}

impl EventDecoder {
    /// Parse the schema document.
    ///
    /// Missing or ill-typed required keys fail with
    /// [`EventError::Schema`]. Strict mode additionally requires every
    /// format to lead with the `eventID` field and every non-numeric field
    /// type to carry an enum table.
    pub fn new(schema_text: &str, strict: bool) -> Result<Self> {
        let doc: SchemaDoc = serde_json::from_str(schema_text)
            .map_err(|e| EventError::Schema(e.to_string()))?;

        let formats = doc
            .event_id
            .formats
            .into_iter()
            .map(|format| FormatSpec {
                id: format.format_id,
                fields: format
                    .fields
                    .into_iter()
                    .map(|f| FieldSpec {
                        name: f.name,
                        shift: f.shift,
                        mask: f.mask,
                        type_tag: f.type_tag,
                    })
                    .collect(),
            })
            .collect();

        let enums = doc
            .enums
            .into_iter()
            .map(|(tag, table)| {
                let inverted = table.into_iter().map(|(label, value)| (value, label)).collect();
                (tag, inverted)
            })
            .collect();

        let decoder = Self {
            selector_shift: doc.event_id.format_id.shift,
            selector_mask: doc.event_id.format_id.mask,
            formats,
            enums,
            strict,
        };
        if strict {
            decoder.validate()?;
        }
        Ok(decoder)
    }

    /// Extract the format selector and the raw field values, in field
    /// declaration order.
    pub fn decode_raw(&self, value: u64) -> Result<(u64, Vec<u64>)> {
        let selector = (value >> self.selector_shift) & self.selector_mask;
        let format = self
            .format(selector)
            .ok_or(EventError::UnknownFormat(selector))?;
        let fields = format
            .fields
            .iter()
            .map(|f| (value >> f.shift) & f.mask)
            .collect();
        Ok((selector, fields))
    }

    /// Decode an event ordinal into named, enum-translated fields.
    ///
    /// An unknown format selector is fatal in strict mode; lenient mode
    /// yields `Ok(None)` so the caller degrades to an undecoded record.
    pub fn decode_event(&self, value: u64) -> Result<Option<DecodedEvent>> {
        let (selector, raws) = match self.decode_raw(value) {
            Ok(decoded) => decoded,
            Err(EventError::UnknownFormat(_)) if !self.strict => return Ok(None),
            Err(e) => return Err(e),
        };
        let format = self
            .format(selector)
            .expect("decode_raw verified the selector");

        let mut decoded = DecodedEvent::default();
        for (spec, raw) in format.fields.iter().zip(raws) {
            let field = FieldValue {
                raw,
                label: self.label(&spec.type_tag, raw),
            };
            if spec.name == EVENT_ID_FIELD {
                decoded.event_id = Some(field);
            } else {
                decoded.additional_info.push((spec.name.clone(), field));
            }
        }
        Ok(Some(decoded))
    }

    /// Per-format lists of the field names beyond `eventID`, in declaration
    /// order. Formats with no additional fields are omitted.
    pub fn additional_info(&self) -> Vec<Vec<String>> {
        self.formats
            .iter()
            .map(|format| {
                format
                    .fields
                    .iter()
                    .filter(|f| f.name != EVENT_ID_FIELD)
                    .map(|f| f.name.clone())
                    .collect::<Vec<_>>()
            })
            .filter(|names| !names.is_empty())
            .collect()
    }

    /// Human-readable dump of the selector extractor and the per-format
    /// field tables, with the enum tables appended on request.
    pub fn describe(&self, dump_enums: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "format selector: shift = {}  mask = {:#X}",
            self.selector_shift, self.selector_mask
        );
        for format in &self.formats {
            let _ = writeln!(out, "format {}", format.id);
            for field in &format.fields {
                let _ = writeln!(
                    out,
                    "  {:<12} {:<6} shift = {:>3}  mask = {:#X}",
                    field.name, field.type_tag, field.shift, field.mask
                );
            }
        }
        if dump_enums {
            let mut tags: Vec<&String> = self.enums.keys().collect();
            tags.sort();
            for tag in tags {
                let _ = writeln!(out, "enum {tag}");
                let table = &self.enums[tag];
                let mut values: Vec<&u64> = table.keys().collect();
                values.sort();
                for value in values {
                    let _ = writeln!(out, "  {:>5}  {}", value, table[value]);
                }
            }
        }
        out
    }

    fn format(&self, selector: u64) -> Option<&FormatSpec> {
        self.formats.iter().find(|f| f.id == selector)
    }

    fn label(&self, type_tag: &str, value: u64) -> Option<String> {
        self.enums.get(type_tag)?.get(&value).cloned()
    }

    fn validate(&self) -> Result<()> {
        for format in &self.formats {
            match format.fields.first() {
                Some(first) if first.name == EVENT_ID_FIELD => {}
                Some(first) => {
                    return Err(EventError::Schema(format!(
                        "format {}: mandatory first field {EVENT_ID_FIELD:?} expected, found {:?}",
                        format.id, first.name
                    )))
                }
                None => {
                    return Err(EventError::Schema(format!(
                        "format {}: empty field list",
                        format.id
                    )))
                }
            }
        }

        let referenced: HashSet<&str> = self
            .formats
            .iter()
            .flat_map(|f| f.fields.iter())
            .filter(|f| f.type_tag != NUMERIC_TYPE)
            .map(|f| f.type_tag.as_str())
            .collect();
        for tag in referenced {
            if !self.enums.contains_key(tag) {
                return Err(EventError::Schema(format!("enum type not found: {tag}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "MFEVENTID": {
            "FORMATID": { "shift": 8, "mask": 255 },
            "FORMATS": [
                {
                    "formatId": 1,
                    "FORMAT": [
                        { "name": "eventID", "shift": 0, "mask": 255, "type": "NUM" },
                        { "name": "severity", "shift": 16, "mask": 15, "type": "SEV" },
                        { "name": "port", "shift": 20, "mask": 15, "type": "NUM" }
                    ]
                },
                {
                    "formatId": 2,
                    "FORMAT": [
                        { "name": "eventID", "shift": 0, "mask": 255, "type": "NUM" }
                    ]
                }
            ]
        },
        "ENUMS": {
            "SEV": { "minor": 1, "major": 2 }
        }
    }"#;

    fn ordinal(format: u64, event_id: u64, severity: u64, port: u64) -> u64 {
        (format << 8) | event_id | (severity << 16) | (port << 20)
    }

    #[test]
    fn decode_raw_extracts_declared_fields_in_order() {
        let decoder = EventDecoder::new(SCHEMA, true).expect("schema should parse");
        let (selector, fields) = decoder
            .decode_raw(ordinal(1, 5, 2, 7))
            .expect("known format");
        assert_eq!(selector, 1);
        assert_eq!(fields, vec![5, 2, 7]);
    }

    #[test]
    fn decode_event_attaches_enum_labels() {
        let decoder = EventDecoder::new(SCHEMA, true).expect("schema should parse");
        let decoded = decoder
            .decode_event(ordinal(1, 5, 1, 3))
            .expect("known format")
            .expect("decoded");

        assert_eq!(
            decoded.event_id,
            Some(FieldValue {
                raw: 5,
                label: None
            })
        );
        assert_eq!(
            decoded.additional_info,
            vec![
                (
                    "severity".to_string(),
                    FieldValue {
                        raw: 1,
                        label: Some("minor".to_string())
                    }
                ),
                (
                    "port".to_string(),
                    FieldValue {
                        raw: 3,
                        label: None
                    }
                ),
            ]
        );
    }

    #[test]
    fn unknown_format_is_fatal_in_strict_mode() {
        let decoder = EventDecoder::new(SCHEMA, true).expect("schema should parse");
        assert!(matches!(
            decoder.decode_event(ordinal(9, 5, 0, 0)),
            Err(EventError::UnknownFormat(9))
        ));
    }

    #[test]
    fn unknown_format_degrades_in_lenient_mode() {
        let decoder = EventDecoder::new(SCHEMA, false).expect("schema should parse");
        assert_eq!(
            decoder.decode_event(ordinal(9, 5, 0, 0)).expect("lenient"),
            None
        );
    }

    #[test]
    fn missing_required_key_is_a_schema_error() {
        assert!(matches!(
            EventDecoder::new(r#"{ "MFEVENTID": { "FORMATS": [] } }"#, false),
            Err(EventError::Schema(_))
        ));
        assert!(matches!(
            EventDecoder::new("{}", false),
            Err(EventError::Schema(_))
        ));
        assert!(matches!(
            EventDecoder::new("not json", false),
            Err(EventError::Schema(_))
        ));
    }

    #[test]
    fn strict_mode_requires_event_id_first() {
        let schema = r#"{
            "MFEVENTID": {
                "FORMATID": { "shift": 8, "mask": 255 },
                "FORMATS": [
                    {
                        "formatId": 1,
                        "FORMAT": [
                            { "name": "severity", "shift": 16, "mask": 15, "type": "NUM" }
                        ]
                    }
                ]
            }
        }"#;
        assert!(EventDecoder::new(schema, false).is_ok());
        assert!(matches!(
            EventDecoder::new(schema, true),
            Err(EventError::Schema(_))
        ));
    }

    #[test]
    fn strict_mode_requires_enum_tables_for_non_numeric_fields() {
        let schema = r#"{
            "MFEVENTID": {
                "FORMATID": { "shift": 8, "mask": 255 },
                "FORMATS": [
                    {
                        "formatId": 1,
                        "FORMAT": [
                            { "name": "eventID", "shift": 0, "mask": 255, "type": "NUM" },
                            { "name": "severity", "shift": 16, "mask": 15, "type": "SEV" }
                        ]
                    }
                ]
            }
        }"#;
        assert!(EventDecoder::new(schema, false).is_ok());
        assert!(matches!(
            EventDecoder::new(schema, true),
            Err(EventError::Schema(_))
        ));
    }

    #[test]
    fn additional_info_lists_non_event_id_fields_per_format() {
        let decoder = EventDecoder::new(SCHEMA, true).expect("schema should parse");
        assert_eq!(
            decoder.additional_info(),
            vec![vec!["severity".to_string(), "port".to_string()]],
            "formats without additional fields are omitted"
        );
    }

    #[test]
    fn describe_dumps_the_layout() {
        let decoder = EventDecoder::new(SCHEMA, true).expect("schema should parse");
        let text = decoder.describe(true);
        assert!(text.contains("format selector: shift = 8"));
        assert!(text.contains("format 1"));
        assert!(text.contains("severity"));
        assert!(text.contains("enum SEV"));
        assert!(text.contains("minor"));
    }
}
