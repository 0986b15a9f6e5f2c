use std::fmt;

use crate::text::unquote;

/// A decoded wire token.
///
/// `Display` renders the bare wire form: no quoting, no exponent notation.
/// Quoting is applied explicitly by the write paths that need it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An integer token (`-40`, `+7`, `1000000`).
    Int(i64),
    /// A fractional token (`1.5`, `-0.25`). Carried as IEEE-754 double.
    Num(f64),
    /// A discrete mnemonic or the payload of a quoted string.
    Text(String),
}

impl Value {
    /// The value as `i64`, if it is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `f64`; integer values widen.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Num(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    /// The value as `&str`, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            // A whole-number double still needs its decimal point on the
            // wire, otherwise the instrument reads an integer token.
            Value::Num(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Value::Num(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// The four instrument value classes.
///
/// `Discrete` and `Text` both decode to [`Value::Text`]; they differ on the
/// write side only — `Text` values are quote-wrapped, `Discrete` mnemonics
/// go out bare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Whole-number tokens.
    Integer,
    /// Tokens carrying a decimal point.
    Numeric,
    /// Bare mnemonics (`ON`, `OFF`, `AUTO`).
    Discrete,
    /// Quote-delimited strings.
    Text,
}

/// Classify a wire token and decode it.
///
/// A token containing a decimal point that parses as a double is `Numeric`;
/// otherwise a token that parses fully as a (optionally signed) integer is
/// `Integer`; otherwise a token opening with `"` is `Text` (the returned
/// value carries the unquoted payload); anything else is `Discrete`.
pub fn classify(token: &str) -> (ValueKind, Value) {
    if token.contains('.') {
        if let Ok(v) = token.parse::<f64>() {
            return (ValueKind::Numeric, Value::Num(v));
        }
    } else if let Ok(v) = token.parse::<i64>() {
        return (ValueKind::Integer, Value::Int(v));
    }

    if token.starts_with('"') {
        (ValueKind::Text, Value::Text(unquote(token)))
    } else {
        (ValueKind::Discrete, Value::Text(token.to_string()))
    }
}
