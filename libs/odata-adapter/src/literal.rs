//! `OData` literal codec
//!
//! Converts primitive values to their protocol literal text (for `$filter` values and
//! key segments) and parses key segment text back into values.
//!
//! | value | literal |
//! |-------|---------|
//! | string | `'O''Malley'` |
//! | integer / float | `42`, `1.5` |
//! | boolean | `true` / `false` |
//! | null | `null` |
//! | date/time | `2024-05-01T10:00:00Z` (always UTC) |

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{Error, Result};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A primitive value that has an `OData` literal form.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl Literal {
    /// Render the protocol literal text.
    ///
    /// # Errors
    /// Returns `Error::UnsupportedValue` for non-finite floats.
    pub fn encode(&self) -> Result<String> {
        match self {
            Literal::Null => Ok("null".to_owned()),
            Literal::Bool(b) => Ok(b.to_string()),
            Literal::Int(i) => Ok(i.to_string()),
            Literal::Float(f) => {
                if f.is_finite() {
                    Ok(f.to_string())
                } else {
                    Err(Error::UnsupportedValue(format!("non-finite float {f}")))
                }
            }
            Literal::String(s) => Ok(quote(s)),
            Literal::DateTime(dt) => Ok(dt.format(DATETIME_FORMAT).to_string()),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "integer",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
            Literal::DateTime(_) => "datetime",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "<{}>", self.type_name()),
        }
    }
}

/// Conversion into a [`Literal`].
///
/// Implemented for the primitive Rust types, `chrono` date/times (any zone),
/// `Option<T>` (`None` becomes `null`) and decoded JSON values. JSON arrays and
/// objects have no literal form and fail with `Error::UnsupportedValue`.
pub trait IntoLiteral {
    /// # Errors
    /// Returns `Error::UnsupportedValue` when the value has no literal form.
    fn into_literal(self) -> Result<Literal>;
}

impl IntoLiteral for Literal {
    fn into_literal(self) -> Result<Literal> {
        Ok(self)
    }
}

impl IntoLiteral for bool {
    fn into_literal(self) -> Result<Literal> {
        Ok(Literal::Bool(self))
    }
}

macro_rules! int_into_literal {
    ($($t:ty),*) => {
        $(
            impl IntoLiteral for $t {
                fn into_literal(self) -> Result<Literal> {
                    Ok(Literal::Int(i64::from(self)))
                }
            }
        )*
    };
}

int_into_literal!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! wide_int_into_literal {
    ($($t:ty),*) => {
        $(
            impl IntoLiteral for $t {
                fn into_literal(self) -> Result<Literal> {
                    i64::try_from(self).map(Literal::Int).map_err(|_| {
                        Error::UnsupportedValue(format!("integer {self} exceeds i64 range"))
                    })
                }
            }
        )*
    };
}

wide_int_into_literal!(u64, i128, u128, isize, usize);

impl IntoLiteral for f64 {
    fn into_literal(self) -> Result<Literal> {
        if self.is_finite() {
            Ok(Literal::Float(self))
        } else {
            Err(Error::UnsupportedValue(format!("non-finite float {self}")))
        }
    }
}

/// Widened through the shortest decimal form, so `0.1f32` stays `0.1`.
impl IntoLiteral for f32 {
    fn into_literal(self) -> Result<Literal> {
        if !self.is_finite() {
            return Err(Error::UnsupportedValue(format!("non-finite float {self}")));
        }
        self.to_string()
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|e| Error::UnsupportedValue(format!("float {self}: {e}")))
    }
}

impl IntoLiteral for &str {
    fn into_literal(self) -> Result<Literal> {
        Ok(Literal::String(self.to_owned()))
    }
}

impl IntoLiteral for String {
    fn into_literal(self) -> Result<Literal> {
        Ok(Literal::String(self))
    }
}

impl IntoLiteral for &String {
    fn into_literal(self) -> Result<Literal> {
        Ok(Literal::String(self.clone()))
    }
}

impl<Tz: TimeZone> IntoLiteral for DateTime<Tz> {
    fn into_literal(self) -> Result<Literal> {
        Ok(Literal::DateTime(self.with_timezone(&Utc)))
    }
}

/// Naive date/times are taken to already be UTC.
impl IntoLiteral for NaiveDateTime {
    fn into_literal(self) -> Result<Literal> {
        Ok(Literal::DateTime(self.and_utc()))
    }
}

impl<T: IntoLiteral> IntoLiteral for Option<T> {
    fn into_literal(self) -> Result<Literal> {
        match self {
            Some(v) => v.into_literal(),
            None => Ok(Literal::Null),
        }
    }
}

impl IntoLiteral for &serde_json::Value {
    fn into_literal(self) -> Result<Literal> {
        use serde_json::Value as J;

        match self {
            J::Null => Ok(Literal::Null),
            J::Bool(b) => Ok(Literal::Bool(*b)),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Literal::Int(i))
                } else if let Some(f) = n.as_f64() {
                    f.into_literal()
                } else {
                    Err(Error::UnsupportedValue(format!("number {n}")))
                }
            }
            J::String(s) => Ok(Literal::String(s.clone())),
            J::Array(_) => Err(Error::UnsupportedValue("array".to_owned())),
            J::Object(_) => Err(Error::UnsupportedValue("object".to_owned())),
        }
    }
}

impl IntoLiteral for serde_json::Value {
    fn into_literal(self) -> Result<Literal> {
        (&self).into_literal()
    }
}

/// Encode a value as an `OData` literal.
///
/// # Errors
/// Returns `Error::UnsupportedValue` if the value has no literal form.
pub fn encode<V: IntoLiteral>(value: V) -> Result<String> {
    value.into_literal()?.encode()
}

/// Encode a single-valued key segment, e.g. `'ALFKI'` or `42`.
///
/// # Errors
/// Returns `Error::UnsupportedValue` if the value has no literal form.
pub fn encode_key<V: IntoLiteral>(value: V) -> Result<String> {
    encode(value)
}

/// Encode a composite key segment: `Key1=<lit1>,Key2=<lit2>` in iteration order.
///
/// # Errors
/// Returns `Error::UnsupportedValue` if any value has no literal form.
pub fn encode_composite_key<I, K, V>(pairs: I) -> Result<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: IntoLiteral,
{
    let mut parts = Vec::new();
    for (name, value) in pairs {
        parts.push(format!("{}={}", name.as_ref(), encode(value)?));
    }
    Ok(parts.join(","))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    out.push_str(&s.replace('\'', "''"));
    out.push('\'');
    out
}

/// Strip the surrounding quotes of a string literal and un-double its internal quotes.
///
/// # Errors
/// Returns `Error::InvalidArgument` when the text is not a well-formed string literal.
pub fn unescape_string(text: &str) -> Result<String> {
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .ok_or_else(|| Error::InvalidArgument(format!("not a quoted string literal: {text}")))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\'' && chars.next() != Some('\'') {
            return Err(Error::InvalidArgument(format!(
                "unescaped quote in string literal: {text}"
            )));
        }
        out.push(c);
    }
    Ok(out)
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

fn looks_numeric(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    digits.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Parse literal text back into a value.
///
/// Accepts the forms produced by [`encode`], plus the V2 typed forms
/// `datetime'...'`, `datetimeoffset'...'`, `guid'...'` and the `L` suffix on integers.
///
/// # Errors
/// Returns `Error::InvalidArgument` when the text is not a recognizable literal.
pub fn decode(text: &str) -> Result<Literal> {
    let text = text.trim();

    if text.starts_with('\'') {
        return unescape_string(text).map(Literal::String);
    }

    for prefix in ["datetimeoffset", "datetime"] {
        if let Some(rest) = text.strip_prefix(prefix)
            && rest.starts_with('\'')
        {
            let inner = unescape_string(rest)?;
            return parse_datetime(&inner)
                .map(Literal::DateTime)
                .ok_or_else(|| {
                    Error::InvalidArgument(format!("invalid datetime literal: {text}"))
                });
        }
    }
    if let Some(rest) = text.strip_prefix("guid")
        && rest.starts_with('\'')
    {
        return unescape_string(rest).map(Literal::String);
    }

    match text {
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }

    if looks_numeric(text) {
        let int_text = text.strip_suffix('L').unwrap_or(text);
        if let Ok(i) = int_text.parse::<i64>() {
            return Ok(Literal::Int(i));
        }
        if let Some(dt) = parse_datetime(text) {
            return Ok(Literal::DateTime(dt));
        }
        if let Ok(f) = text.parse::<f64>()
            && f.is_finite()
        {
            return Ok(Literal::Float(f));
        }
    }

    Err(Error::InvalidArgument(format!(
        "unrecognized literal: {text}"
    )))
}

/// Parsed key segment: the text between the parentheses of `Set(...)`.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyPredicate {
    Single(Literal),
    Composite(Vec<(String, Literal)>),
}

/// Split on `sep` outside of single-quoted string literals.
pub(crate) fn split_unquoted(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == '\'' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parse a key segment such as `'ALFKI'`, `42` or `OrderID=1,ProductID='X'`.
///
/// # Errors
/// Returns `Error::InvalidArgument` when the segment is empty or a part cannot be decoded.
pub fn decode_key(segment: &str) -> Result<KeyPredicate> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err(Error::InvalidArgument("empty key segment".to_owned()));
    }

    let parts = split_unquoted(segment, ',');
    let mut named = Vec::with_capacity(parts.len());
    for part in &parts {
        match split_unquoted(part, '=').as_slice() {
            [value] if parts.len() == 1 => return decode(value).map(KeyPredicate::Single),
            [name, value] if !name.trim().is_empty() => {
                named.push((name.trim().to_owned(), decode(value)?));
            }
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "invalid composite key part: {part}"
                )));
            }
        }
    }
    Ok(KeyPredicate::Composite(named))
}
