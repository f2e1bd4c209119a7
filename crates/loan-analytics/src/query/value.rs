//! Declared parameter types and validated parameter values

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::constants::DATE_FORMAT;

/// Declared type of a query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Free text up to `max_len` characters
    Text { max_len: usize },
    /// Whole number within `min..=max`
    Integer { min: i64, max: i64 },
    /// Finite floating-point number
    Number,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// One of a fixed set of values, matched case-insensitively
    Enum(&'static [&'static str]),
}

impl ParamKind {
    pub const fn text(max_len: usize) -> Self {
        Self::Text { max_len }
    }

    pub const fn integer(min: i64, max: i64) -> Self {
        Self::Integer { min, max }
    }

    /// Human-readable type name used in validation errors
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Integer { .. } => "integer",
            Self::Number => "number",
            Self::Date => "date (YYYY-MM-DD)",
            Self::Enum(_) => "enum",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { max_len } => write!(f, "text(<= {max_len})"),
            Self::Integer { min, max } => write!(f, "integer({min}..={max})"),
            Self::Number => f.write_str("number"),
            Self::Date => f.write_str("date"),
            Self::Enum(allowed) => write!(f, "enum({})", allowed.join("|")),
        }
    }
}

/// A single declared parameter of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    /// Raw default applied when the caller omits the parameter
    pub default: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            default: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A validated, typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Date(NaiveDate),
    /// Canonical spelling of the matched enum member
    Enum(&'static str),
}

impl ParamValue {
    const fn tag(&self) -> char {
        match self {
            Self::Text(_) => 't',
            Self::Integer(_) => 'i',
            Self::Number(_) => 'n',
            Self::Date(_) => 'd',
            Self::Enum(_) => 'e',
        }
    }

    /// Warehouse SQL type used when binding the value as a named parameter
    #[must_use]
    pub const fn sql_type(&self) -> &'static str {
        match self {
            Self::Text(_) | Self::Enum(_) => "STRING",
            Self::Integer(_) => "BIGINT",
            Self::Number(_) => "DOUBLE",
            Self::Date(_) => "DATE",
        }
    }

    /// String form sent to the warehouse alongside [`Self::sql_type`]
    #[must_use]
    pub fn wire_value(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Enum(s) => (*s).to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Number(v) => format!("{v:?}"),
            Self::Date(d) => d.format(DATE_FORMAT).to_string(),
        }
    }

    /// Stable `tag:value` encoding used in cache keys
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.tag(), escape_component(&self.wire_value()))
    }

    /// Escaped inline SQL literal, for display only
    #[must_use]
    pub fn sql_literal(&self) -> String {
        match self {
            Self::Text(s) => quote_string(s),
            Self::Enum(s) => quote_string(s),
            Self::Integer(v) => v.to_string(),
            Self::Number(v) => format!("CAST({v:?} AS DOUBLE)"),
            Self::Date(d) => format!("DATE'{}'", d.format(DATE_FORMAT)),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_value())
    }
}

/// Quote a string literal; backslash and quote are escaped as the warehouse expects
fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => {}
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Escape the separators used by the canonical encoding
pub(crate) fn escape_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}
