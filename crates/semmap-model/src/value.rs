use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::schema::{AttributeType, EntityType};

/// A typed cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
}

static NULL: Value = Value::Null;

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Textual identity of the value, used to match rows by identifier.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Converts an evaluated value to the representation of `data_type`.
    ///
    /// `Null` is accepted by every type. Text types stringify scalars, numeric
    /// types accept numbers and parseable text within range, temporal types
    /// accept ISO 8601 text, single references accept one scalar and multiple
    /// references wrap scalars into a list. Compound attributes hold no value.
    pub fn coerce_to(self, data_type: AttributeType) -> Result<Value, ValueError> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        match data_type {
            AttributeType::Compound => Err(self.incompatible(data_type)),
            ty if ty.is_textual() => match self {
                Value::List(_) => Err(self.incompatible(ty)),
                other => Ok(Value::Text(other.to_string())),
            },
            AttributeType::Int => self.into_integer(
                data_type,
                i64::from(i32::MIN),
                i64::from(i32::MAX),
            ),
            AttributeType::Long => self.into_integer(data_type, i64::MIN, i64::MAX),
            AttributeType::Decimal => match self {
                Value::Int(i) => Ok(Value::Decimal(i as f64)),
                Value::Decimal(d) => Ok(Value::Decimal(d)),
                Value::Text(text) => text
                    .trim()
                    .parse::<f64>()
                    .map(Value::Decimal)
                    .map_err(|_| unparseable(data_type, &text)),
                other => Err(other.incompatible(data_type)),
            },
            AttributeType::Bool => match self {
                Value::Bool(b) => Ok(Value::Bool(b)),
                Value::Int(1) => Ok(Value::Bool(true)),
                Value::Int(0) => Ok(Value::Bool(false)),
                Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err(unparseable(data_type, &text)),
                },
                other => Err(other.incompatible(data_type)),
            },
            AttributeType::Date => match self {
                Value::Date(d) => Ok(Value::Date(d)),
                Value::DateTime(dt) => Ok(Value::Date(dt.date_naive())),
                Value::Text(text) => parse_date(text.trim())
                    .map(Value::Date)
                    .ok_or_else(|| unparseable(data_type, &text)),
                other => Err(other.incompatible(data_type)),
            },
            AttributeType::DateTime => match self {
                Value::DateTime(dt) => Ok(Value::DateTime(dt)),
                Value::Date(d) => d
                    .and_hms_opt(0, 0, 0)
                    .map(|naive| Value::DateTime(naive.and_utc()))
                    .ok_or_else(|| Value::Date(d).incompatible(data_type)),
                Value::Text(text) => parse_date_time(text.trim())
                    .map(Value::DateTime)
                    .ok_or_else(|| unparseable(data_type, &text)),
                other => Err(other.incompatible(data_type)),
            },
            ty if ty.is_multiple_reference() => match self {
                Value::List(items) => Ok(Value::List(items)),
                scalar => Ok(Value::List(vec![scalar])),
            },
            ty => match self {
                Value::List(mut items) if items.len() == 1 => Ok(items.remove(0)),
                Value::List(_) => Err(self.incompatible(ty)),
                scalar => Ok(scalar),
            },
        }
    }

    /// Parses a textual cell. Empty text is `Null`; multiple-reference cells
    /// are comma separated. Textual cells keep their whitespace, so a blank
    /// cell of a textual type is text.
    pub fn parse(text: &str, data_type: AttributeType) -> Result<Value, ValueError> {
        if text.is_empty() {
            return Ok(Value::Null);
        }
        if data_type.is_textual() {
            return Ok(Value::text(text));
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        if data_type.is_multiple_reference() {
            let items = trimmed
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Value::text)
                .collect();
            return Ok(Value::List(items));
        }
        Value::text(trimmed).coerce_to(data_type)
    }

    fn into_integer(self, data_type: AttributeType, min: i64, max: i64) -> Result<Value, ValueError> {
        let in_range = |i: i64| {
            if (min..=max).contains(&i) {
                Ok(Value::Int(i))
            } else {
                Err(ValueError::OutOfRange {
                    data_type,
                    value: i.to_string(),
                })
            }
        };
        match self {
            Value::Int(i) => in_range(i),
            Value::Decimal(d) if d.is_finite() && d.fract() == 0.0 => {
                if d < min as f64 || d > max as f64 {
                    return Err(ValueError::OutOfRange {
                        data_type,
                        value: d.to_string(),
                    });
                }
                in_range(d as i64)
            }
            Value::Text(text) => match text.trim().parse::<i64>() {
                Ok(i) => in_range(i),
                Err(_) => Err(unparseable(data_type, &text)),
            },
            other => Err(other.incompatible(data_type)),
        }
    }

    fn incompatible(&self, data_type: AttributeType) -> ValueError {
        ValueError::Incompatible {
            data_type,
            value: self.to_string(),
        }
    }
}

fn unparseable(data_type: AttributeType, text: &str) -> ValueError {
    ValueError::Unparseable {
        data_type,
        text: text.to_string(),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_time(text).map(|dt| dt.date_naive()))
}

fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(text) => f.write_str(text),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Decimal(value)
    }
}

/// A row of attribute values keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells.get(name)
    }

    /// The value of `name`, or `Null` when unset.
    pub fn value(&self, name: &str) -> &Value {
        self.cells.get(name).unwrap_or(&NULL)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.cells.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.cells.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cells.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The non-null identity value of this row under `schema`.
    pub fn id_value(&self, schema: &EntityType) -> Option<&Value> {
        let name = schema.id_attribute.as_deref()?;
        self.get(name).filter(|value| !value.is_null())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}
