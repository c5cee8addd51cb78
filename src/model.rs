use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntBound {
    /// value > n
    Gt(i64),
    /// value >= n
    Ge(i64),
}

impl IntBound {
    pub fn admits(self, value: i64) -> bool {
        match self {
            IntBound::Gt(n) => value > n,
            IntBound::Ge(n) => value >= n,
        }
    }
}

impl fmt::Display for IntBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntBound::Gt(n) => write!(f, "> {n}"),
            IntBound::Ge(n) => write!(f, ">= {n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Integer { bound: Option<IntBound> },
    String { max_length: u32 },
    DateTime,
    Date,
    Decimal { max_digits: u32, decimal_places: u32 },
    Enum { variants: Vec<String> },
}

impl ValueKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::Integer { .. } => "integer",
            ValueKind::String { .. } => "string",
            ValueKind::DateTime => "date-time",
            ValueKind::Date => "date",
            ValueKind::Decimal { .. } => "decimal",
            ValueKind::Enum { .. } => "enum",
        }
    }

    /// Constraint text for descriptions, empty when unconstrained.
    pub fn constraint(&self) -> String {
        match self {
            ValueKind::Integer { bound: Some(bound) } => format!("value {bound}"),
            ValueKind::Integer { bound: None } | ValueKind::DateTime | ValueKind::Date => {
                String::new()
            }
            ValueKind::String { max_length } => format!("max length {max_length}"),
            ValueKind::Decimal {
                max_digits,
                decimal_places,
            } => format!("{max_digits} digits, {decimal_places} fractional"),
            ValueKind::Enum { variants } => format!("one of {}", variants.join("|")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    Literal(String),
    CurrentTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Required,
    /// Required, pre-filled with the column default.
    Defaulted(DefaultValue),
    /// Optional, defaulting to none.
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    pub kind: ValueKind,
    pub presence: Presence,
}

impl FieldType {
    pub fn required(kind: ValueKind) -> Self {
        Self {
            kind,
            presence: Presence::Required,
        }
    }

    pub fn optional(kind: ValueKind) -> Self {
        Self {
            kind,
            presence: Presence::Optional,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.presence == Presence::Optional
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.presence {
            Presence::Required => write!(f, "required {}", self.kind.type_name()),
            Presence::Optional => write!(f, "optional {}", self.kind.type_name()),
            Presence::Defaulted(DefaultValue::Literal(v)) => {
                write!(f, "required {} = '{v}'", self.kind.type_name())
            }
            Presence::Defaulted(DefaultValue::CurrentTimestamp) => {
                write!(f, "required {} = now", self.kind.type_name())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedField {
    pub name: String,
    pub field_type: FieldType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedModel {
    pub name: String,
    pub type_name: String,
    pub table: String,
    pub fields: Vec<GeneratedField>,
    pub minimal_fields: BTreeSet<String>,
    pub example: Instance,
}

impl GeneratedModel {
    pub fn field(&self, name: &str) -> Option<&GeneratedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn minimal_example(&self) -> Instance {
        self.example.project(&self.minimal_fields)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Decimal(Decimal),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Integer(n) => Value::from(*n),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            FieldValue::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
            FieldValue::Decimal(d) => Value::String(d.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Instance {
    values: Vec<(String, FieldValue)>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn field_names(&self) -> BTreeSet<String> {
        self.values.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn project(&self, names: &BTreeSet<String>) -> Instance {
        Instance {
            values: self
                .values
                .iter()
                .filter(|(n, _)| names.contains(n))
                .cloned()
                .collect(),
        }
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(n, v)| (n.clone(), v.to_json()))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_json_map())
    }
}
