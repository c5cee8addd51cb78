use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use log::debug;

use crate::error::{GenError, MinimalFieldViolation};
use crate::schema_ast::{SqlType, TableSchema};

/// Minimal field sets must be strictly smaller than this.
pub const MINIMAL_FIELD_LIMIT: usize = 8;

const AUDIT_PREFIXES: &[&str] = &["created_", "modified_", "updated_", "deleted_"];
const AUDIT_NAMES: &[&str] = &["audit_id", "is_deleted"];

const STRONG_TERMS: &[&str] = &[
    "amount", "fee", "rate", "price", "percentage", "percent", "tax", "units", "quantity",
    "qty", "total", "balance", "cost", "charge",
];
const MEDIUM_TERMS: &[&str] = &[
    "currency", "code", "category", "reason", "type", "tier", "discount", "threshold",
    "limit", "count",
];
const WEAK_TERMS: &[&str] = &["date", "period", "cycle", "status", "desc", "name", "order"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    JoinKey,
    Audit,
    Eligible,
}

pub fn classify_column(name: &str) -> ColumnClass {
    if is_audit_column(name) {
        ColumnClass::Audit
    } else if is_join_key(name) {
        ColumnClass::JoinKey
    } else {
        ColumnClass::Eligible
    }
}

pub fn is_join_key(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "id" || name == "uuid" || name.ends_with("_id") || name.ends_with("_uuid")
}

pub fn is_audit_column(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    AUDIT_NAMES.contains(&name.as_str()) || AUDIT_PREFIXES.iter().any(|p| name.starts_with(p))
}

pub trait MinimalFieldPolicy {
    fn select(&self, schema: &TableSchema) -> BTreeSet<String>;
}

/// Default policy: every eligible column when there are few enough, otherwise
/// the highest-scoring ones by billing vocabulary, earlier columns first on
/// ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct BillingRelevance;

impl BillingRelevance {
    pub fn score(name: &str, sql_type: &SqlType) -> u32 {
        let lower = name.to_ascii_lowercase();
        let mut score: u32 = lower
            .split('_')
            .map(|token| {
                if STRONG_TERMS.contains(&token) {
                    3
                } else if MEDIUM_TERMS.contains(&token) {
                    2
                } else if WEAK_TERMS.contains(&token) {
                    1
                } else {
                    0
                }
            })
            .sum();
        match sql_type {
            SqlType::Decimal { .. } => score += 2,
            SqlType::Enum(_) => score += 1,
            _ => {}
        }
        score
    }
}

impl MinimalFieldPolicy for BillingRelevance {
    fn select(&self, schema: &TableSchema) -> BTreeSet<String> {
        let mut eligible: Vec<(usize, u32, &str)> = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| classify_column(&c.name) == ColumnClass::Eligible)
            .map(|(i, c)| (i, Self::score(&c.name, &c.sql_type), c.name.as_str()))
            .collect();

        if eligible.len() >= MINIMAL_FIELD_LIMIT {
            eligible.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            eligible.truncate(MINIMAL_FIELD_LIMIT - 1);
        }
        debug!(
            "{}: minimal candidates {:?}",
            schema.name,
            eligible.iter().map(|(_, s, n)| (*n, *s)).collect::<Vec<_>>()
        );

        eligible.into_iter().map(|(_, _, n)| n.to_string()).collect()
    }
}

/// Explicit per-table field lists, falling back to another policy for tables
/// without an entry.
#[derive(Debug, Clone, Default)]
pub struct OverridePolicy<P> {
    overrides: HashMap<String, Vec<String>>,
    fallback: P,
}

impl<P: MinimalFieldPolicy> OverridePolicy<P> {
    pub fn new(overrides: HashMap<String, Vec<String>>, fallback: P) -> Self {
        Self {
            overrides,
            fallback,
        }
    }

    pub fn from_json(text: &str, fallback: P) -> Result<Self, GenError> {
        let overrides: HashMap<String, Vec<String>> =
            serde_json::from_str(text).map_err(|e| GenError::Overrides(e.to_string()))?;
        Ok(Self::new(overrides, fallback))
    }

    pub fn from_file(path: &Path, fallback: P) -> Result<Self, GenError> {
        let text = std::fs::read_to_string(path).map_err(|source| GenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, fallback)
    }
}

impl<P: MinimalFieldPolicy> MinimalFieldPolicy for OverridePolicy<P> {
    fn select(&self, schema: &TableSchema) -> BTreeSet<String> {
        match self.overrides.get(&schema.name) {
            Some(fields) => fields.iter().cloned().collect(),
            None => self.fallback.select(schema),
        }
    }
}

pub fn select_minimal_fields(
    schema: &TableSchema,
    policy: &dyn MinimalFieldPolicy,
) -> Result<BTreeSet<String>, GenError> {
    let selected = policy.select(schema);
    check_minimal_fields(schema, &selected)?;
    Ok(selected)
}

pub fn check_minimal_fields(
    schema: &TableSchema,
    selected: &BTreeSet<String>,
) -> Result<(), GenError> {
    let violation = |violation| GenError::MinimalFieldSet {
        table: schema.name.clone(),
        violation,
    };

    if selected.is_empty() {
        return Err(violation(MinimalFieldViolation::Empty));
    }
    if selected.len() >= MINIMAL_FIELD_LIMIT {
        return Err(violation(MinimalFieldViolation::TooMany {
            count: selected.len(),
        }));
    }
    for name in selected {
        if schema.column(name).is_none() {
            return Err(violation(MinimalFieldViolation::UnknownField(name.clone())));
        }
        match classify_column(name) {
            ColumnClass::JoinKey => {
                return Err(violation(MinimalFieldViolation::JoinKey(name.clone())));
            }
            ColumnClass::Audit => {
                return Err(violation(MinimalFieldViolation::AuditColumn(name.clone())));
            }
            ColumnClass::Eligible => {}
        }
    }
    Ok(())
}
