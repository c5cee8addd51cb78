use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("syntax error in schema at line {line}: unexpected `{context}`")]
    Syntax { line: usize, context: String },

    #[error("table `{0}` appears more than once in this run")]
    DuplicateTable(String),

    #[error("no table named `{0}` in the schema")]
    UnknownTable(String),

    #[error("column `{table}.{column}` has unrecognized type `{sql_type}`")]
    UnrecognizedType {
        table: String,
        column: String,
        sql_type: String,
    },

    #[error("minimal field set for `{table}` is invalid: {violation}")]
    MinimalFieldSet {
        table: String,
        violation: MinimalFieldViolation,
    },

    #[error("example for `{model}` failed validation: {detail}")]
    RenderValidation {
        model: String,
        detail: ValidationDetail,
    },

    #[error("invalid minimal-field overrides: {0}")]
    Overrides(String),

    #[error("flow graph: {0}")]
    Graph(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GenError {
    /// Process exit code for this failure. `2` is left to clap usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            GenError::UnrecognizedType { .. } => 3,
            GenError::MinimalFieldSet { .. } => 4,
            GenError::RenderValidation { .. } => 5,
            GenError::Syntax { .. }
            | GenError::DuplicateTable(_)
            | GenError::UnknownTable(_)
            | GenError::Overrides(_)
            | GenError::Graph(_)
            | GenError::Io { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinimalFieldViolation {
    Empty,
    TooMany { count: usize },
    UnknownField(String),
    JoinKey(String),
    AuditColumn(String),
}

impl fmt::Display for MinimalFieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinimalFieldViolation::Empty => {
                write!(f, "no billing-relevant field is eligible")
            }
            MinimalFieldViolation::TooMany { count } => {
                write!(f, "{count} fields selected, at most 7 allowed")
            }
            MinimalFieldViolation::UnknownField(name) => {
                write!(f, "`{name}` is not a column of the table")
            }
            MinimalFieldViolation::JoinKey(name) => write!(f, "`{name}` is a join key"),
            MinimalFieldViolation::AuditColumn(name) => write!(f, "`{name}` is an audit column"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetail {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl ValidationDetail {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(field, "field to be present", "missing")
    }

    pub fn extra_field(field: impl Into<String>) -> Self {
        Self::new(field, "no undeclared fields", "extra field present")
    }

    pub fn null_value(field: impl Into<String>) -> Self {
        Self::new(field, "non-null value", "null")
    }
}

impl fmt::Display for ValidationDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}
