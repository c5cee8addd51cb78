use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub default: ColumnDefault,
    pub auto_increment: bool,
    pub comment: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: false,
            default: ColumnDefault::None,
            auto_increment: false,
            comment: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        if default == ColumnDefault::Null {
            self.nullable = true;
        }
        self.default = default;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    None,
    Null,
    Literal(String),
    CurrentTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    Medium,
    Int,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallWidth {
    Tiny,
    Small,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    Integer { width: IntWidth, unsigned: bool },
    SmallInt { width: SmallWidth, unsigned: bool },
    Char(u32),
    VarChar(u32),
    Date,
    Timestamp { fsp: u8 },
    Decimal { precision: u32, scale: u32 },
    Enum(Vec<String>),
    /// Raw DDL spelling of a type outside the recognized set.
    Unrecognized(String),
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Integer { width, unsigned } => {
                let name = match width {
                    IntWidth::Medium => "mediumint",
                    IntWidth::Int => "int",
                    IntWidth::Big => "bigint",
                };
                write!(f, "{name}")?;
                if *unsigned {
                    write!(f, " unsigned")?;
                }
                Ok(())
            }
            SqlType::SmallInt { width, unsigned } => {
                let name = match width {
                    SmallWidth::Tiny => "tinyint",
                    SmallWidth::Small => "smallint",
                };
                write!(f, "{name}")?;
                if *unsigned {
                    write!(f, " unsigned")?;
                }
                Ok(())
            }
            SqlType::Char(n) => write!(f, "char({n})"),
            SqlType::VarChar(n) => write!(f, "varchar({n})"),
            SqlType::Date => write!(f, "date"),
            SqlType::Timestamp { fsp } => write!(f, "timestamp({fsp})"),
            SqlType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            SqlType::Enum(variants) => {
                let quoted: Vec<String> = variants.iter().map(|v| format!("'{v}'")).collect();
                write!(f, "enum({})", quoted.join(","))
            }
            SqlType::Unrecognized(raw) => write!(f, "{raw}"),
        }
    }
}
