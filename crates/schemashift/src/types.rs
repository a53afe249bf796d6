//! SQL type vocabulary shared by descriptors, operations and renderers.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::dialect::string_literal;

/// SQL data types.
///
/// Snapshots carry the declared type text reported by the engine
/// (`int`, `character varying(20)`, ...). Parsing folds the common
/// spellings onto one variant so that `int` and `INTEGER` compare equal;
/// anything unrecognised is kept verbatim in [`DataType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    // Integer types
    /// Small integer (2 bytes).
    Smallint,
    /// Integer (4 bytes).
    Integer,
    /// Big integer (8 bytes).
    Bigint,

    // Floating point
    /// Real (4-byte float).
    Real,
    /// Double precision (8-byte float).
    Double,
    /// Decimal with precision and scale.
    Decimal {
        /// Total number of digits.
        precision: Option<u16>,
        /// Number of digits after decimal point.
        scale: Option<u16>,
    },
    /// Numeric (alias for Decimal).
    Numeric {
        /// Total number of digits.
        precision: Option<u16>,
        /// Number of digits after decimal point.
        scale: Option<u16>,
    },

    // String types
    /// Fixed-length character string.
    Char(Option<u32>),
    /// Variable-length character string.
    Varchar(Option<u32>),
    /// Text (variable length, no limit).
    Text,

    // Binary types
    /// Binary large object.
    Blob,
    /// Binary with specified length.
    Binary(Option<u32>),
    /// Variable-length binary.
    Varbinary(Option<u32>),

    // Date/time types
    /// Date.
    Date,
    /// Time.
    Time,
    /// Timestamp.
    Timestamp,
    /// DateTime (MySQL / SQL Server style).
    Datetime,

    // Boolean
    /// Boolean.
    Boolean,

    /// Engine-specific type, kept as declared.
    Custom(String),
}

impl DataType {
    /// Parses a declared type as reported by an engine's catalog.
    #[must_use]
    pub fn parse(declared: &str) -> Self {
        let trimmed = declared.trim();
        let lower = trimmed.to_ascii_lowercase();
        let (base, args) = match lower.find('(') {
            Some(open) => {
                let close = lower.rfind(')').unwrap_or(lower.len());
                let inner = lower.get(open + 1..close).unwrap_or("");
                (lower[..open].trim().to_string(), parse_args(inner))
            }
            None => (lower.clone(), Vec::new()),
        };
        let first = args.first().copied();
        let second = args.get(1).copied();

        match base.as_str() {
            "smallint" | "int2" => Self::Smallint,
            "int" | "integer" | "int4" | "mediumint" => Self::Integer,
            "bigint" | "int8" => Self::Bigint,
            "real" | "float4" => Self::Real,
            "double" | "double precision" | "float8" | "float" => Self::Double,
            "decimal" => Self::Decimal {
                precision: first.and_then(|p| u16::try_from(p).ok()),
                scale: second.and_then(|s| u16::try_from(s).ok()),
            },
            "numeric" => Self::Numeric {
                precision: first.and_then(|p| u16::try_from(p).ok()),
                scale: second.and_then(|s| u16::try_from(s).ok()),
            },
            "char" | "character" => Self::Char(first),
            "varchar" | "character varying" => Self::Varchar(first),
            "text" => Self::Text,
            "blob" | "bytea" => Self::Blob,
            "binary" => Self::Binary(first),
            "varbinary" => Self::Varbinary(first),
            "date" => Self::Date,
            "time" => Self::Time,
            "timestamp" => Self::Timestamp,
            "datetime" => Self::Datetime,
            "boolean" | "bool" => Self::Boolean,
            _ => Self::Custom(trimmed.to_string()),
        }
    }

    /// Canonical declared-type text: the keyword plus any length,
    /// precision or scale. Used for serialization and as the fallback of
    /// every dialect's type mapping.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let args = match self {
            Self::Custom(text) => return text.clone(),
            Self::Decimal { precision, scale } | Self::Numeric { precision, scale } => {
                match (precision, scale) {
                    (Some(p), Some(s)) => format!("({p}, {s})"),
                    (Some(p), None) => format!("({p})"),
                    _ => String::new(),
                }
            }
            Self::Char(len) | Self::Varchar(len) | Self::Binary(len) | Self::Varbinary(len) => {
                len.map_or_else(String::new, |n| format!("({n})"))
            }
            _ => String::new(),
        };
        format!("{}{args}", self.keyword())
    }

    /// Type name without arguments; custom types are returned as
    /// declared.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Smallint => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::Bigint => "BIGINT",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Decimal { .. } => "DECIMAL",
            Self::Numeric { .. } => "NUMERIC",
            Self::Char(_) => "CHAR",
            Self::Varchar(_) => "VARCHAR",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Binary(_) => "BINARY",
            Self::Varbinary(_) => "VARBINARY",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Datetime => "DATETIME",
            Self::Boolean => "BOOLEAN",
            Self::Custom(text) => text,
        }
    }

    /// The value substituted for NULLs when a rebuild tightens a column
    /// to NOT NULL under permissive actions. `None` when the type has no
    /// portable zero value.
    #[must_use]
    pub fn zero_value(&self) -> Option<DefaultValue> {
        match self {
            Self::Smallint
            | Self::Integer
            | Self::Bigint
            | Self::Real
            | Self::Double
            | Self::Decimal { .. }
            | Self::Numeric { .. } => Some(DefaultValue::Integer(0)),
            Self::Char(_) | Self::Varchar(_) | Self::Text => {
                Some(DefaultValue::String(String::new()))
            }
            Self::Boolean => Some(DefaultValue::Boolean(false)),
            _ => None,
        }
    }

    /// Returns `true` for the integer family, the only types an
    /// auto-increment column may use.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Smallint | Self::Integer | Self::Bigint)
    }
}

fn parse_args(inner: &str) -> Vec<u32> {
    inner
        .split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .collect()
}

impl From<String> for DataType {
    fn from(declared: String) -> Self {
        Self::parse(&declared)
    }
}

impl From<&str> for DataType {
    fn from(declared: &str) -> Self {
        Self::parse(declared)
    }
}

impl From<DataType> for String {
    fn from(dt: DataType) -> Self {
        dt.to_sql()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    /// No action.
    #[serde(alias = "NO ACTION")]
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    #[serde(alias = "SET NULL")]
    SetNull,
    /// Set to default value.
    #[serde(alias = "SET DEFAULT")]
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// Default value for a column.
///
/// In snapshot JSON a bare string is the raw default expression as the
/// engine reports it (`"12"`, `"CURRENT_TIMESTAMP"`, `"'abc'"`); booleans
/// and numbers are literals; `{"string": "abc"}` is a string literal that
/// still needs quoting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDefault", into = "RawDefault")]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression (e.g., CURRENT_TIMESTAMP).
    Expression(String),
}

impl DefaultValue {
    /// Literal text of the default in ANSI spelling. Dialects override
    /// booleans where the engine has no `TRUE`/`FALSE`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Boolean(true) => "TRUE".to_string(),
            Self::Boolean(false) => "FALSE".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(text) => string_literal(text),
            Self::Expression(expr) => expr.clone(),
        }
    }

    /// Text used to compare two defaults: the generic SQL with
    /// surrounding whitespace and redundant outer parentheses removed,
    /// so `((12))` as reported by SQL Server equals `12`.
    #[must_use]
    pub fn normalized(&self) -> String {
        let mut text = self.to_sql().trim().to_string();
        while text.starts_with('(') && text.ends_with(')') && wraps_whole(&text) {
            text = text[1..text.len() - 1].trim().to_string();
        }
        text
    }

    /// Compares two defaults by their normalized text.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

/// Returns `true` when the first `(` closes at the last character.
fn wraps_whole(text: &str) -> bool {
    let mut depth = 0usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Wire shape of [`DefaultValue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Expr(String),
    Literal { string: String },
    Null(()),
}

impl From<RawDefault> for DefaultValue {
    fn from(raw: RawDefault) -> Self {
        match raw {
            RawDefault::Bool(b) => Self::Boolean(b),
            RawDefault::Int(i) => Self::Integer(i),
            RawDefault::Float(f) => Self::Float(f),
            RawDefault::Expr(e) => Self::Expression(e),
            RawDefault::Literal { string } => Self::String(string),
            RawDefault::Null(()) => Self::Null,
        }
    }
}

impl From<DefaultValue> for RawDefault {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Null => Self::Null(()),
            DefaultValue::Boolean(b) => Self::Bool(b),
            DefaultValue::Integer(i) => Self::Int(i),
            DefaultValue::Float(f) => Self::Float(f),
            DefaultValue::String(string) => Self::Literal { string },
            DefaultValue::Expression(e) => Self::Expr(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_fold_onto_variants() {
        assert_eq!(DataType::parse("int"), DataType::Integer);
        assert_eq!(DataType::parse("INTEGER"), DataType::Integer);
        assert_eq!(DataType::parse("int8"), DataType::Bigint);
        assert_eq!(
            DataType::parse("character varying(20)"),
            DataType::Varchar(Some(20))
        );
        assert_eq!(
            DataType::parse("numeric(10, 2)"),
            DataType::Numeric {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert_eq!(DataType::parse("bool"), DataType::Boolean);
    }

    #[test]
    fn unknown_types_are_kept_verbatim() {
        assert_eq!(
            DataType::parse(" nvarchar(50) "),
            DataType::Custom("nvarchar(50)".into())
        );
        assert_eq!(DataType::parse("jsonb").to_sql(), "jsonb");
    }

    #[test]
    fn declared_text_carries_arguments() {
        for text in ["DECIMAL(10, 2)", "NUMERIC(8)", "CHAR(3)", "VARBINARY", "INTEGER"] {
            assert_eq!(DataType::parse(text).to_sql(), text);
        }
        assert_eq!(DataType::Varchar(Some(20)).keyword(), "VARCHAR");
    }

    #[test]
    fn data_type_serde_uses_declared_text() {
        let dt: DataType = serde_json::from_str("\"varchar(12)\"").unwrap();
        assert_eq!(dt, DataType::Varchar(Some(12)));
        assert_eq!(serde_json::to_string(&dt).unwrap(), "\"VARCHAR(12)\"");
    }

    #[test]
    fn default_normalization_strips_outer_parens() {
        let reported = DefaultValue::Expression("((12))".into());
        assert_eq!(reported.normalized(), "12");
        assert!(reported.same_as(&DefaultValue::Integer(12)));

        let call = DefaultValue::Expression("(now()) + (1)".into());
        assert_eq!(call.normalized(), "(now()) + (1)");
    }

    #[test]
    fn default_serde_shapes() {
        let d: DefaultValue = serde_json::from_str("12").unwrap();
        assert_eq!(d, DefaultValue::Integer(12));
        let d: DefaultValue = serde_json::from_str("\"CURRENT_TIMESTAMP\"").unwrap();
        assert_eq!(d, DefaultValue::Expression("CURRENT_TIMESTAMP".into()));
        let d: DefaultValue = serde_json::from_str("{\"string\": \"it's\"}").unwrap();
        assert_eq!(d.to_sql(), "'it''s'");
        let d: DefaultValue = serde_json::from_str("true").unwrap();
        assert_eq!(d, DefaultValue::Boolean(true));
    }

    #[test]
    fn zero_values() {
        assert_eq!(DataType::Integer.zero_value(), Some(DefaultValue::Integer(0)));
        assert_eq!(
            DataType::Varchar(Some(3)).zero_value(),
            Some(DefaultValue::String(String::new()))
        );
        assert_eq!(DataType::Blob.zero_value(), None);
    }
}
