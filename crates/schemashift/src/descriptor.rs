//! Structural snapshots of tables and databases.
//!
//! Descriptors are immutable values produced by an external analysis
//! step. Snapshot JSON is accepted in snake_case or in the camelCase
//! shape emitted by the analysers (`pureName`, `columnName`, `notNull`,
//! `pairingId`, ...). Unknown fields are discarded here and never reach
//! the engine.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::identity::{assign_pairing_id, PairingId, PairingIdSource, Paired};
use crate::types::{DataType, DefaultValue, ForeignKeyAction};

/// A possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    /// Schema, if qualified.
    #[serde(default, alias = "schemaName", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Unqualified name.
    #[serde(alias = "pureName")]
    pub name: String,
}

impl TableName {
    /// An unqualified table name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// A schema-qualified table name.
    #[must_use]
    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Same schema, different unqualified name.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            schema: self.schema.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    #[serde(alias = "columnName")]
    pub name: String,
    /// Zero-based position; dense within the owning table.
    #[serde(default)]
    pub ordinal: usize,
    /// Declared type.
    #[serde(alias = "dataType")]
    pub data_type: DataType,
    /// Whether the column rejects NULL.
    #[serde(default, alias = "notNull")]
    pub not_null: bool,
    /// Default value, if any.
    #[serde(default, alias = "defaultValue", skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Name of the constraint holding the default (SQL Server).
    #[serde(
        default,
        alias = "defaultConstraint",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_constraint: Option<String>,
    /// Whether the column auto-increments.
    #[serde(default, alias = "autoIncrement")]
    pub auto_increment: bool,
    /// Stable identity.
    #[serde(default, alias = "pairingId", skip_serializing_if = "Option::is_none")]
    pub pairing_id: Option<PairingId>,
}

impl ColumnDescriptor {
    /// A nullable column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            ordinal: 0,
            data_type,
            not_null: false,
            default: None,
            default_constraint: None,
            auto_increment: false,
            pairing_id: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Marks the column auto-incrementing.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the pairing id.
    #[must_use]
    pub fn paired(mut self, id: impl Into<String>) -> Self {
        self.pairing_id = Some(PairingId::new(id));
        self
    }
}

impl Paired for ColumnDescriptor {
    fn pairing_id(&self) -> Option<&PairingId> {
        self.pairing_id.as_ref()
    }

    fn pairing_id_mut(&mut self) -> &mut Option<PairingId> {
        &mut self.pairing_id
    }

    fn fallback_key(&self) -> String {
        self.name.clone()
    }
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    #[serde(alias = "constraintName")]
    pub name: String,
    /// Participating columns, in key order.
    #[serde(deserialize_with = "column_refs")]
    pub columns: Vec<String>,
    /// Whether this is a UNIQUE index.
    #[serde(default, alias = "isUnique")]
    pub unique: bool,
    /// Stable identity.
    #[serde(default, alias = "pairingId", skip_serializing_if = "Option::is_none")]
    pub pairing_id: Option<PairingId>,
}

impl IndexDescriptor {
    /// A non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique: false,
            pairing_id: None,
        }
    }

    /// Marks the index UNIQUE.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the pairing id.
    #[must_use]
    pub fn paired(mut self, id: impl Into<String>) -> Self {
        self.pairing_id = Some(PairingId::new(id));
        self
    }
}

impl Paired for IndexDescriptor {
    fn pairing_id(&self) -> Option<&PairingId> {
        self.pairing_id.as_ref()
    }

    fn pairing_id_mut(&mut self) -> &mut Option<PairingId> {
        &mut self.pairing_id
    }

    fn fallback_key(&self) -> String {
        self.name.clone()
    }
}

/// What a constraint enforces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Primary key.
    #[serde(alias = "primaryKey")]
    PrimaryKey,
    /// Unique constraint.
    Unique,
    /// Foreign key.
    #[serde(alias = "foreignKey")]
    ForeignKey {
        /// Referenced table.
        #[serde(alias = "refTable")]
        ref_table: TableName,
        /// Referenced columns, parallel to the constraint's columns.
        #[serde(alias = "refColumns")]
        ref_columns: Vec<String>,
        /// ON DELETE action.
        #[serde(default, alias = "deleteAction", skip_serializing_if = "Option::is_none")]
        on_delete: Option<ForeignKeyAction>,
        /// ON UPDATE action.
        #[serde(default, alias = "updateAction", skip_serializing_if = "Option::is_none")]
        on_update: Option<ForeignKeyAction>,
    },
    /// Check constraint.
    Check {
        /// Boolean expression.
        expression: String,
    },
}

impl ConstraintKind {
    /// Short label used in keys and messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "primary key",
            Self::Unique => "unique",
            Self::ForeignKey { .. } => "foreign key",
            Self::Check { .. } => "check",
        }
    }
}

/// A table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDescriptor {
    /// Constraint name; engines such as SQLite leave it unnamed.
    #[serde(default, alias = "constraintName", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Constraint kind and kind-specific data.
    #[serde(flatten)]
    pub kind: ConstraintKind,
    /// Participating columns, in order.
    #[serde(default, deserialize_with = "column_refs")]
    pub columns: Vec<String>,
    /// Stable identity.
    #[serde(default, alias = "pairingId", skip_serializing_if = "Option::is_none")]
    pub pairing_id: Option<PairingId>,
}

impl ConstraintDescriptor {
    fn new(name: Option<&str>, kind: ConstraintKind, columns: &[&str]) -> Self {
        Self {
            name: name.map(str::to_string),
            kind,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            pairing_id: None,
        }
    }

    /// A primary key.
    #[must_use]
    pub fn primary_key(name: Option<&str>, columns: &[&str]) -> Self {
        Self::new(name, ConstraintKind::PrimaryKey, columns)
    }

    /// A unique constraint.
    #[must_use]
    pub fn unique(name: Option<&str>, columns: &[&str]) -> Self {
        Self::new(name, ConstraintKind::Unique, columns)
    }

    /// A foreign key to `ref_table(ref_columns)`.
    #[must_use]
    pub fn foreign_key(
        name: Option<&str>,
        columns: &[&str],
        ref_table: TableName,
        ref_columns: &[&str],
    ) -> Self {
        Self::new(
            name,
            ConstraintKind::ForeignKey {
                ref_table,
                ref_columns: ref_columns.iter().map(|c| (*c).to_string()).collect(),
                on_delete: None,
                on_update: None,
            },
            columns,
        )
    }

    /// A check constraint.
    #[must_use]
    pub fn check(name: Option<&str>, expression: impl Into<String>) -> Self {
        Self::new(
            name,
            ConstraintKind::Check {
                expression: expression.into(),
            },
            &[],
        )
    }

    /// Sets the pairing id.
    #[must_use]
    pub fn paired(mut self, id: impl Into<String>) -> Self {
        self.pairing_id = Some(PairingId::new(id));
        self
    }

    /// Returns `true` for foreign keys.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        matches!(self.kind, ConstraintKind::ForeignKey { .. })
    }

    /// Returns `true` if the constraint references `column` of its own table.
    #[must_use]
    pub fn uses_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

impl Paired for ConstraintDescriptor {
    fn pairing_id(&self) -> Option<&PairingId> {
        self.pairing_id.as_ref()
    }

    fn pairing_id_mut(&mut self) -> &mut Option<PairingId> {
        &mut self.pairing_id
    }

    fn fallback_key(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}({})", self.kind.label(), self.columns.join(",")),
        }
    }
}

/// A table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name.
    #[serde(flatten)]
    pub name: TableName,
    /// Columns in ordinal order.
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Constraints.
    #[serde(default)]
    pub constraints: Vec<ConstraintDescriptor>,
    /// Stable identity.
    #[serde(default, alias = "pairingId", skip_serializing_if = "Option::is_none")]
    pub pairing_id: Option<PairingId>,
}

impl TableDescriptor {
    /// An empty table.
    #[must_use]
    pub const fn new(name: TableName) -> Self {
        Self {
            name,
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
            pairing_id: None,
        }
    }

    /// Parses a table snapshot from JSON, renumbering ordinals.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut table: Self = serde_json::from_str(json)?;
        table.renumber();
        Ok(table)
    }

    /// Appends a column, assigning its ordinal.
    #[must_use]
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self.renumber();
        self
    }

    /// Appends an index.
    #[must_use]
    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    /// Appends a constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: ConstraintDescriptor) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Sets the pairing id.
    #[must_use]
    pub fn paired(mut self, id: impl Into<String>) -> Self {
        self.pairing_id = Some(PairingId::new(id));
        self
    }

    /// Re-establishes dense ordinals from column order.
    pub fn renumber(&mut self) {
        for (ordinal, column) in self.columns.iter_mut().enumerate() {
            column.ordinal = ordinal;
        }
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary key constraint, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&ConstraintDescriptor> {
        self.constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
    }

    /// Foreign keys declared on this table.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ConstraintDescriptor> {
        self.constraints.iter().filter(|c| c.is_foreign_key())
    }

    /// Returns `true` if `column` is the sole primary key column.
    #[must_use]
    pub fn is_single_primary_key(&self, column: &str) -> bool {
        self.primary_key()
            .is_some_and(|pk| pk.columns.len() == 1 && pk.columns[0] == column)
    }
}

impl Paired for TableDescriptor {
    fn pairing_id(&self) -> Option<&PairingId> {
        self.pairing_id.as_ref()
    }

    fn pairing_id_mut(&mut self) -> &mut Option<PairingId> {
        &mut self.pairing_id
    }

    fn fallback_key(&self) -> String {
        self.name.to_string()
    }
}

/// A database: the context in which cross-table references resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    /// Tables.
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,
}

impl DatabaseDescriptor {
    /// A database holding `tables`.
    #[must_use]
    pub const fn new(tables: Vec<TableDescriptor>) -> Self {
        Self { tables }
    }

    /// Parses a database snapshot from JSON, renumbering ordinals.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut db: Self = serde_json::from_str(json)?;
        for table in &mut db.tables {
            table.renumber();
        }
        Ok(db)
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn find_table(&self, name: &TableName) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| &t.name == name)
    }

    /// Foreign keys on *other* tables that reference `target`.
    pub fn referencing_foreign_keys<'a>(
        &'a self,
        target: &'a TableName,
    ) -> impl Iterator<Item = (&'a TableDescriptor, &'a ConstraintDescriptor)> + 'a {
        self.tables
            .iter()
            .filter(move |t| &t.name != target)
            .flat_map(|t| t.foreign_keys().map(move |fk| (t, fk)))
            .filter(move |(_, fk)| match &fk.kind {
                ConstraintKind::ForeignKey { ref_table, .. } => ref_table == target,
                _ => false,
            })
    }

    /// Mints pairing ids for every table, column, index and constraint
    /// that lacks one.
    pub fn assign_pairing_ids(&mut self, source: &mut impl PairingIdSource) {
        for table in &mut self.tables {
            assign_pairing_id(table, source);
            for column in &mut table.columns {
                assign_pairing_id(column, source);
            }
            for index in &mut table.indexes {
                assign_pairing_id(index, source);
            }
            for constraint in &mut table.constraints {
                assign_pairing_id(constraint, source);
            }
        }
    }
}

/// Column lists arrive either as names or as `{"columnName": ...}` objects.
fn column_refs<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ColumnRef {
        Name(String),
        Object {
            #[serde(alias = "columnName")]
            name: String,
        },
    }

    let refs = Vec::<ColumnRef>::deserialize(deserializer)?;
    Ok(refs
        .into_iter()
        .map(|r| match r {
            ColumnRef::Name(name) | ColumnRef::Object { name } => name,
        })
        .collect())
}
