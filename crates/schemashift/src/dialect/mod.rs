//! Dialect capabilities and SQL rendering.
//!
//! Every supported engine is described twice: once as pure data
//! ([`DialectCapabilities`], consulted by the planner) and once as a
//! [`SqlRenderer`] that turns abstract operations into statement text.
//! The planning algorithm itself is shared by all dialects.

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::SqlServerRenderer;
pub use mysql::MySqlRenderer;
pub use postgres::PostgresRenderer;
pub use sqlite::SqliteRenderer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::descriptor::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, IndexDescriptor, TableDescriptor,
    TableName,
};
use crate::error::RenderError;
use crate::identity::Paired;
use crate::operation::{
    AlterColumnOp, AlterOperation, ConstraintOp, CopyExpr, FillNullsOp, IndexOp, RebuildTableOp,
    RenameColumnOp, RenameTableOp,
};
use crate::types::{DataType, DefaultValue};

// ================================================================
// Capability model
// ================================================================

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// PostgreSQL.
    #[serde(alias = "postgresql", alias = "postgre")]
    Postgres,
    /// MySQL / MariaDB.
    #[serde(rename = "mysql", alias = "mariadb")]
    MySql,
    /// Microsoft SQL Server.
    #[serde(rename = "mssql", alias = "sqlserver")]
    SqlServer,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Self; 4] = [Self::Postgres, Self::MySql, Self::SqlServer, Self::Sqlite];

    /// Engine identifier.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::SqlServer => "mssql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Capability flags of the engine.
    #[must_use]
    pub fn capabilities(self) -> &'static DialectCapabilities {
        match self {
            Self::Postgres => &POSTGRES,
            Self::MySql => &MYSQL,
            Self::SqlServer => &SQL_SERVER,
            Self::Sqlite => &SQLITE,
        }
    }

    /// Statement renderer of the engine.
    #[must_use]
    pub fn renderer(self) -> &'static dyn SqlRenderer {
        match self {
            Self::Postgres => &PostgresRenderer,
            Self::MySql => &MySqlRenderer,
            Self::SqlServer => &SqlServerRenderer,
            Self::Sqlite => &SqliteRenderer,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown engine identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown dialect: {0}")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "postgre" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "mssql" | "sqlserver" | "sql server" => Ok(Self::SqlServer),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

/// Kind of abstract operation, as checked against capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// CREATE TABLE.
    CreateTable,
    /// DROP TABLE.
    DropTable,
    /// Table rename.
    RenameTable,
    /// Nullable column, or column with a default.
    AddColumn,
    /// NOT NULL column without a default.
    AddNotNullColumn,
    /// Auto-increment column.
    AddAutoIncrementColumn,
    /// DROP COLUMN.
    DropColumn,
    /// Column rename.
    RenameColumn,
    /// Column type change.
    AlterColumnType,
    /// Column NOT NULL change.
    AlterColumnNullability,
    /// Column default change.
    AlterColumnDefault,
    /// Column auto-increment change.
    AlterColumnAutoIncrement,
    /// UPDATE replacing NULLs ahead of a NOT NULL change.
    FillNulls,
    /// CREATE INDEX.
    AddIndex,
    /// DROP INDEX.
    DropIndex,
    /// ADD CONSTRAINT (including foreign keys).
    AddConstraint,
    /// DROP CONSTRAINT (including foreign keys).
    DropConstraint,
    /// Table rebuild.
    RebuildTable,
}

/// How several operations on one table may share a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// One statement per operation.
    None,
    /// Operations of the same kind only (`ADD a int, b int`).
    SameKind,
    /// Any batchable operations (`ADD COLUMN a int, DROP COLUMN b`).
    Mixed,
}

/// How an in-place column change is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAlterStyle {
    /// Type, nullability and default change independently.
    Separate,
    /// Type and nullability are restated together; default separately.
    TypeWithNullability,
    /// Every change restates the full column definition.
    FullDefinition,
}

/// How column defaults are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultStyle {
    /// `DEFAULT x` is an attribute of the column.
    Inline,
    /// Defaults are named constraints that must be dropped before their
    /// column can be dropped or retyped.
    NamedConstraint,
}

/// How auto-increment columns are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoIncrementStyle {
    /// The type is replaced by `SMALLSERIAL`/`SERIAL`/`BIGSERIAL`.
    Serial,
    /// A keyword follows the type.
    Keyword(&'static str),
    /// Only an `INTEGER PRIMARY KEY AUTOINCREMENT` column auto-increments.
    InlinePrimaryKey,
}

/// Identifier quoting characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdentifierQuote {
    /// Opening character.
    pub open: char,
    /// Closing character; doubled when it occurs inside an identifier.
    pub close: char,
}

/// Capability flags and textual conventions of one engine.
///
/// Pure configuration data. Custom instances may be passed to the
/// planner to model engine versions with other capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialectCapabilities {
    /// Engine the flags describe.
    pub dialect: Dialect,
    /// `ADD COLUMN`.
    pub add_column: bool,
    /// `ADD COLUMN ... NOT NULL` without a default.
    pub add_not_null_column_without_default: bool,
    /// Adding an auto-increment column.
    pub add_auto_increment_column: bool,
    /// `DROP COLUMN`.
    pub drop_column: bool,
    /// Column rename.
    pub rename_column: bool,
    /// Table rename.
    pub rename_table: bool,
    /// Column type change.
    pub alter_column_type: bool,
    /// Column NOT NULL change.
    pub alter_nullability: bool,
    /// Column default change.
    pub alter_default: bool,
    /// Column auto-increment change.
    pub alter_auto_increment: bool,
    /// `CREATE INDEX`.
    pub add_index: bool,
    /// `DROP INDEX`.
    pub drop_index: bool,
    /// `ADD CONSTRAINT`.
    pub add_constraint: bool,
    /// `DROP CONSTRAINT`.
    pub drop_constraint: bool,
    /// Table rebuild through a shadow table.
    pub rebuild: bool,
    /// A column rename invalidates indexes and constraints using it.
    pub rename_breaks_dependents: bool,
    /// Constraint names are scoped to their table, so a shadow table may
    /// declare them while the original still exists.
    pub constraint_names_per_table: bool,
    /// Statement batching.
    pub batching: BatchMode,
    /// Operation kinds eligible for batching.
    pub batchable: &'static [OperationKind],
    /// Column alteration syntax.
    pub column_alter_style: ColumnAlterStyle,
    /// Column default syntax.
    pub default_style: DefaultStyle,
    /// Auto-increment syntax.
    pub auto_increment: AutoIncrementStyle,
    /// Identifier quoting.
    pub quote: IdentifierQuote,
    /// Longest accepted identifier, in bytes.
    pub max_identifier_length: Option<usize>,
}

impl DialectCapabilities {
    /// Returns `true` if the engine can express `kind` without a rebuild.
    #[must_use]
    pub fn supports(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::CreateTable | OperationKind::DropTable | OperationKind::FillNulls => {
                true
            }
            OperationKind::RenameTable => self.rename_table,
            OperationKind::AddColumn => self.add_column,
            OperationKind::AddNotNullColumn => {
                self.add_column && self.add_not_null_column_without_default
            }
            OperationKind::AddAutoIncrementColumn => {
                self.add_column && self.add_auto_increment_column
            }
            OperationKind::DropColumn => self.drop_column,
            OperationKind::RenameColumn => self.rename_column,
            OperationKind::AlterColumnType => self.alter_column_type,
            OperationKind::AlterColumnNullability => self.alter_nullability,
            OperationKind::AlterColumnDefault => self.alter_default,
            OperationKind::AlterColumnAutoIncrement => self.alter_auto_increment,
            OperationKind::AddIndex => self.add_index,
            OperationKind::DropIndex => self.drop_index,
            OperationKind::AddConstraint => self.add_constraint,
            OperationKind::DropConstraint => self.drop_constraint,
            OperationKind::RebuildTable => self.rebuild,
        }
    }

    /// Returns `true` if `kind` can only be achieved by rebuilding the
    /// table.
    #[must_use]
    pub fn requires_rebuild_for(&self, kind: OperationKind) -> bool {
        kind != OperationKind::RebuildTable && !self.supports(kind)
    }

    /// Returns `true` if several operations may share one statement.
    #[must_use]
    pub fn supports_multiple_operations_per_statement(&self) -> bool {
        self.batching != BatchMode::None && !self.batchable.is_empty()
    }

    /// Returns `true` if `kind` may take part in a batch.
    #[must_use]
    pub fn can_batch(&self, kind: OperationKind) -> bool {
        self.batching != BatchMode::None && self.batchable.contains(&kind)
    }

    /// Foreign keys must be declared in `CREATE TABLE`.
    #[must_use]
    pub fn inline_foreign_keys(&self) -> bool {
        !self.add_constraint
    }
}

const ALTER_TABLE_CLAUSES: &[OperationKind] = &[
    OperationKind::AddColumn,
    OperationKind::DropColumn,
    OperationKind::AlterColumnType,
    OperationKind::AlterColumnNullability,
    OperationKind::AlterColumnDefault,
    OperationKind::AddConstraint,
    OperationKind::DropConstraint,
];

/// PostgreSQL.
pub const POSTGRES: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::Postgres,
    add_column: true,
    add_not_null_column_without_default: true,
    add_auto_increment_column: true,
    drop_column: true,
    rename_column: true,
    rename_table: true,
    alter_column_type: true,
    alter_nullability: true,
    alter_default: true,
    alter_auto_increment: false,
    add_index: true,
    drop_index: true,
    add_constraint: true,
    drop_constraint: true,
    rebuild: true,
    rename_breaks_dependents: false,
    constraint_names_per_table: false,
    batching: BatchMode::Mixed,
    batchable: ALTER_TABLE_CLAUSES,
    column_alter_style: ColumnAlterStyle::Separate,
    default_style: DefaultStyle::Inline,
    auto_increment: AutoIncrementStyle::Serial,
    quote: IdentifierQuote {
        open: '"',
        close: '"',
    },
    max_identifier_length: Some(63),
};

/// MySQL.
pub const MYSQL: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::MySql,
    add_column: true,
    add_not_null_column_without_default: true,
    add_auto_increment_column: false,
    drop_column: true,
    rename_column: true,
    rename_table: true,
    alter_column_type: true,
    alter_nullability: true,
    alter_default: true,
    alter_auto_increment: true,
    add_index: true,
    drop_index: true,
    add_constraint: true,
    drop_constraint: true,
    rebuild: true,
    rename_breaks_dependents: false,
    constraint_names_per_table: true,
    batching: BatchMode::Mixed,
    batchable: ALTER_TABLE_CLAUSES,
    column_alter_style: ColumnAlterStyle::FullDefinition,
    default_style: DefaultStyle::Inline,
    auto_increment: AutoIncrementStyle::Keyword("AUTO_INCREMENT"),
    quote: IdentifierQuote {
        open: '`',
        close: '`',
    },
    max_identifier_length: Some(64),
};

/// Microsoft SQL Server.
pub const SQL_SERVER: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::SqlServer,
    add_column: true,
    add_not_null_column_without_default: true,
    add_auto_increment_column: true,
    drop_column: true,
    rename_column: true,
    rename_table: true,
    alter_column_type: true,
    alter_nullability: true,
    alter_default: true,
    alter_auto_increment: false,
    add_index: true,
    drop_index: true,
    add_constraint: true,
    drop_constraint: true,
    rebuild: true,
    rename_breaks_dependents: false,
    constraint_names_per_table: false,
    batching: BatchMode::SameKind,
    batchable: &[
        OperationKind::AddColumn,
        OperationKind::DropColumn,
        OperationKind::DropConstraint,
    ],
    column_alter_style: ColumnAlterStyle::TypeWithNullability,
    default_style: DefaultStyle::NamedConstraint,
    auto_increment: AutoIncrementStyle::Keyword("IDENTITY(1,1)"),
    quote: IdentifierQuote {
        open: '[',
        close: ']',
    },
    max_identifier_length: Some(128),
};

/// SQLite.
pub const SQLITE: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::Sqlite,
    add_column: true,
    add_not_null_column_without_default: false,
    add_auto_increment_column: false,
    drop_column: true,
    rename_column: true,
    rename_table: true,
    alter_column_type: false,
    alter_nullability: false,
    alter_default: false,
    alter_auto_increment: false,
    add_index: true,
    drop_index: true,
    add_constraint: false,
    drop_constraint: false,
    rebuild: true,
    rename_breaks_dependents: false,
    constraint_names_per_table: true,
    batching: BatchMode::None,
    batchable: &[],
    column_alter_style: ColumnAlterStyle::Separate,
    default_style: DefaultStyle::Inline,
    auto_increment: AutoIncrementStyle::InlinePrimaryKey,
    quote: IdentifierQuote {
        open: '"',
        close: '"',
    },
    max_identifier_length: None,
};

// ================================================================
// Rendering
// ================================================================

/// Dialect-specific statement synthesis.
///
/// Default methods implement the ANSI-ish syntax shared by most engines;
/// each dialect overrides what differs. Rendering is deterministic and
/// never touches a database.
pub trait SqlRenderer: Sync {
    /// The engine this renderer targets.
    fn dialect(&self) -> Dialect;

    /// Capability flags of the engine.
    fn capabilities(&self) -> &'static DialectCapabilities {
        self.dialect().capabilities()
    }

    /// Maps a `DataType` to the dialect-specific SQL type.
    fn map_data_type(&self, dt: &DataType) -> String {
        dt.to_sql()
    }

    /// Renders a default value.
    fn render_default(&self, default: &DefaultValue) -> String {
        default.to_sql()
    }

    /// Quotes an identifier, rejecting names the engine cannot store.
    fn quote_identifier(&self, name: &str) -> Result<String, RenderError> {
        let caps = self.capabilities();
        if name.is_empty() {
            return Err(RenderError::new(name, "identifier is empty"));
        }
        if name.contains('\0') {
            return Err(RenderError::new(name, "identifier contains a NUL byte"));
        }
        if let Some(max) = caps.max_identifier_length {
            if name.len() > max {
                return Err(RenderError::new(
                    name,
                    format!("identifier exceeds {max} bytes"),
                ));
            }
        }
        let IdentifierQuote { open, close } = caps.quote;
        let escaped = name.replace(close, &format!("{close}{close}"));
        Ok(format!("{open}{escaped}{close}"))
    }

    /// Quotes a possibly schema-qualified table name.
    fn quote_table(&self, table: &TableName) -> Result<String, RenderError> {
        match &table.schema {
            Some(schema) => Ok(format!(
                "{}.{}",
                self.quote_identifier(schema)?,
                self.quote_identifier(&table.name)?
            )),
            None => self.quote_identifier(&table.name),
        }
    }

    /// Quotes a comma-separated column list.
    fn quote_list(&self, names: &[String]) -> Result<String, RenderError> {
        let quoted = names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(quoted.join(", "))
    }

    /// Type as declared in a column definition, honouring auto-increment.
    fn column_type(&self, col: &ColumnDescriptor) -> String {
        self.map_data_type(&col.data_type)
    }

    /// Renders a column definition. `table` is used to name default
    /// constraints on engines that need one.
    fn column_definition(
        &self,
        _table: &TableName,
        col: &ColumnDescriptor,
    ) -> Result<String, RenderError> {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&col.name)?,
            self.column_type(col)
        );
        if col.not_null {
            sql.push_str(" NOT NULL");
        }
        if col.auto_increment {
            if let AutoIncrementStyle::Keyword(keyword) = self.capabilities().auto_increment {
                sql.push(' ');
                sql.push_str(keyword);
            }
        }
        if let Some(ref default) = col.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }
        Ok(sql)
    }

    /// Renders a constraint as it appears in `CREATE TABLE` or after
    /// `ADD`.
    fn constraint_definition(&self, c: &ConstraintDescriptor) -> Result<String, RenderError> {
        let mut sql = String::new();
        if let Some(ref name) = c.name {
            sql.push_str(&format!("CONSTRAINT {} ", self.quote_identifier(name)?));
        }
        match &c.kind {
            ConstraintKind::PrimaryKey => {
                sql.push_str(&format!("PRIMARY KEY ({})", self.quote_list(&c.columns)?));
            }
            ConstraintKind::Unique => {
                sql.push_str(&format!("UNIQUE ({})", self.quote_list(&c.columns)?));
            }
            ConstraintKind::ForeignKey {
                ref_table,
                ref_columns,
                on_delete,
                on_update,
            } => {
                sql.push_str(&format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.quote_list(&c.columns)?,
                    self.quote_table(ref_table)?,
                    self.quote_list(ref_columns)?
                ));
                if let Some(action) = on_delete {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(action.as_sql());
                }
                if let Some(action) = on_update {
                    sql.push_str(" ON UPDATE ");
                    sql.push_str(action.as_sql());
                }
            }
            ConstraintKind::Check { expression } => {
                sql.push_str(&format!("CHECK ({expression})"));
            }
        }
        Ok(sql)
    }

    /// Renders one operation. Most operations yield one statement; some
    /// (defaults on SQL Server, rebuilds) yield several.
    fn render_operation(&self, op: &AlterOperation) -> Result<Vec<String>, RenderError> {
        match op {
            AlterOperation::CreateTable(table) => {
                let inline_fks = self.capabilities().inline_foreign_keys();
                Ok(vec![self.create_table(&table.name, table, inline_fks, true)?])
            }
            AlterOperation::DropTable(table) => {
                Ok(vec![format!("DROP TABLE {}", self.quote_table(table)?)])
            }
            AlterOperation::RenameTable(op) => self.rename_table(op),
            AlterOperation::RenameColumn(op) => self.rename_column(op),
            AlterOperation::AddIndex(op) => Ok(vec![self.create_index(op)?]),
            AlterOperation::DropIndex(op) => Ok(vec![self.drop_index(op)?]),
            AlterOperation::RebuildTable(op) => self.rebuild_table(op),
            AlterOperation::FillNulls(op) => Ok(vec![self.fill_nulls(op)?]),
            AlterOperation::AddColumn(_)
            | AlterOperation::DropColumn(_)
            | AlterOperation::AlterColumnType(_)
            | AlterOperation::AlterColumnNullability(_)
            | AlterOperation::AlterColumnDefault(_)
            | AlterOperation::AddConstraint(_)
            | AlterOperation::DropConstraint(_) => {
                let table = self.quote_table(op.table())?;
                Ok(self
                    .alter_clauses(op)?
                    .into_iter()
                    .map(|clause| format!("ALTER TABLE {table} {clause}"))
                    .collect())
            }
        }
    }

    /// Renders operations on one table as a single statement.
    fn render_batch(
        &self,
        table: &TableName,
        ops: &[AlterOperation],
    ) -> Result<Vec<String>, RenderError> {
        let mut clauses = Vec::new();
        for op in ops {
            clauses.extend(self.alter_clauses(op)?);
        }
        Ok(vec![format!(
            "ALTER TABLE {} {}",
            self.quote_table(table)?,
            clauses.join(", ")
        )])
    }

    /// `ALTER TABLE` clauses (without the `ALTER TABLE t` prefix) of an
    /// in-place operation.
    fn alter_clauses(&self, op: &AlterOperation) -> Result<Vec<String>, RenderError> {
        match op {
            AlterOperation::AddColumn(op) => Ok(vec![format!(
                "ADD COLUMN {}",
                self.column_definition(&op.table, &op.column)?
            )]),
            AlterOperation::DropColumn(op) => Ok(vec![format!(
                "DROP COLUMN {}",
                self.quote_identifier(&op.column.name)?
            )]),
            AlterOperation::AlterColumnType(op) => self.alter_column_type(op),
            AlterOperation::AlterColumnNullability(op) => self.alter_column_nullability(op),
            AlterOperation::AlterColumnDefault(op) => self.alter_column_default(op),
            AlterOperation::AddConstraint(op) => Ok(vec![format!(
                "ADD {}",
                self.constraint_definition(&op.constraint)?
            )]),
            AlterOperation::DropConstraint(op) => Ok(vec![self.drop_constraint_clause(op)?]),
            other => Err(RenderError::new(
                other.table().to_string(),
                format!("{:?} is not an ALTER TABLE clause", other.kind()),
            )),
        }
    }

    /// Clauses changing a column's type.
    fn alter_column_type(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        let column = self.quote_identifier(&op.after.name)?;
        let data_type = self.map_data_type(&op.after.data_type);
        Ok(vec![format!(
            "ALTER COLUMN {column} TYPE {data_type} USING {column}::{data_type}"
        )])
    }

    /// Clauses changing a column's NOT NULL flag.
    fn alter_column_nullability(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        let column = self.quote_identifier(&op.after.name)?;
        let action = if op.after.not_null { "SET" } else { "DROP" };
        Ok(vec![format!("ALTER COLUMN {column} {action} NOT NULL")])
    }

    /// Clauses changing a column's default.
    fn alter_column_default(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        let column = self.quote_identifier(&op.after.name)?;
        Ok(vec![match &op.after.default {
            Some(default) => format!(
                "ALTER COLUMN {column} SET DEFAULT {}",
                self.render_default(default)
            ),
            None => format!("ALTER COLUMN {column} DROP DEFAULT"),
        }])
    }

    /// `UPDATE` writing a value over the NULLs of one column.
    fn fill_nulls(&self, op: &FillNullsOp) -> Result<String, RenderError> {
        let column = self.quote_identifier(&op.column)?;
        Ok(format!(
            "UPDATE {} SET {column} = {} WHERE {column} IS NULL",
            self.quote_table(&op.table)?,
            self.render_default(&op.value)
        ))
    }

    /// Clause dropping a constraint.
    fn drop_constraint_clause(&self, op: &ConstraintOp) -> Result<String, RenderError> {
        Ok(format!(
            "DROP CONSTRAINT {}",
            self.quote_identifier(constraint_name(op)?)?
        ))
    }

    /// `CREATE TABLE name (...)` for `shape`. Indexes are not included.
    /// `constraints` controls whether non-foreign-key constraints are
    /// declared inline.
    fn create_table(
        &self,
        name: &TableName,
        shape: &TableDescriptor,
        foreign_keys: bool,
        constraints: bool,
    ) -> Result<String, RenderError> {
        let mut defs = shape
            .columns
            .iter()
            .map(|c| self.column_definition(name, c))
            .collect::<Result<Vec<_>, _>>()?;
        for c in &shape.constraints {
            let wanted = if c.is_foreign_key() {
                foreign_keys
            } else {
                constraints && !self.is_implied_by_column(shape, c)
            };
            if wanted {
                defs.push(self.constraint_definition(c)?);
            }
        }
        let body: Vec<String> = defs.iter().map(|d| format!("    {d}")).collect();
        Ok(format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_table(name)?,
            body.join(",\n")
        ))
    }

    /// Returns `true` when a column definition already declares `c`.
    fn is_implied_by_column(&self, _shape: &TableDescriptor, _c: &ConstraintDescriptor) -> bool {
        false
    }

    /// Statements renaming a table.
    fn rename_table(&self, op: &RenameTableOp) -> Result<Vec<String>, RenderError> {
        Ok(vec![format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_table(&op.from)?,
            self.quote_identifier(&op.to.name)?
        )])
    }

    /// Statements renaming a column.
    fn rename_column(&self, op: &RenameColumnOp) -> Result<Vec<String>, RenderError> {
        Ok(vec![format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_table(&op.table)?,
            self.quote_identifier(&op.from)?,
            self.quote_identifier(&op.to)?
        )])
    }

    /// `CREATE INDEX`.
    fn create_index(&self, op: &IndexOp) -> Result<String, RenderError> {
        let IndexDescriptor {
            name,
            columns,
            unique,
            ..
        } = &op.index;
        Ok(format!(
            "CREATE {}INDEX {} ON {} ({})",
            if *unique { "UNIQUE " } else { "" },
            self.quote_identifier(name)?,
            self.quote_table(&op.table)?,
            self.quote_list(columns)?
        ))
    }

    /// `DROP INDEX`.
    fn drop_index(&self, op: &IndexOp) -> Result<String, RenderError> {
        let index = self.quote_identifier(&op.index.name)?;
        Ok(match &op.table.schema {
            Some(schema) => format!("DROP INDEX {}.{index}", self.quote_identifier(schema)?),
            None => format!("DROP INDEX {index}"),
        })
    }

    /// `INSERT INTO shadow ... SELECT ... FROM original` of a rebuild.
    fn copy_rows(&self, op: &RebuildTableOp) -> Result<Vec<String>, RenderError> {
        insert_select(self, op)
    }

    /// Every statement of a table rebuild.
    fn rebuild_table(&self, op: &RebuildTableOp) -> Result<Vec<String>, RenderError> {
        let caps = self.capabilities();
        let inline_fks = caps.inline_foreign_keys();
        let inline_constraints = caps.constraint_names_per_table || !caps.add_constraint;

        let mut statements = vec![self.create_table(
            &op.shadow,
            &op.shape,
            inline_fks,
            inline_constraints,
        )?];
        statements.extend(self.copy_rows(op)?);
        statements.push(format!("DROP TABLE {}", self.quote_table(&op.table)?));
        statements.extend(self.rename_table(&RenameTableOp {
            from: op.shadow.clone(),
            to: op.table.clone(),
        })?);

        let table = self.quote_table(&op.table)?;
        for c in &op.shape.constraints {
            let declared = if c.is_foreign_key() {
                inline_fks
            } else {
                inline_constraints || self.is_implied_by_column(&op.shape, c)
            };
            if !declared {
                statements.push(format!(
                    "ALTER TABLE {table} ADD {}",
                    self.constraint_definition(c)?
                ));
            }
        }
        for index in &op.shape.indexes {
            statements.push(self.create_index(&IndexOp {
                table: op.table.clone(),
                index: index.clone(),
            })?);
        }
        Ok(statements)
    }
}

/// The `INSERT ... SELECT` copying rows into a rebuild's shadow table.
/// Empty when no column is copied.
pub(crate) fn insert_select<R: SqlRenderer + ?Sized>(
    renderer: &R,
    op: &RebuildTableOp,
) -> Result<Vec<String>, RenderError> {
    if op.copy.is_empty() {
        return Ok(Vec::new());
    }
    let mut targets = Vec::with_capacity(op.copy.len());
    let mut values = Vec::with_capacity(op.copy.len());
    for copy in &op.copy {
        targets.push(renderer.quote_identifier(&copy.target)?);
        let mut expr = match &copy.expr {
            CopyExpr::Column(column) => renderer.quote_identifier(column)?,
            CopyExpr::Cast { column, data_type } => format!(
                "CAST({} AS {})",
                renderer.quote_identifier(column)?,
                renderer.map_data_type(data_type)
            ),
            CopyExpr::Literal(value) => renderer.render_default(value),
        };
        if let Some(ref fallback) = copy.fallback {
            expr = format!("COALESCE({expr}, {})", renderer.render_default(fallback));
        }
        values.push(expr);
    }
    Ok(vec![format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        renderer.quote_table(&op.shadow)?,
        targets.join(", "),
        values.join(", "),
        renderer.quote_table(&op.table)?
    )])
}

/// The constraint's name, required to drop it.
pub(crate) fn constraint_name(op: &ConstraintOp) -> Result<&str, RenderError> {
    op.constraint.name.as_deref().ok_or_else(|| {
        RenderError::new(
            op.constraint.fallback_key(),
            "unnamed constraints cannot be dropped",
        )
    })
}

/// Escapes a string literal.
pub(crate) fn string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
