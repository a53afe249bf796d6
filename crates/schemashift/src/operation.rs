//! Abstract DDL operations.
//!
//! Operations are dialect-neutral: the planner produces them, each
//! dialect's [`SqlRenderer`](crate::dialect::SqlRenderer) turns them into
//! statement text. They carry full descriptors rather than bare names so a
//! renderer never has to look anything up.

use serde::Serialize;

use crate::descriptor::{
    ColumnDescriptor, ConstraintDescriptor, IndexDescriptor, TableDescriptor, TableName,
};
use crate::dialect::OperationKind;
use crate::types::{DataType, DefaultValue};

/// One abstract DDL operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum AlterOperation {
    /// Create a table. Indexes and (unless declared inline) foreign keys
    /// are added by separate operations.
    CreateTable(TableDescriptor),
    /// Drop a table.
    DropTable(TableName),
    /// Rename a table.
    RenameTable(RenameTableOp),
    /// Add a column.
    AddColumn(ColumnOp),
    /// Drop a column.
    DropColumn(ColumnOp),
    /// Rename a column.
    RenameColumn(RenameColumnOp),
    /// Change a column's type. Dialects that restate the whole column
    /// definition use this operation for every column alteration.
    AlterColumnType(AlterColumnOp),
    /// Change a column's NOT NULL flag.
    AlterColumnNullability(AlterColumnOp),
    /// Set, replace or drop a column default.
    AlterColumnDefault(AlterColumnOp),
    /// Overwrite NULLs of a column about to become NOT NULL.
    FillNulls(FillNullsOp),
    /// Create an index.
    AddIndex(IndexOp),
    /// Drop an index.
    DropIndex(IndexOp),
    /// Add a constraint.
    AddConstraint(ConstraintOp),
    /// Drop a constraint.
    DropConstraint(ConstraintOp),
    /// Replace the table with a new one of the target shape.
    RebuildTable(RebuildTableOp),
}

impl AlterOperation {
    /// The capability this operation needs.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateTable(_) => OperationKind::CreateTable,
            Self::DropTable(_) => OperationKind::DropTable,
            Self::RenameTable(_) => OperationKind::RenameTable,
            Self::AddColumn(_) => OperationKind::AddColumn,
            Self::DropColumn(_) => OperationKind::DropColumn,
            Self::RenameColumn(_) => OperationKind::RenameColumn,
            Self::AlterColumnType(_) => OperationKind::AlterColumnType,
            Self::AlterColumnNullability(_) => OperationKind::AlterColumnNullability,
            Self::AlterColumnDefault(_) => OperationKind::AlterColumnDefault,
            Self::FillNulls(_) => OperationKind::FillNulls,
            Self::AddIndex(_) => OperationKind::AddIndex,
            Self::DropIndex(_) => OperationKind::DropIndex,
            Self::AddConstraint(_) => OperationKind::AddConstraint,
            Self::DropConstraint(_) => OperationKind::DropConstraint,
            Self::RebuildTable(_) => OperationKind::RebuildTable,
        }
    }

    /// The table the operation's statement is issued against. For a
    /// table rename this is the old name.
    #[must_use]
    pub fn table(&self) -> &TableName {
        match self {
            Self::CreateTable(table) => &table.name,
            Self::DropTable(name) => name,
            Self::RenameTable(op) => &op.from,
            Self::AddColumn(op) | Self::DropColumn(op) => &op.table,
            Self::RenameColumn(op) => &op.table,
            Self::AlterColumnType(op)
            | Self::AlterColumnNullability(op)
            | Self::AlterColumnDefault(op) => &op.table,
            Self::FillNulls(op) => &op.table,
            Self::AddIndex(op) | Self::DropIndex(op) => &op.table,
            Self::AddConstraint(op) | Self::DropConstraint(op) => &op.table,
            Self::RebuildTable(op) => &op.table,
        }
    }
}

/// Rename of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameTableOp {
    /// Current name.
    pub from: TableName,
    /// New name.
    pub to: TableName,
}

/// Column added to or dropped from a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnOp {
    /// Owning table.
    pub table: TableName,
    /// The column (after shape when adding, before shape when dropping).
    pub column: ColumnDescriptor,
}

/// Rename of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameColumnOp {
    /// Owning table.
    pub table: TableName,
    /// Current name.
    pub from: String,
    /// New name.
    pub to: String,
}

/// In-place change of one column. Renames are always issued first, so the
/// statement addresses the column by `after.name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlterColumnOp {
    /// Owning table.
    pub table: TableName,
    /// The column as the before snapshot describes it.
    pub before: ColumnDescriptor,
    /// The column as it must become.
    pub after: ColumnDescriptor,
}

/// `UPDATE t SET c = value WHERE c IS NULL`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillNullsOp {
    /// Owning table.
    pub table: TableName,
    /// Column to fill, by its current name.
    pub column: String,
    /// Value written over NULL.
    pub value: DefaultValue,
}

/// Index created or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexOp {
    /// Owning table.
    pub table: TableName,
    /// The index.
    pub index: IndexDescriptor,
}

/// Constraint added or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintOp {
    /// Owning table.
    pub table: TableName,
    /// The constraint.
    pub constraint: ConstraintDescriptor,
}

/// Full table replacement: create `shadow` with `shape`, copy the rows,
/// drop the original, rename the shadow, recreate indexes (and
/// constraints that could not be declared inline).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildTableOp {
    /// The table being replaced; also its final name.
    pub table: TableName,
    /// Temporary name of the replacement.
    pub shadow: TableName,
    /// Target shape.
    pub shape: TableDescriptor,
    /// How each copied column of the shape is filled. Columns of the shape
    /// without an entry take their default.
    pub copy: Vec<CopyColumn>,
}

/// One column of the `INSERT ... SELECT` of a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyColumn {
    /// Column of the shadow table.
    pub target: String,
    /// Value read from the original table.
    pub expr: CopyExpr,
    /// Replacement for NULL (`COALESCE`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<DefaultValue>,
}

/// Source of a copied value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyExpr {
    /// The original column, unchanged.
    Column(String),
    /// The original column converted to a new type.
    Cast {
        /// Original column.
        column: String,
        /// Target type.
        data_type: DataType,
    },
    /// A constant.
    Literal(DefaultValue),
}

/// One statement-level unit of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    /// One operation.
    Single(AlterOperation),
    /// Adjacent operations on one table combined into one statement.
    Batch {
        /// The table all operations apply to.
        table: TableName,
        /// The combined operations, in order.
        operations: Vec<AlterOperation>,
    },
}

impl PlanStep {
    /// The operations of this step, in order.
    #[must_use]
    pub fn operations(&self) -> &[AlterOperation] {
        match self {
            Self::Single(op) => std::slice::from_ref(op),
            Self::Batch { operations, .. } => operations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_reports_old_table() {
        let op = AlterOperation::RenameTable(RenameTableOp {
            from: TableName::new("old"),
            to: TableName::new("new"),
        });
        assert_eq!(op.table(), &TableName::new("old"));
        assert_eq!(op.kind(), OperationKind::RenameTable);
    }

    #[test]
    fn single_step_exposes_its_operation() {
        let step = PlanStep::Single(AlterOperation::DropTable(TableName::new("t")));
        assert_eq!(step.operations().len(), 1);
        assert_eq!(step.operations()[0].kind(), OperationKind::DropTable);
    }

    #[test]
    fn serializes_tagged() {
        let op = AlterOperation::RenameColumn(RenameColumnOp {
            table: TableName::new("t"),
            from: "a".into(),
            to: "b".into(),
        });
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "rename_column");
        assert_eq!(json["args"]["to"], "b");
    }
}
