//! SQL Server renderer.
//!
//! Defaults are named constraints (`DF_<table>_<column>` unless the
//! snapshot reports another name), renames go through `sp_rename` and
//! column alterations restate type and nullability together.

use super::{insert_select, string_literal, Dialect, SqlRenderer};
use crate::descriptor::{ColumnDescriptor, TableName};
use crate::error::RenderError;
use crate::operation::{
    AlterColumnOp, AlterOperation, IndexOp, RebuildTableOp, RenameColumnOp, RenameTableOp,
};
use crate::types::{DataType, DefaultValue};

/// SQL Server statement renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerRenderer;

impl SqlServerRenderer {
    /// Name of the constraint holding the column's default.
    #[must_use]
    pub fn default_constraint_name(table: &TableName, col: &ColumnDescriptor) -> String {
        col.default_constraint
            .clone()
            .unwrap_or_else(|| format!("DF_{}_{}", table.name, col.name))
    }

    fn nullability(col: &ColumnDescriptor) -> &'static str {
        if col.not_null {
            "NOT NULL"
        } else {
            "NULL"
        }
    }

    fn alter_column(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        Ok(vec![format!(
            "ALTER COLUMN {} {} {}",
            self.quote_identifier(&op.after.name)?,
            self.map_data_type(&op.after.data_type),
            Self::nullability(&op.after)
        )])
    }

    /// `sp_rename` object argument: the quoted, dot-separated path.
    fn rename_target(
        &self,
        table: &TableName,
        column: Option<&str>,
    ) -> Result<String, RenderError> {
        let mut path = self.quote_table(table)?;
        if let Some(column) = column {
            path.push('.');
            path.push_str(&self.quote_identifier(column)?);
        }
        Ok(string_literal(&path))
    }
}

impl SqlRenderer for SqlServerRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn map_data_type(&self, dt: &DataType) -> String {
        match dt {
            DataType::Double => "FLOAT".to_string(),
            DataType::Text => "NVARCHAR(MAX)".to_string(),
            DataType::Varchar(None) => "VARCHAR(MAX)".to_string(),
            DataType::Blob | DataType::Varbinary(None) => "VARBINARY(MAX)".to_string(),
            DataType::Timestamp | DataType::Datetime => "DATETIME2".to_string(),
            DataType::Boolean => "BIT".to_string(),
            other => other.to_sql(),
        }
    }

    fn render_default(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            other => other.to_sql(),
        }
    }

    fn column_definition(
        &self,
        table: &TableName,
        col: &ColumnDescriptor,
    ) -> Result<String, RenderError> {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&col.name)?,
            self.map_data_type(&col.data_type)
        );
        if col.auto_increment {
            sql.push_str(" IDENTITY(1,1)");
        }
        sql.push(' ');
        sql.push_str(Self::nullability(col));
        if let Some(ref default) = col.default {
            sql.push_str(&format!(
                " CONSTRAINT {} DEFAULT {}",
                self.quote_identifier(&Self::default_constraint_name(table, col))?,
                self.render_default(default)
            ));
        }
        Ok(sql)
    }

    fn alter_clauses(&self, op: &AlterOperation) -> Result<Vec<String>, RenderError> {
        match op {
            AlterOperation::AddColumn(op) => Ok(vec![format!(
                "ADD {}",
                self.column_definition(&op.table, &op.column)?
            )]),
            AlterOperation::AlterColumnType(op) | AlterOperation::AlterColumnNullability(op) => {
                self.alter_column(op)
            }
            AlterOperation::AlterColumnDefault(op) => self.alter_column_default(op),
            AlterOperation::DropColumn(op) => Ok(vec![format!(
                "DROP COLUMN {}",
                self.quote_identifier(&op.column.name)?
            )]),
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

    fn alter_column_default(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        let mut clauses = Vec::new();
        if op.before.default.is_some() {
            clauses.push(format!(
                "DROP CONSTRAINT {}",
                self.quote_identifier(&Self::default_constraint_name(&op.table, &op.before))?
            ));
        }
        if let Some(ref default) = op.after.default {
            clauses.push(format!(
                "ADD CONSTRAINT {} DEFAULT {} FOR {}",
                self.quote_identifier(&Self::default_constraint_name(&op.table, &op.after))?,
                self.render_default(default),
                self.quote_identifier(&op.after.name)?
            ));
        }
        Ok(clauses)
    }

    fn render_batch(
        &self,
        table: &TableName,
        ops: &[AlterOperation],
    ) -> Result<Vec<String>, RenderError> {
        // Same-kind batches: one keyword, comma-separated items.
        let prefix = match ops.first() {
            Some(AlterOperation::AddColumn(_)) => "ADD ",
            Some(AlterOperation::DropColumn(_)) => "DROP COLUMN ",
            Some(AlterOperation::DropConstraint(_)) => "DROP CONSTRAINT ",
            _ => {
                let mut statements = Vec::new();
                for op in ops {
                    statements.extend(self.render_operation(op)?);
                }
                return Ok(statements);
            }
        };
        let mut items = Vec::new();
        for op in ops {
            for clause in self.alter_clauses(op)? {
                items.push(clause.strip_prefix(prefix).unwrap_or(&clause).to_string());
            }
        }
        Ok(vec![format!(
            "ALTER TABLE {} {prefix}{}",
            self.quote_table(table)?,
            items.join(", ")
        )])
    }

    fn rename_table(&self, op: &RenameTableOp) -> Result<Vec<String>, RenderError> {
        Ok(vec![format!(
            "EXEC sp_rename {}, {}",
            self.rename_target(&op.from, None)?,
            string_literal(&op.to.name)
        )])
    }

    fn rename_column(&self, op: &RenameColumnOp) -> Result<Vec<String>, RenderError> {
        self.quote_identifier(&op.to)?;
        Ok(vec![format!(
            "EXEC sp_rename {}, {}, 'COLUMN'",
            self.rename_target(&op.table, Some(&op.from))?,
            string_literal(&op.to)
        )])
    }

    fn drop_index(&self, op: &IndexOp) -> Result<String, RenderError> {
        Ok(format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&op.index.name)?,
            self.quote_table(&op.table)?
        ))
    }

    fn copy_rows(&self, op: &RebuildTableOp) -> Result<Vec<String>, RenderError> {
        let insert = insert_select(self, op)?;
        let explicit_identity = op.copy.iter().any(|copy| {
            op.shape
                .find_column(&copy.target)
                .is_some_and(|c| c.auto_increment)
        });
        if !explicit_identity || insert.is_empty() {
            return Ok(insert);
        }
        let shadow = self.quote_table(&op.shadow)?;
        let mut statements = vec![format!("SET IDENTITY_INSERT {shadow} ON")];
        statements.extend(insert);
        statements.push(format!("SET IDENTITY_INSERT {shadow} OFF"));
        Ok(statements)
    }
}
