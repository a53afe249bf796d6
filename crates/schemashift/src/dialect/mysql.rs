//! MySQL renderer.

use super::{constraint_name, Dialect, SqlRenderer};
use crate::descriptor::ConstraintKind;
use crate::error::RenderError;
use crate::operation::{AlterColumnOp, ConstraintOp, IndexOp, RenameTableOp};
use crate::types::DataType;

/// MySQL statement renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlRenderer;

impl MySqlRenderer {
    /// `MODIFY COLUMN` restating the whole target definition.
    fn modify_column(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        Ok(vec![format!(
            "MODIFY COLUMN {}",
            self.column_definition(&op.table, &op.after)?
        )])
    }
}

impl SqlRenderer for MySqlRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn map_data_type(&self, dt: &DataType) -> String {
        match dt {
            DataType::Varchar(None) => "VARCHAR(255)".to_string(),
            DataType::Varbinary(None) => "VARBINARY(255)".to_string(),
            DataType::Boolean => "TINYINT(1)".to_string(),
            other => other.to_sql(),
        }
    }

    fn alter_column_type(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        self.modify_column(op)
    }

    fn alter_column_nullability(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        self.modify_column(op)
    }

    fn alter_column_default(&self, op: &AlterColumnOp) -> Result<Vec<String>, RenderError> {
        self.modify_column(op)
    }

    fn drop_constraint_clause(&self, op: &ConstraintOp) -> Result<String, RenderError> {
        // The primary key is addressed without a name.
        let name = || self.quote_identifier(constraint_name(op)?);
        Ok(match op.constraint.kind {
            ConstraintKind::PrimaryKey => "DROP PRIMARY KEY".to_string(),
            ConstraintKind::ForeignKey { .. } => format!("DROP FOREIGN KEY {}", name()?),
            ConstraintKind::Unique => format!("DROP INDEX {}", name()?),
            ConstraintKind::Check { .. } => format!("DROP CHECK {}", name()?),
        })
    }

    fn rename_table(&self, op: &RenameTableOp) -> Result<Vec<String>, RenderError> {
        Ok(vec![format!(
            "RENAME TABLE {} TO {}",
            self.quote_table(&op.from)?,
            self.quote_table(&op.to)?
        )])
    }

    fn drop_index(&self, op: &IndexOp) -> Result<String, RenderError> {
        Ok(format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&op.index.name)?,
            self.quote_table(&op.table)?
        ))
    }
}
