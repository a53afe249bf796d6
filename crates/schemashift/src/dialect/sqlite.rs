//! SQLite renderer.
//!
//! SQLite only alters tables in place for column add/drop/rename; the
//! planner turns everything else into a rebuild, whose `CREATE TABLE`
//! declares every constraint inline.

use super::{Dialect, SqlRenderer};
use crate::descriptor::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, TableDescriptor, TableName,
};
use crate::error::RenderError;
use crate::types::DefaultValue;

/// SQLite statement renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteRenderer;

impl SqlRenderer for SqliteRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn render_default(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            other => other.to_sql(),
        }
    }

    fn column_definition(
        &self,
        _table: &TableName,
        col: &ColumnDescriptor,
    ) -> Result<String, RenderError> {
        let name = self.quote_identifier(&col.name)?;
        if col.auto_increment {
            return Ok(format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"));
        }
        let mut sql = format!("{name} {}", self.map_data_type(&col.data_type));
        if col.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(ref default) = col.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }
        Ok(sql)
    }

    fn is_implied_by_column(&self, shape: &TableDescriptor, c: &ConstraintDescriptor) -> bool {
        c.kind == ConstraintKind::PrimaryKey
            && c.columns.len() == 1
            && shape
                .find_column(&c.columns[0])
                .is_some_and(|col| col.auto_increment)
    }
}
