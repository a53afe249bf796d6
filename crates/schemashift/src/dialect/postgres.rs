//! PostgreSQL renderer.

use super::{Dialect, SqlRenderer};
use crate::descriptor::ColumnDescriptor;
use crate::types::DataType;

/// PostgreSQL statement renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresRenderer;

impl SqlRenderer for PostgresRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn map_data_type(&self, dt: &DataType) -> String {
        match dt {
            DataType::Double => "DOUBLE PRECISION".to_string(),
            DataType::Blob | DataType::Binary(_) | DataType::Varbinary(_) => "BYTEA".to_string(),
            DataType::Datetime => "TIMESTAMP".to_string(),
            other => other.to_sql(),
        }
    }

    fn column_type(&self, col: &ColumnDescriptor) -> String {
        if col.auto_increment {
            match col.data_type {
                DataType::Smallint => return "SMALLSERIAL".to_string(),
                DataType::Integer => return "SERIAL".to_string(),
                DataType::Bigint => return "BIGSERIAL".to_string(),
                _ => {}
            }
        }
        self.map_data_type(&col.data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ConstraintDescriptor, IndexDescriptor, TableName};
    use crate::operation::{AlterColumnOp, AlterOperation, ColumnOp, ConstraintOp, IndexOp};
    use crate::types::DefaultValue;

    fn t1() -> TableName {
        TableName::new("t1")
    }

    #[test]
    fn add_column_with_default() {
        let op = AlterOperation::AddColumn(ColumnOp {
            table: t1(),
            column: ColumnDescriptor::new("col_def", DataType::Integer)
                .default_value(DefaultValue::Integer(12)),
        });
        assert_eq!(
            PostgresRenderer.render_operation(&op).unwrap(),
            vec!["ALTER TABLE \"t1\" ADD COLUMN \"col_def\" INTEGER DEFAULT 12"]
        );
    }

    #[test]
    fn serial_for_auto_increment() {
        let col = ColumnDescriptor::new("id", DataType::Bigint)
            .not_null()
            .auto_increment();
        assert_eq!(
            PostgresRenderer.column_definition(&t1(), &col).unwrap(),
            "\"id\" BIGSERIAL NOT NULL"
        );
    }

    #[test]
    fn retype_uses_cast() {
        let before = ColumnDescriptor::new("c", DataType::Integer);
        let after = ColumnDescriptor::new("c", DataType::Text);
        let op = AlterOperation::AlterColumnType(AlterColumnOp {
            table: t1(),
            before,
            after,
        });
        assert_eq!(
            PostgresRenderer.render_operation(&op).unwrap(),
            vec!["ALTER TABLE \"t1\" ALTER COLUMN \"c\" TYPE TEXT USING \"c\"::TEXT"]
        );
    }

    #[test]
    fn nullability_and_default() {
        let before = ColumnDescriptor::new("c", DataType::Integer);
        let after = before.clone().not_null();
        let op = AlterOperation::AlterColumnNullability(AlterColumnOp {
            table: t1(),
            before: before.clone(),
            after,
        });
        assert_eq!(
            PostgresRenderer.render_operation(&op).unwrap(),
            vec!["ALTER TABLE \"t1\" ALTER COLUMN \"c\" SET NOT NULL"]
        );

        let op = AlterOperation::AlterColumnDefault(AlterColumnOp {
            table: t1(),
            before: before.clone().default_value(DefaultValue::Integer(1)),
            after: before,
        });
        assert_eq!(
            PostgresRenderer.render_operation(&op).unwrap(),
            vec!["ALTER TABLE \"t1\" ALTER COLUMN \"c\" DROP DEFAULT"]
        );
    }

    #[test]
    fn batch_combines_clauses() {
        let ops = vec![
            AlterOperation::AddColumn(ColumnOp {
                table: t1(),
                column: ColumnDescriptor::new("a", DataType::Integer),
            }),
            AlterOperation::DropConstraint(ConstraintOp {
                table: t1(),
                constraint: ConstraintDescriptor::unique(Some("uq_b"), &["b"]),
            }),
        ];
        assert_eq!(
            PostgresRenderer.render_batch(&t1(), &ops).unwrap(),
            vec!["ALTER TABLE \"t1\" ADD COLUMN \"a\" INTEGER, DROP CONSTRAINT \"uq_b\""]
        );
    }

    #[test]
    fn index_statements() {
        let op = IndexOp {
            table: TableName::qualified("public", "t1"),
            index: IndexDescriptor::new("idx1", &["col_idx"]).unique(),
        };
        assert_eq!(
            PostgresRenderer.create_index(&op).unwrap(),
            "CREATE UNIQUE INDEX \"idx1\" ON \"public\".\"t1\" (\"col_idx\")"
        );
        assert_eq!(
            PostgresRenderer.drop_index(&op).unwrap(),
            "DROP INDEX \"public\".\"idx1\""
        );
    }

    #[test]
    fn dropping_unnamed_constraint_is_a_render_error() {
        let op = AlterOperation::DropConstraint(ConstraintOp {
            table: t1(),
            constraint: ConstraintDescriptor::unique(None, &["a"]),
        });
        assert!(PostgresRenderer.render_operation(&op).is_err());
    }
}
