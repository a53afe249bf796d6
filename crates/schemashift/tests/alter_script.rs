//! End-to-end alter scripts for the `t0`/`t1` fixture on every dialect.

mod common;

use common::*;
use schemashift::descriptor::{ColumnDescriptor, DatabaseDescriptor, TableName};
use schemashift::diff::DiffWarning;
use schemashift::plan::SkippedChange;
use schemashift::types::{DataType, DefaultValue};
use schemashift::{
    compute_alter_script, compute_alter_script_with, compute_database_script, AlterError,
    AlterOptions, Dialect, OperationKind,
};

// =============================================================================
// Idempotence and determinism
// =============================================================================

#[test]
fn same_snapshot_produces_nothing() {
    for dialect in Dialect::ALL {
        let script = script(&t1(), dialect);
        assert!(script.is_empty(), "{dialect:?}: {:?}", script.statements);
        assert!(script.warnings.is_empty());

        let options = AlterOptions::default();
        let db = compute_database_script(&database(), &database(), &options, dialect).unwrap();
        assert!(db.is_empty());
    }
}

#[test]
fn output_is_deterministic() {
    let after = t1_with(|t| {
        drop_column(t, "col_fk");
        column(t, "col_std").name = "col_renamed".into();
        column(t, "col_def").data_type = DataType::Bigint;
    });
    for dialect in Dialect::ALL {
        let first = script(&after, dialect);
        let second = script(&after, dialect);
        assert_eq!(first, second, "{dialect:?}");
    }
}

#[test]
fn missing_pairing_ids_fall_back_to_names() {
    let mut before = t1();
    for c in &mut before.columns {
        c.pairing_id = None;
    }
    let script = compute_alter_script(
        &before,
        &t1(),
        &AlterOptions::default(),
        None,
        Dialect::Postgres,
    )
    .unwrap();
    assert!(script.is_empty());
    assert!(script
        .warnings
        .iter()
        .any(|w| matches!(w, DiffWarning::Identity { .. })));
}

// =============================================================================
// Columns
// =============================================================================

#[test]
fn add_column() {
    let after =
        t1().column(ColumnDescriptor::new("col_new", DataType::Integer).paired("t1.col_new"));
    let expected = [
        (Dialect::Postgres, r#"ALTER TABLE "t1" ADD COLUMN "col_new" INTEGER"#),
        (Dialect::MySql, "ALTER TABLE `t1` ADD COLUMN `col_new` INTEGER"),
        (Dialect::SqlServer, "ALTER TABLE [t1] ADD [col_new] INTEGER NULL"),
        (Dialect::Sqlite, r#"ALTER TABLE "t1" ADD COLUMN "col_new" INTEGER"#),
    ];
    for (dialect, sql) in expected {
        assert_eq!(script(&after, dialect).statements, vec![sql], "{dialect:?}");
    }
}

#[test]
fn drop_plain_column() {
    let after = t1_with(|t| drop_column(t, "col_std"));
    let expected = [
        (Dialect::Postgres, r#"ALTER TABLE "t1" DROP COLUMN "col_std""#),
        (Dialect::MySql, "ALTER TABLE `t1` DROP COLUMN `col_std`"),
        (Dialect::SqlServer, "ALTER TABLE [t1] DROP COLUMN [col_std]"),
        (Dialect::Sqlite, r#"ALTER TABLE "t1" DROP COLUMN "col_std""#),
    ];
    for (dialect, sql) in expected {
        assert_eq!(script(&after, dialect).statements, vec![sql], "{dialect:?}");
    }
}

#[test]
fn drop_column_with_default() {
    let after = t1_with(|t| drop_column(t, "col_def"));
    assert_eq!(
        script(&after, Dialect::SqlServer).statements,
        vec![
            "ALTER TABLE [t1] DROP CONSTRAINT [DF_t1_col_def]",
            "ALTER TABLE [t1] DROP COLUMN [col_def]",
        ]
    );
    assert_eq!(
        script(&after, Dialect::Postgres).statements,
        vec![r#"ALTER TABLE "t1" DROP COLUMN "col_def""#]
    );
}

#[test]
fn drop_indexed_column_drops_index_first() {
    let after = t1_with(|t| drop_column(t, "col_idx"));
    assert_eq!(
        script(&after, Dialect::MySql).statements,
        vec![
            "DROP INDEX `idx1` ON `t1`",
            "ALTER TABLE `t1` DROP COLUMN `col_idx`",
        ]
    );
    assert_eq!(
        script(&after, Dialect::Sqlite).statements,
        vec![r#"DROP INDEX "idx1""#, r#"ALTER TABLE "t1" DROP COLUMN "col_idx""#]
    );
}

#[test]
fn drop_foreign_key_column() {
    let after = t1_with(|t| drop_column(t, "col_fk"));
    let expected = [
        (
            Dialect::Postgres,
            [
                r#"ALTER TABLE "t1" DROP CONSTRAINT "fk_t1_col_fk""#,
                r#"ALTER TABLE "t1" DROP COLUMN "col_fk""#,
            ],
        ),
        (
            Dialect::MySql,
            [
                "ALTER TABLE `t1` DROP FOREIGN KEY `fk_t1_col_fk`",
                "ALTER TABLE `t1` DROP COLUMN `col_fk`",
            ],
        ),
        (
            Dialect::SqlServer,
            [
                "ALTER TABLE [t1] DROP CONSTRAINT [fk_t1_col_fk]",
                "ALTER TABLE [t1] DROP COLUMN [col_fk]",
            ],
        ),
    ];
    for (dialect, sql) in expected {
        assert_eq!(script(&after, dialect).statements, sql, "{dialect:?}");
    }
}

#[test]
fn sqlite_rebuilds_to_drop_foreign_key_column() {
    let after = t1_with(|t| drop_column(t, "col_fk"));
    let script = script(&after, Dialect::Sqlite);
    assert_eq!(script.statements.len(), 5, "{:#?}", script.statements);
    assert!(script.statements[0].starts_with(r#"CREATE TABLE "t1__rebuild" ("#));
    assert!(!script.statements[0].contains("FOREIGN KEY"));
    assert_eq!(
        script.statements[1],
        r#"INSERT INTO "t1__rebuild" ("id", "col_std", "col_def", "col_idx") SELECT "id", "col_std", "col_def", "col_idx" FROM "t1""#
    );
    assert_eq!(script.statements[2], r#"DROP TABLE "t1""#);
    assert_eq!(script.statements[3], r#"ALTER TABLE "t1__rebuild" RENAME TO "t1""#);
    assert_eq!(script.statements[4], r#"CREATE INDEX "idx1" ON "t1" ("col_idx")"#);
}

#[test]
fn rename_column_is_one_statement() {
    let after = t1_with(|t| column(t, "col_std").name = "col_renamed".into());
    let expected = [
        (
            Dialect::Postgres,
            r#"ALTER TABLE "t1" RENAME COLUMN "col_std" TO "col_renamed""#,
        ),
        (
            Dialect::MySql,
            "ALTER TABLE `t1` RENAME COLUMN `col_std` TO `col_renamed`",
        ),
        (
            Dialect::SqlServer,
            "EXEC sp_rename '[t1].[col_std]', 'col_renamed', 'COLUMN'",
        ),
        (
            Dialect::Sqlite,
            r#"ALTER TABLE "t1" RENAME COLUMN "col_std" TO "col_renamed""#,
        ),
    ];
    for (dialect, sql) in expected {
        assert_eq!(script(&after, dialect).statements, vec![sql], "{dialect:?}");
    }
}

#[test]
fn rename_without_support_recreates_index() {
    let after = t1_with(|t| {
        column(t, "col_idx").name = "col_idx2".into();
        t.indexes[0].columns = vec!["col_idx2".into()];
    });
    let mut caps = Dialect::Postgres.capabilities().clone();
    caps.rename_column = false;
    let context = database_with(after.clone());

    let script = compute_alter_script_with(
        &t1(),
        &after,
        &AlterOptions::default(),
        Some(&context),
        &caps,
        Dialect::Postgres.renderer(),
    )
    .unwrap();
    assert_eq!(
        script.statements,
        vec![
            r#"DROP INDEX "idx1""#,
            r#"ALTER TABLE "t1" DROP COLUMN "col_idx""#,
            r#"ALTER TABLE "t1" ADD COLUMN "col_idx2" INTEGER"#,
            r#"CREATE INDEX "idx1" ON "t1" ("col_idx2")"#,
        ]
    );
}

#[test]
fn rename_then_retype() {
    let after = t1_with(|t| {
        let c = column(t, "col_std");
        c.name = "col_renamed".into();
        c.data_type = DataType::Bigint;
    });
    assert_eq!(
        script(&after, Dialect::Postgres).statements,
        vec![
            r#"ALTER TABLE "t1" RENAME COLUMN "col_std" TO "col_renamed""#,
            r#"ALTER TABLE "t1" ALTER COLUMN "col_renamed" TYPE BIGINT USING "col_renamed"::BIGINT"#,
        ]
    );
    assert_eq!(
        script(&after, Dialect::MySql).statements,
        vec![
            "ALTER TABLE `t1` RENAME COLUMN `col_std` TO `col_renamed`",
            "ALTER TABLE `t1` MODIFY COLUMN `col_renamed` BIGINT",
        ]
    );
}

#[test]
fn set_not_null() {
    let after = t1_with(|t| column(t, "col_std").not_null = true);
    let expected = [
        (
            Dialect::Postgres,
            r#"ALTER TABLE "t1" ALTER COLUMN "col_std" SET NOT NULL"#,
        ),
        (
            Dialect::MySql,
            "ALTER TABLE `t1` MODIFY COLUMN `col_std` INTEGER NOT NULL",
        ),
        (
            Dialect::SqlServer,
            "ALTER TABLE [t1] ALTER COLUMN [col_std] INTEGER NOT NULL",
        ),
    ];
    for (dialect, sql) in expected {
        assert_eq!(script(&after, dialect).statements, vec![sql], "{dialect:?}");
    }
}

#[test]
fn permissive_set_not_null_fills_nulls_first() {
    let after = t1_with(|t| column(t, "col_std").not_null = true);
    let permissive = AlterOptions::default().with_permissive_actions();
    let expected = [
        (
            Dialect::Postgres,
            r#"UPDATE "t1" SET "col_std" = 0 WHERE "col_std" IS NULL"#,
            r#"ALTER TABLE "t1" ALTER COLUMN "col_std" SET NOT NULL"#,
        ),
        (
            Dialect::MySql,
            "UPDATE `t1` SET `col_std` = 0 WHERE `col_std` IS NULL",
            "ALTER TABLE `t1` MODIFY COLUMN `col_std` INTEGER NOT NULL",
        ),
        (
            Dialect::SqlServer,
            "UPDATE [t1] SET [col_std] = 0 WHERE [col_std] IS NULL",
            "ALTER TABLE [t1] ALTER COLUMN [col_std] INTEGER NOT NULL",
        ),
    ];
    for (dialect, fill, alter) in expected {
        assert_eq!(
            script_with(&after, dialect, &permissive).statements,
            vec![fill, alter],
            "{dialect:?}"
        );
    }
}

#[test]
fn permissive_fill_prefers_the_new_default() {
    let after = t1_with(|t| {
        let col = column(t, "col_std");
        col.not_null = true;
        col.default = Some(DefaultValue::Integer(7));
    });
    let script = script_with(
        &after,
        Dialect::Postgres,
        &AlterOptions::default().with_permissive_actions(),
    );
    assert_eq!(
        script.statements[0],
        r#"UPDATE "t1" SET "col_std" = 7 WHERE "col_std" IS NULL"#
    );
    assert!(position(&script, "SET NOT NULL") > 0);
}

#[test]
fn sqlite_set_not_null_needs_permissive_rebuild() {
    let after = t1_with(|t| column(t, "col_std").not_null = true);
    let context = database_with(after.clone());

    let err = compute_alter_script(
        &t1(),
        &after,
        &AlterOptions::default(),
        Some(&context),
        Dialect::Sqlite,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        AlterError::UnsupportedOperation {
            operation: OperationKind::AlterColumnNullability,
            ..
        }
    ));

    let script = script_with(
        &after,
        Dialect::Sqlite,
        &AlterOptions::default().with_permissive_actions(),
    );
    assert!(script.statements[0].contains(r#""col_std" INTEGER NOT NULL"#));
    assert!(script.statements[1].contains(r#"COALESCE("col_std", 0)"#));
}

#[test]
fn sql_server_restates_named_default_around_alter() {
    let after = t1_with(|t| column(t, "col_def").not_null = true);
    assert_eq!(
        script(&after, Dialect::SqlServer).statements,
        vec![
            "ALTER TABLE [t1] DROP CONSTRAINT [DF_t1_col_def]",
            "ALTER TABLE [t1] ALTER COLUMN [col_def] INTEGER NOT NULL",
            "ALTER TABLE [t1] ADD CONSTRAINT [DF_t1_col_def] DEFAULT 12 FOR [col_def]",
        ]
    );
}

#[test]
fn retyping_indexed_column_recreates_index() {
    let after = t1_with(|t| column(t, "col_idx").data_type = DataType::Bigint);
    assert_eq!(
        script(&after, Dialect::Postgres).statements,
        vec![
            r#"DROP INDEX "idx1""#,
            r#"ALTER TABLE "t1" ALTER COLUMN "col_idx" TYPE BIGINT USING "col_idx"::BIGINT"#,
            r#"CREATE INDEX "idx1" ON "t1" ("col_idx")"#,
        ]
    );
}

#[test]
fn add_then_remove_leaves_nothing() {
    let added = t1().column(ColumnDescriptor::new("tmp", DataType::Text).paired("t1.tmp"));
    let context = database_with(added.clone());
    let forward = compute_alter_script(
        &t1(),
        &added,
        &AlterOptions::default(),
        Some(&context),
        Dialect::Postgres,
    )
    .unwrap();
    assert_eq!(forward.statements.len(), 1);

    let back = compute_alter_script(
        &added,
        &t1(),
        &AlterOptions::default(),
        Some(&database()),
        Dialect::Postgres,
    )
    .unwrap();
    assert_eq!(back.statements, vec![r#"ALTER TABLE "t1" DROP COLUMN "tmp""#]);
}

#[test]
fn no_drop_column_keeps_the_column() {
    let after = t1_with(|t| drop_column(t, "col_std"));
    let script = script_with(
        &after,
        Dialect::Postgres,
        &AlterOptions::default().with_no_drop_column(),
    );
    assert!(script.is_empty());
    assert_eq!(
        script.skipped,
        vec![SkippedChange::DropColumn {
            table: TableName::new("t1"),
            column: "col_std".into(),
        }]
    );
}

// =============================================================================
// Tables
// =============================================================================

#[test]
fn retyping_referenced_column_recreates_foreign_key() {
    let mut t0_after = t0();
    t0_after.columns[0].data_type = DataType::Bigint;
    let context = DatabaseDescriptor::new(vec![t0_after.clone(), t1()]);
    let script = compute_alter_script(
        &t0(),
        &t0_after,
        &AlterOptions::default(),
        Some(&context),
        Dialect::Postgres,
    )
    .unwrap();

    let drop_fk = position(&script, r#"DROP CONSTRAINT "fk_t1_col_fk""#);
    let retype = position(&script, "TYPE BIGINT");
    let add_fk = position(&script, r#"ADD CONSTRAINT "fk_t1_col_fk""#);
    assert!(drop_fk < retype && retype < add_fk, "{:#?}", script.statements);
    assert!(script.statements[add_fk].starts_with(r#"ALTER TABLE "t1""#));
}

#[test]
fn create_table_adds_foreign_keys_last() {
    let before = DatabaseDescriptor::new(vec![t0()]);
    let script =
        compute_database_script(&before, &database(), &AlterOptions::default(), Dialect::Postgres)
            .unwrap();
    assert_eq!(script.statements.len(), 3, "{:#?}", script.statements);
    assert!(script.statements[0].starts_with(r#"CREATE TABLE "t1" ("#));
    assert!(!script.statements[0].contains("FOREIGN KEY"));
    assert_eq!(script.statements[1], r#"CREATE INDEX "idx1" ON "t1" ("col_idx")"#);
    assert_eq!(
        script.statements[2],
        r#"ALTER TABLE "t1" ADD CONSTRAINT "fk_t1_col_fk" FOREIGN KEY ("col_fk") REFERENCES "t0" ("id")"#
    );
}

#[test]
fn sqlite_declares_foreign_keys_inline() {
    let before = DatabaseDescriptor::new(vec![t0()]);
    let script =
        compute_database_script(&before, &database(), &AlterOptions::default(), Dialect::Sqlite)
            .unwrap();
    assert_eq!(script.statements.len(), 2, "{:#?}", script.statements);
    assert!(script.statements[0].contains(r#"FOREIGN KEY ("col_fk") REFERENCES "t0" ("id")"#));
}

#[test]
fn rename_table() {
    let mut after = t1();
    after.name = TableName::new("t1_renamed");
    let context = database_with(after.clone());
    let script = compute_alter_script(
        &t1(),
        &after,
        &AlterOptions::default(),
        Some(&context),
        Dialect::MySql,
    )
    .unwrap();
    assert_eq!(script.statements, vec!["RENAME TABLE `t1` TO `t1_renamed`"]);
}

#[test]
fn no_drop_table_keeps_the_table() {
    let after = DatabaseDescriptor::new(vec![t0()]);
    let options = AlterOptions::default().with_no_drop_table();
    let script = compute_database_script(&database(), &after, &options, Dialect::Postgres).unwrap();
    assert!(script.is_empty());
    assert_eq!(
        script.skipped,
        vec![SkippedChange::DropTable {
            table: TableName::new("t1"),
        }]
    );

    let dropped =
        compute_database_script(&database(), &after, &AlterOptions::default(), Dialect::Postgres)
            .unwrap();
    assert_eq!(dropped.statements, vec![r#"DROP TABLE "t1""#]);
}
