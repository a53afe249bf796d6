#![allow(dead_code)]

use schemashift::descriptor::{
    ColumnDescriptor, ConstraintDescriptor, DatabaseDescriptor, IndexDescriptor, TableDescriptor,
    TableName,
};
use schemashift::types::{DataType, DefaultValue};
use schemashift::{compute_alter_script, AlterOptions, AlterScript, Dialect};

/// `t0(id int not null primary key)`.
pub fn t0() -> TableDescriptor {
    TableDescriptor::new(TableName::new("t0"))
        .paired("t0")
        .column(ColumnDescriptor::new("id", DataType::Integer).not_null().paired("t0.id"))
        .constraint(ConstraintDescriptor::primary_key(Some("pk_t0"), &["id"]).paired("t0.pk"))
}

/// `t1` with one column of each flavour and an index on `col_idx`.
pub fn t1() -> TableDescriptor {
    TableDescriptor::new(TableName::new("t1"))
        .paired("t1")
        .column(ColumnDescriptor::new("id", DataType::Integer).not_null().paired("t1.id"))
        .column(ColumnDescriptor::new("col_std", DataType::Integer).paired("t1.col_std"))
        .column(
            ColumnDescriptor::new("col_def", DataType::Integer)
                .default_value(DefaultValue::Integer(12))
                .paired("t1.col_def"),
        )
        .column(ColumnDescriptor::new("col_fk", DataType::Integer).paired("t1.col_fk"))
        .column(ColumnDescriptor::new("col_idx", DataType::Integer).paired("t1.col_idx"))
        .index(IndexDescriptor::new("idx1", &["col_idx"]).paired("t1.idx1"))
        .constraint(ConstraintDescriptor::primary_key(Some("pk_t1"), &["id"]).paired("t1.pk"))
        .constraint(
            ConstraintDescriptor::foreign_key(
                Some("fk_t1_col_fk"),
                &["col_fk"],
                TableName::new("t0"),
                &["id"],
            )
            .paired("t1.fk"),
        )
}

/// `t0` and `t1`.
pub fn database() -> DatabaseDescriptor {
    DatabaseDescriptor::new(vec![t0(), t1()])
}

/// `database()` with `t1` replaced.
pub fn database_with(t1: TableDescriptor) -> DatabaseDescriptor {
    DatabaseDescriptor::new(vec![t0(), t1])
}

/// `t1` after `edit`.
pub fn t1_with(edit: impl FnOnce(&mut TableDescriptor)) -> TableDescriptor {
    let mut table = t1();
    edit(&mut table);
    table.renumber();
    table
}

/// Removes a column and every index and constraint that uses it.
pub fn drop_column(table: &mut TableDescriptor, name: &str) {
    table.columns.retain(|c| c.name != name);
    table.indexes.retain(|i| !i.columns.iter().any(|c| c == name));
    table.constraints.retain(|c| !c.uses_column(name));
}

/// Mutable access to a column by name.
pub fn column<'a>(table: &'a mut TableDescriptor, name: &str) -> &'a mut ColumnDescriptor {
    table
        .columns
        .iter_mut()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no column {name}"))
}

pub fn script(after: &TableDescriptor, dialect: Dialect) -> AlterScript {
    script_with(after, dialect, &AlterOptions::default())
}

pub fn script_with(
    after: &TableDescriptor,
    dialect: Dialect,
    options: &AlterOptions,
) -> AlterScript {
    let context = database_with(after.clone());
    compute_alter_script(&t1(), after, options, Some(&context), dialect)
        .unwrap_or_else(|e| panic!("{dialect:?}: {e}"))
}

/// Position of the first statement containing `needle`.
pub fn position(script: &AlterScript, needle: &str) -> usize {
    script
        .statements
        .iter()
        .position(|s| s.contains(needle))
        .unwrap_or_else(|| panic!("no statement contains {needle:?} in {:#?}", script.statements))
}
