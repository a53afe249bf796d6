//! Structural differ.
//!
//! Pairs the entities of a "before" and an "after" snapshot through the
//! identity model and classifies every pairing as unchanged, modified,
//! added or removed. The output is a pure value; no SQL is produced here.
//!
//! Columns get attribute-level deltas. Indexes and constraints never do:
//! no modelled dialect can alter one in place, so any difference (column
//! set, uniqueness, name, referenced table, ...) is reported as a removal
//! plus an addition.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, DatabaseDescriptor, IndexDescriptor,
    TableDescriptor, TableName,
};
use crate::identity::{match_entities, IdentityWarning, PairingId, Paired, Side};
use crate::types::ForeignKeyAction;

// ================================================================
// Public types
// ================================================================

/// Kind of entity a warning is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A table.
    Table,
    /// A column.
    Column,
    /// An index.
    Index,
    /// A constraint.
    Constraint,
}

/// Non-fatal observations made while diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum DiffWarning {
    /// Missing or duplicate pairing ids; name matching was used.
    Identity {
        /// Table the entity belongs to (`None` for table-level matching).
        table: Option<TableName>,
        /// Kind of entity.
        entity: EntityKind,
        /// The identity problem.
        problem: IdentityWarning,
    },
    /// An index or constraint names something that does not exist in its
    /// snapshot; it was ignored on that side.
    DanglingReference {
        /// Owning table.
        table: TableName,
        /// The index or constraint.
        entity: String,
        /// The missing column or table.
        missing: String,
        /// Which snapshot contained the dangling entity.
        side: Side,
    },
    /// The relative order of surviving columns changed. No incremental
    /// statement can reorder columns, so this is reported only.
    ColumnOrderChanged {
        /// Table name.
        table: TableName,
        /// Surviving columns in the old order.
        before: Vec<String>,
        /// Surviving columns in the new order.
        after: Vec<String>,
    },
}

/// Which attributes of a paired column differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnDelta {
    /// Name changed.
    pub name: bool,
    /// Declared type changed.
    pub data_type: bool,
    /// NOT NULL flag changed.
    pub nullability: bool,
    /// Default expression changed (added, removed or replaced).
    pub default: bool,
    /// Auto-increment flag changed.
    pub auto_increment: bool,
}

impl ColumnDelta {
    /// Compares two snapshots of the same column.
    #[must_use]
    pub fn between(before: &ColumnDescriptor, after: &ColumnDescriptor) -> Self {
        let default = match (&before.default, &after.default) {
            (None, None) => false,
            (Some(b), Some(a)) => !b.same_as(a),
            _ => true,
        };
        Self {
            name: before.name != after.name,
            data_type: before.data_type != after.data_type,
            nullability: before.not_null != after.not_null,
            default,
            auto_increment: before.auto_increment != after.auto_increment,
        }
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::default()
    }

    /// Returns `true` if only the name changed.
    #[must_use]
    pub fn is_pure_rename(self) -> bool {
        self == Self {
            name: true,
            ..Self::default()
        }
    }
}

/// Classification of one column pairing.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange<'a> {
    /// Present on both sides with identical attributes.
    Unchanged {
        /// Before snapshot.
        before: &'a ColumnDescriptor,
        /// After snapshot.
        after: &'a ColumnDescriptor,
    },
    /// Present on both sides with at least one differing attribute.
    Modified {
        /// Before snapshot.
        before: &'a ColumnDescriptor,
        /// After snapshot.
        after: &'a ColumnDescriptor,
        /// Differing attributes.
        delta: ColumnDelta,
    },
    /// Present only after.
    Added(&'a ColumnDescriptor),
    /// Present only before.
    Removed(&'a ColumnDescriptor),
}

/// Classification of one index or constraint pairing.
#[derive(Debug, PartialEq)]
pub enum DependentChange<'a, T> {
    /// Present on both sides and equivalent.
    Unchanged {
        /// Before snapshot.
        before: &'a T,
        /// After snapshot.
        after: &'a T,
    },
    /// Present only after, or changed (the after shape).
    Added(&'a T),
    /// Present only before, or changed (the before shape).
    Removed(&'a T),
}

// Manual impls: a derive would require `T: Clone`.
impl<T> Clone for DependentChange<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DependentChange<'_, T> {}

/// Diff of two snapshots of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDiff<'a> {
    /// The table before.
    pub before: &'a TableDescriptor,
    /// The table after.
    pub after: &'a TableDescriptor,
    /// Column pairings: before order first, then additions in after order.
    pub columns: Vec<ColumnChange<'a>>,
    /// Index pairings.
    pub indexes: Vec<DependentChange<'a, IndexDescriptor>>,
    /// Constraint pairings.
    pub constraints: Vec<DependentChange<'a, ConstraintDescriptor>>,
    /// Observations made while diffing.
    pub warnings: Vec<DiffWarning>,
}

impl<'a> TableDiff<'a> {
    /// Returns `true` if the table needs no change. Warnings do not count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.is_renamed()
            && self
                .columns
                .iter()
                .all(|c| matches!(c, ColumnChange::Unchanged { .. }))
            && self
                .indexes
                .iter()
                .all(|c| matches!(c, DependentChange::Unchanged { .. }))
            && self
                .constraints
                .iter()
                .all(|c| matches!(c, DependentChange::Unchanged { .. }))
    }

    /// Returns `true` if the table itself was renamed or moved.
    #[must_use]
    pub fn is_renamed(&self) -> bool {
        self.before.name != self.after.name
    }

    /// Columns present only after.
    pub fn added_columns(&self) -> impl Iterator<Item = &'a ColumnDescriptor> + '_ {
        self.columns.iter().filter_map(|c| match c {
            ColumnChange::Added(col) => Some(*col),
            _ => None,
        })
    }

    /// Columns present only before.
    pub fn removed_columns(&self) -> impl Iterator<Item = &'a ColumnDescriptor> + '_ {
        self.columns.iter().filter_map(|c| match c {
            ColumnChange::Removed(col) => Some(*col),
            _ => None,
        })
    }

    /// Paired columns with their deltas.
    pub fn modified_columns(
        &self,
    ) -> impl Iterator<Item = (&'a ColumnDescriptor, &'a ColumnDescriptor, ColumnDelta)> + '_ {
        self.columns.iter().filter_map(|c| match c {
            ColumnChange::Modified {
                before,
                after,
                delta,
            } => Some((*before, *after, *delta)),
            _ => None,
        })
    }

    /// Paired columns without changes.
    pub fn unchanged_columns(&self) -> impl Iterator<Item = &'a ColumnDescriptor> + '_ {
        self.columns.iter().filter_map(|c| match c {
            ColumnChange::Unchanged { after, .. } => Some(*after),
            _ => None,
        })
    }

    /// Maps a column name of the before table to its name after, for
    /// columns that survive.
    #[must_use]
    pub fn renamed_to(&self, before_name: &str) -> Option<&'a str> {
        self.columns.iter().find_map(|c| match c {
            ColumnChange::Unchanged { before, after }
            | ColumnChange::Modified { before, after, .. }
                if before.name == before_name =>
            {
                Some(after.name.as_str())
            }
            _ => None,
        })
    }
}

/// Optional database snapshots used to resolve foreign-key targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffContext<'a> {
    /// The database the before table belongs to.
    pub before: Option<&'a DatabaseDescriptor>,
    /// The database the after table belongs to.
    pub after: Option<&'a DatabaseDescriptor>,
}

/// Change of one table within a database diff.
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange<'a> {
    /// Present only after.
    Added(&'a TableDescriptor),
    /// Present only before.
    Removed(&'a TableDescriptor),
    /// Present on both sides (possibly unchanged).
    Paired(TableDiff<'a>),
}

/// Diff of two database snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseDiff<'a> {
    /// The database before.
    pub before: &'a DatabaseDescriptor,
    /// The database after.
    pub after: &'a DatabaseDescriptor,
    /// Table pairings: before order first, then additions.
    pub tables: Vec<TableChange<'a>>,
    /// Table-level observations; per-table warnings stay in each
    /// [`TableDiff`].
    pub warnings: Vec<DiffWarning>,
}

impl DatabaseDiff<'_> {
    /// Returns `true` if no table needs a change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(|t| match t {
            TableChange::Paired(diff) => diff.is_empty(),
            _ => false,
        })
    }
}

// ================================================================
// Table-level diff
// ================================================================

/// Diffs two snapshots of the same table.
#[must_use]
pub fn diff_table<'a>(before: &'a TableDescriptor, after: &'a TableDescriptor) -> TableDiff<'a> {
    diff_table_in(before, after, DiffContext::default())
}

/// Diffs two snapshots of the same table, resolving foreign-key targets
/// through the surrounding databases.
#[must_use]
pub fn diff_table_in<'a>(
    before: &'a TableDescriptor,
    after: &'a TableDescriptor,
    ctx: DiffContext<'a>,
) -> TableDiff<'a> {
    let mut warnings = Vec::new();
    let table = &after.name;

    let matching = match_entities(&before.columns, &after.columns);
    push_identity_warnings(&mut warnings, Some(table), EntityKind::Column, matching.warnings);

    let mut columns = Vec::with_capacity(matching.pairs.len());
    let mut survivors: BTreeMap<&str, &str> = BTreeMap::new();
    for pair in matching.pairs {
        let change = match (pair.before, pair.after) {
            (Some(b), Some(a)) => {
                survivors.insert(b.name.as_str(), a.name.as_str());
                let delta = ColumnDelta::between(b, a);
                if delta.is_empty() {
                    ColumnChange::Unchanged {
                        before: b,
                        after: a,
                    }
                } else {
                    ColumnChange::Modified {
                        before: b,
                        after: a,
                        delta,
                    }
                }
            }
            (Some(b), None) => ColumnChange::Removed(b),
            (None, Some(a)) => ColumnChange::Added(a),
            (None, None) => continue,
        };
        columns.push(change);
    }

    let matching = match_entities(&before.indexes, &after.indexes);
    push_identity_warnings(&mut warnings, Some(table), EntityKind::Index, matching.warnings);
    let mut indexes = Vec::new();
    for pair in matching.pairs {
        let b = pair.before.filter(|i| {
            let missing = missing_column(before, &i.columns);
            is_live(before, &i.name, missing, Side::Before, &mut warnings)
        });
        let a = pair.after.filter(|i| {
            let missing = missing_column(after, &i.columns);
            is_live(after, &i.name, missing, Side::After, &mut warnings)
        });
        push_dependent(&mut indexes, b, a, |b, a| {
            b.name == a.name
                && b.unique == a.unique
                && same_columns(&survivors, &b.columns, &a.columns)
        });
    }

    let matching = match_entities(&before.constraints, &after.constraints);
    push_identity_warnings(
        &mut warnings,
        Some(table),
        EntityKind::Constraint,
        matching.warnings,
    );
    let mut constraints = Vec::new();
    for pair in matching.pairs {
        let b = pair.before.filter(|c| {
            let missing = missing_reference(before, ctx.before, c);
            is_live(before, &c.fallback_key(), missing, Side::Before, &mut warnings)
        });
        let a = pair.after.filter(|c| {
            let missing = missing_reference(after, ctx.after, c);
            is_live(after, &c.fallback_key(), missing, Side::After, &mut warnings)
        });
        push_dependent(&mut constraints, b, a, |b, a| {
            b.name == a.name
                && same_columns(&survivors, &b.columns, &a.columns)
                && same_kind(b, a, before, after, ctx)
        });
    }

    if let Some(warning) = column_order_change(table, &columns) {
        warnings.push(warning);
    }

    TableDiff {
        before,
        after,
        columns,
        indexes,
        constraints,
        warnings,
    }
}

fn push_identity_warnings(
    warnings: &mut Vec<DiffWarning>,
    table: Option<&TableName>,
    entity: EntityKind,
    problems: Vec<IdentityWarning>,
) {
    warnings.extend(problems.into_iter().map(|problem| DiffWarning::Identity {
        table: table.cloned(),
        entity,
        problem,
    }));
}

fn push_dependent<'a, T>(
    out: &mut Vec<DependentChange<'a, T>>,
    before: Option<&'a T>,
    after: Option<&'a T>,
    equivalent: impl Fn(&T, &T) -> bool,
) {
    match (before, after) {
        (Some(b), Some(a)) if equivalent(b, a) => out.push(DependentChange::Unchanged {
            before: b,
            after: a,
        }),
        (Some(b), Some(a)) => {
            out.push(DependentChange::Removed(b));
            out.push(DependentChange::Added(a));
        }
        (Some(b), None) => out.push(DependentChange::Removed(b)),
        (None, Some(a)) => out.push(DependentChange::Added(a)),
        (None, None) => {}
    }
}

/// Records a dangling reference and returns `false` when `missing` is set.
fn is_live(
    table: &TableDescriptor,
    entity: &str,
    missing: Option<String>,
    side: Side,
    warnings: &mut Vec<DiffWarning>,
) -> bool {
    match missing {
        Some(missing) => {
            warnings.push(DiffWarning::DanglingReference {
                table: table.name.clone(),
                entity: entity.to_string(),
                missing,
                side,
            });
            false
        }
        None => true,
    }
}

fn missing_column(table: &TableDescriptor, columns: &[String]) -> Option<String> {
    columns
        .iter()
        .find(|c| table.find_column(c).is_none())
        .cloned()
}

/// First column or table a constraint names that does not exist. Foreign
/// key targets are only checked when the target can be looked up.
fn missing_reference(
    table: &TableDescriptor,
    db: Option<&DatabaseDescriptor>,
    constraint: &ConstraintDescriptor,
) -> Option<String> {
    if let Some(missing) = missing_column(table, &constraint.columns) {
        return Some(missing);
    }
    let ConstraintKind::ForeignKey {
        ref_table,
        ref_columns,
        ..
    } = &constraint.kind
    else {
        return None;
    };
    if ref_table == &table.name {
        return missing_column(table, ref_columns).map(|c| format!("{ref_table}.{c}"));
    }
    let db = db?;
    match db.find_table(ref_table) {
        Some(target) => missing_column(target, ref_columns).map(|c| format!("{ref_table}.{c}")),
        None => Some(ref_table.to_string()),
    }
}

/// Maps `before` through the surviving columns and compares with `after`.
fn same_columns(survivors: &BTreeMap<&str, &str>, before: &[String], after: &[String]) -> bool {
    before.len() == after.len()
        && before
            .iter()
            .zip(after)
            .all(|(b, a)| survivors.get(b.as_str()) == Some(&a.as_str()))
}

fn same_kind(
    before: &ConstraintDescriptor,
    after: &ConstraintDescriptor,
    before_table: &TableDescriptor,
    after_table: &TableDescriptor,
    ctx: DiffContext<'_>,
) -> bool {
    match (&before.kind, &after.kind) {
        (ConstraintKind::PrimaryKey, ConstraintKind::PrimaryKey)
        | (ConstraintKind::Unique, ConstraintKind::Unique) => true,
        (ConstraintKind::Check { expression: b }, ConstraintKind::Check { expression: a }) => {
            b.trim() == a.trim()
        }
        (
            ConstraintKind::ForeignKey {
                ref_table: b_table,
                ref_columns: b_cols,
                on_delete: b_delete,
                on_update: b_update,
            },
            ConstraintKind::ForeignKey {
                ref_table: a_table,
                ref_columns: a_cols,
                on_delete: a_delete,
                on_update: a_update,
            },
        ) => {
            let b_target = resolve_table(before_table, ctx.before, b_table);
            let a_target = resolve_table(after_table, ctx.after, a_table);

            let same_target = match (
                b_target.and_then(|t| t.pairing_id.as_ref()),
                a_target.and_then(|t| t.pairing_id.as_ref()),
            ) {
                (Some(b), Some(a)) => b == a,
                _ => b_table == a_table,
            };
            let same_ref_columns = match (
                column_ids(b_target, b_cols),
                column_ids(a_target, a_cols),
            ) {
                (Some(b), Some(a)) => b == a,
                _ => b_cols == a_cols,
            };

            same_target
                && same_ref_columns
                && action(*b_delete) == action(*a_delete)
                && action(*b_update) == action(*a_update)
        }
        _ => false,
    }
}

fn action(action: Option<ForeignKeyAction>) -> ForeignKeyAction {
    action.unwrap_or(ForeignKeyAction::NoAction)
}

fn resolve_table<'a>(
    own: &'a TableDescriptor,
    db: Option<&'a DatabaseDescriptor>,
    name: &TableName,
) -> Option<&'a TableDescriptor> {
    if name == &own.name {
        return Some(own);
    }
    db.and_then(|db| db.find_table(name))
}

fn column_ids<'a>(
    table: Option<&'a TableDescriptor>,
    columns: &[String],
) -> Option<Vec<&'a PairingId>> {
    let table = table?;
    columns
        .iter()
        .map(|c| table.find_column(c).and_then(|c| c.pairing_id.as_ref()))
        .collect()
}

fn column_order_change(table: &TableName, columns: &[ColumnChange<'_>]) -> Option<DiffWarning> {
    let mut surviving: Vec<(&ColumnDescriptor, &ColumnDescriptor)> = columns
        .iter()
        .filter_map(|c| match c {
            ColumnChange::Unchanged { before, after }
            | ColumnChange::Modified { before, after, .. } => Some((*before, *after)),
            _ => None,
        })
        .collect();
    if surviving.windows(2).all(|w| w[0].1.ordinal < w[1].1.ordinal) {
        return None;
    }

    let before_order = surviving.iter().map(|(b, _)| b.name.clone()).collect();
    surviving.sort_by_key(|(_, a)| a.ordinal);
    let after_order = surviving.iter().map(|(_, a)| a.name.clone()).collect();
    Some(DiffWarning::ColumnOrderChanged {
        table: table.clone(),
        before: before_order,
        after: after_order,
    })
}

// ================================================================
// Database-level diff
// ================================================================

/// Pairs the tables of two databases and diffs every pairing.
#[must_use]
pub fn diff_database<'a>(
    before: &'a DatabaseDescriptor,
    after: &'a DatabaseDescriptor,
) -> DatabaseDiff<'a> {
    let mut warnings = Vec::new();
    let matching = match_entities(&before.tables, &after.tables);
    push_identity_warnings(&mut warnings, None, EntityKind::Table, matching.warnings);

    let ctx = DiffContext {
        before: Some(before),
        after: Some(after),
    };
    let tables = matching
        .pairs
        .into_iter()
        .filter_map(|pair| match (pair.before, pair.after) {
            (Some(b), Some(a)) => Some(TableChange::Paired(diff_table_in(b, a, ctx))),
            (Some(b), None) => Some(TableChange::Removed(b)),
            (None, Some(a)) => Some(TableChange::Added(a)),
            (None, None) => None,
        })
        .collect();

    DatabaseDiff {
        before,
        after,
        tables,
        warnings,
    }
}
