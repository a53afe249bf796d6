//! Operation planner.
//!
//! Turns a [`TableDiff`] (or a [`DatabaseDiff`]) into an ordered list of
//! abstract operations. One algorithm serves every dialect: the planner
//! consults [`DialectCapabilities`] to decide between an in-place
//! operation, an incremental fallback and a full table rebuild.
//!
//! Statement order follows a fixed sequence of [`Phase`]s. Dependents
//! (foreign keys, constraints, indexes) are dropped first and re-created
//! last from the after shape; within a table columns are dropped, then
//! renamed, then altered, then added.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::descriptor::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, DatabaseDescriptor, TableDescriptor,
    TableName,
};
use crate::dialect::{
    AutoIncrementStyle, BatchMode, ColumnAlterStyle, DefaultStyle, DialectCapabilities,
    OperationKind,
};
use crate::diff::{
    ColumnChange, ColumnDelta, DatabaseDiff, DependentChange, TableChange, TableDiff,
};
use crate::error::{AlterError, Result};
use crate::identity::counterpart;
use crate::operation::{
    AlterColumnOp, AlterOperation, ColumnOp, ConstraintOp, CopyColumn, CopyExpr, FillNullsOp,
    IndexOp, PlanStep, RebuildTableOp, RenameColumnOp, RenameTableOp,
};
use crate::script::AlterOptions;

/// Suffix of the shadow table created by a rebuild.
pub const REBUILD_SUFFIX: &str = "__rebuild";

/// Suffix of the temporary name used to break column rename cycles.
pub const TEMP_SUFFIX: &str = "__tmp";

/// Ordering phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Drop foreign keys, constraints, indexes and defaults that block a
    /// later change.
    DropDependents,
    /// Drop removed tables.
    DropTables,
    /// Rename tables.
    RenameTables,
    /// Drop removed columns.
    DropColumns,
    /// Rename columns.
    RenameColumns,
    /// Change column type, nullability and default.
    AlterColumns,
    /// Add new columns.
    AddColumns,
    /// Create new tables.
    CreateTables,
    /// Rebuild tables that cannot be altered in place.
    Rebuilds,
    /// Re-create indexes and non-foreign-key constraints.
    AddDependents,
    /// Re-create foreign keys.
    AddForeignKeys,
}

impl Phase {
    /// Returns `true` if later statements may rely on this phase's
    /// statements having run.
    #[must_use]
    pub const fn is_prerequisite(self) -> bool {
        !matches!(
            self,
            Self::DropTables | Self::AddDependents | Self::AddForeignKeys
        )
    }
}

/// A destructive change suppressed by [`AlterOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkippedChange {
    /// A removed column was kept.
    DropColumn {
        /// Owning table.
        table: TableName,
        /// The kept column.
        column: String,
    },
    /// A removed table was kept.
    DropTable {
        /// The kept table.
        table: TableName,
    },
}

/// A plan step together with its phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhasedStep {
    /// Phase the step belongs to.
    pub phase: Phase,
    /// The step.
    pub step: PlanStep,
}

/// Ordered operations plus the changes deliberately left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    /// Steps in execution order.
    pub steps: Vec<PhasedStep>,
    /// Suppressed destructive changes.
    pub skipped: Vec<SkippedChange>,
}

impl Plan {
    /// Returns `true` if there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All operations in execution order, batches flattened.
    pub fn operations(&self) -> impl Iterator<Item = &AlterOperation> {
        self.steps.iter().flat_map(|s| s.step.operations())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Planned {
    phase: Phase,
    rank: u8,
    op: AlterOperation,
}

// Ranks inside DropDependents and AddDependents.
const RANK_FOREIGN_KEY: u8 = 0;
const RANK_CONSTRAINT: u8 = 1;
const RANK_INDEX: u8 = 2;
const RANK_DEFAULT: u8 = 3;

/// Plans one table.
///
/// `context` is the database the after table belongs to; foreign keys of
/// other tables found there are dropped and re-created around changes to
/// the columns they reference.
pub fn plan(
    diff: &TableDiff<'_>,
    caps: &DialectCapabilities,
    options: &AlterOptions,
    context: Option<&DatabaseDescriptor>,
) -> Result<Plan> {
    let table = TablePlanner::new(diff, caps, options, context, None).run()?;
    Ok(finish(table.ops, table.skipped, caps))
}

/// Plans a whole database: created, dropped, renamed and altered tables.
pub fn plan_database(
    diff: &DatabaseDiff<'_>,
    caps: &DialectCapabilities,
    options: &AlterOptions,
) -> Result<Plan> {
    let mut ops = Vec::new();
    let mut skipped = Vec::new();
    let removed: BTreeSet<&TableName> = diff
        .tables
        .iter()
        .filter_map(|t| match t {
            TableChange::Removed(table) => Some(&table.name),
            _ => None,
        })
        .collect();

    for change in &diff.tables {
        match change {
            TableChange::Added(table) => ops.extend(create_table(table, caps)?),
            TableChange::Removed(table) => {
                if options.no_drop_table {
                    skipped.push(SkippedChange::DropTable {
                        table: table.name.clone(),
                    });
                    continue;
                }
                if caps.drop_constraint {
                    // Foreign keys between dropped tables would block the
                    // drop of the referenced one.
                    for fk in table.foreign_keys().filter(|fk| fk.name.is_some()) {
                        if let ConstraintKind::ForeignKey { ref_table, .. } = &fk.kind {
                            if ref_table != &table.name && removed.contains(ref_table) {
                                ops.push(Planned {
                                    phase: Phase::DropDependents,
                                    rank: RANK_FOREIGN_KEY,
                                    op: AlterOperation::DropConstraint(ConstraintOp {
                                        table: table.name.clone(),
                                        constraint: fk.clone(),
                                    }),
                                });
                            }
                        }
                    }
                }
                ops.push(Planned {
                    phase: Phase::DropTables,
                    rank: 0,
                    op: AlterOperation::DropTable(table.name.clone()),
                });
            }
            TableChange::Paired(table_diff) => {
                let context = Some(diff.after);
                let planner =
                    TablePlanner::new(table_diff, caps, options, context, Some(diff.before));
                let table = planner.run()?;
                ops.extend(table.ops);
                skipped.extend(table.skipped);
            }
        }
    }

    // Cross-table drops can be planned by both tables involved.
    let mut unique: Vec<Planned> = Vec::with_capacity(ops.len());
    for op in ops {
        if !unique.contains(&op) {
            unique.push(op);
        }
    }
    Ok(finish(unique, skipped, caps))
}

fn create_table(table: &TableDescriptor, caps: &DialectCapabilities) -> Result<Vec<Planned>> {
    check_auto_increment(table, caps, OperationKind::CreateTable)?;
    let mut ops = Vec::new();
    let mut shape = table.clone();
    shape.indexes.clear();
    if !caps.inline_foreign_keys() {
        shape.constraints.retain(|c| !c.is_foreign_key());
        for fk in table.foreign_keys() {
            ops.push(Planned {
                phase: Phase::AddForeignKeys,
                rank: RANK_FOREIGN_KEY,
                op: AlterOperation::AddConstraint(ConstraintOp {
                    table: table.name.clone(),
                    constraint: fk.clone(),
                }),
            });
        }
    }
    for index in &table.indexes {
        ops.push(Planned {
            phase: Phase::AddDependents,
            rank: RANK_INDEX,
            op: AlterOperation::AddIndex(IndexOp {
                table: table.name.clone(),
                index: index.clone(),
            }),
        });
    }
    ops.insert(
        0,
        Planned {
            phase: Phase::CreateTables,
            rank: 0,
            op: AlterOperation::CreateTable(shape),
        },
    );
    Ok(ops)
}

/// Engines that only auto-increment an `INTEGER PRIMARY KEY` need the
/// column to be the whole primary key.
fn check_auto_increment(
    shape: &TableDescriptor,
    caps: &DialectCapabilities,
    operation: OperationKind,
) -> Result<()> {
    if caps.auto_increment != AutoIncrementStyle::InlinePrimaryKey {
        return Ok(());
    }
    let pk = shape.primary_key();
    for col in shape.columns.iter().filter(|c| c.auto_increment) {
        let sole_key = pk.is_some_and(|pk| pk.columns.len() == 1 && pk.columns[0] == col.name);
        if !sole_key {
            return Err(AlterError::UnsupportedOperation {
                table: shape.name.clone(),
                operation,
                reason: format!(
                    "auto-increment column '{}' must be the single-column primary key",
                    col.name
                ),
            });
        }
    }
    Ok(())
}

/// Sorts by phase (stable), then merges adjacent batchable operations.
fn finish(mut ops: Vec<Planned>, skipped: Vec<SkippedChange>, caps: &DialectCapabilities) -> Plan {
    ops.sort_by_key(|p| (p.phase, p.rank));

    let mut steps: Vec<PhasedStep> = Vec::with_capacity(ops.len());
    for Planned { phase, op, .. } in ops {
        if let Some(last) = steps.last_mut() {
            if last.phase == phase && batches_with(&last.step, &op, caps) {
                if let PlanStep::Single(first) = &last.step {
                    let batch = PlanStep::Batch {
                        table: first.table().clone(),
                        operations: vec![first.clone()],
                    };
                    last.step = batch;
                }
                if let PlanStep::Batch { operations, .. } = &mut last.step {
                    operations.push(op);
                }
                continue;
            }
        }
        steps.push(PhasedStep {
            phase,
            step: PlanStep::Single(op),
        });
    }

    Plan { steps, skipped }
}

fn batches_with(step: &PlanStep, op: &AlterOperation, caps: &DialectCapabilities) -> bool {
    let Some(last) = step.operations().last() else {
        return false;
    };
    if !caps.can_batch(op.kind()) || !caps.can_batch(last.kind()) || last.table() != op.table() {
        return false;
    }
    match caps.batching {
        BatchMode::None => false,
        BatchMode::SameKind => last.kind() == op.kind(),
        BatchMode::Mixed => true,
    }
}

// ================================================================
// Per-table planning
// ================================================================

struct TablePlanner<'d, 'a> {
    diff: &'d TableDiff<'a>,
    caps: &'d DialectCapabilities,
    options: &'d AlterOptions,
    context: Option<&'d DatabaseDescriptor>,
    /// The before database, in database plans. Other tables may be
    /// renamed or gain foreign keys there.
    previous: Option<&'d DatabaseDescriptor>,
    ops: Vec<Planned>,
    skipped: Vec<SkippedChange>,
    /// First operation the dialect cannot express in place.
    needs_rebuild: Option<OperationKind>,
    /// Removed columns kept because of `no_drop_column`.
    kept: Vec<&'a ColumnDescriptor>,
    /// Before names of columns whose dependents must be re-created.
    disturbed: BTreeSet<&'a str>,
    /// After names of columns that are retyped or dropped and re-added.
    redefined: BTreeSet<&'a str>,
}

impl<'d, 'a> TablePlanner<'d, 'a> {
    fn new(
        diff: &'d TableDiff<'a>,
        caps: &'d DialectCapabilities,
        options: &'d AlterOptions,
        context: Option<&'d DatabaseDescriptor>,
        previous: Option<&'d DatabaseDescriptor>,
    ) -> Self {
        Self {
            diff,
            caps,
            options,
            context,
            previous,
            ops: Vec::new(),
            skipped: Vec::new(),
            needs_rebuild: None,
            kept: Vec::new(),
            disturbed: BTreeSet::new(),
            redefined: BTreeSet::new(),
        }
    }

    /// Name of the table before its rename phase.
    fn old_name(&self) -> &'a TableName {
        &self.diff.before.name
    }

    /// Name of the table from the rename phase on.
    fn name(&self) -> &'a TableName {
        &self.diff.after.name
    }

    fn push(&mut self, phase: Phase, rank: u8, op: AlterOperation) {
        self.ops.push(Planned { phase, rank, op });
    }

    /// Records `kind` as needing a rebuild when the dialect lacks it.
    fn require(&mut self, kind: OperationKind) -> bool {
        if self.caps.supports(kind) {
            return true;
        }
        if self.needs_rebuild.is_none() {
            debug!(table = %self.name(), ?kind, "operation not supported in place");
            self.needs_rebuild = Some(kind);
        }
        false
    }

    fn run(mut self) -> Result<Self> {
        if self.diff.is_empty() {
            return Ok(self);
        }

        if self.diff.is_renamed() {
            if !self.caps.supports(OperationKind::RenameTable) {
                return Err(AlterError::UnsupportedOperation {
                    table: self.old_name().clone(),
                    operation: OperationKind::RenameTable,
                    reason: "the dialect cannot rename tables".to_string(),
                });
            }
            self.push(
                Phase::RenameTables,
                0,
                AlterOperation::RenameTable(RenameTableOp {
                    from: self.old_name().clone(),
                    to: self.name().clone(),
                }),
            );
        }

        self.plan_columns()?;
        self.plan_indexes();
        self.plan_constraints();

        if let Some(kind) = self.needs_rebuild {
            self.plan_rebuild(kind)?;
        }
        self.plan_referencing_foreign_keys();
        Ok(self)
    }

    fn plan_columns(&mut self) -> Result<()> {
        let mut renames = Vec::new();
        let diff = self.diff;

        for change in &diff.columns {
            match *change {
                ColumnChange::Unchanged { .. } => {}
                ColumnChange::Added(col) => self.add_column(col),
                ColumnChange::Removed(col) => self.drop_column(col)?,
                ColumnChange::Modified {
                    before,
                    after,
                    delta,
                } => {
                    if delta.name {
                        if self.caps.supports(OperationKind::RenameColumn) {
                            if self.caps.rename_breaks_dependents {
                                self.disturbed.insert(before.name.as_str());
                            }
                            renames.push((before.name.clone(), after.name.clone()));
                        } else {
                            debug!(
                                table = %self.name(),
                                from = %before.name,
                                to = %after.name,
                                "rename expressed as drop and add"
                            );
                            self.disturbed.insert(before.name.as_str());
                            self.redefined.insert(after.name.as_str());
                            self.drop_column(before)?;
                            self.add_column(after);
                            continue;
                        }
                    }
                    self.alter_column(before, after, delta)?;
                }
            }
        }

        let table = self.name().clone();
        for (from, to) in order_renames(diff, renames) {
            self.push(
                Phase::RenameColumns,
                0,
                AlterOperation::RenameColumn(RenameColumnOp {
                    table: table.clone(),
                    from,
                    to,
                }),
            );
        }
        Ok(())
    }

    fn add_column(&mut self, col: &ColumnDescriptor) {
        let kind = if col.auto_increment {
            OperationKind::AddAutoIncrementColumn
        } else if col.not_null && col.default.is_none() {
            OperationKind::AddNotNullColumn
        } else {
            OperationKind::AddColumn
        };
        if self.require(kind) {
            self.push(
                Phase::AddColumns,
                0,
                AlterOperation::AddColumn(ColumnOp {
                    table: self.name().clone(),
                    column: col.clone(),
                }),
            );
        }
    }

    fn drop_column(&mut self, col: &'a ColumnDescriptor) -> Result<()> {
        if self.options.no_drop_column {
            if self.diff.after.find_column(&col.name).is_some() {
                return Err(AlterError::UnsupportedOperation {
                    table: self.name().clone(),
                    operation: OperationKind::DropColumn,
                    reason: format!(
                        "column '{}' must be dropped to reuse its name, \
                         but dropping columns is disabled",
                        col.name
                    ),
                });
            }
            self.skipped.push(SkippedChange::DropColumn {
                table: self.name().clone(),
                column: col.name.clone(),
            });
            self.kept.push(col);
            return Ok(());
        }

        if self.require(OperationKind::DropColumn) {
            if self.caps.default_style == DefaultStyle::NamedConstraint && col.default.is_some() {
                self.drop_default_first(col);
            }
            self.push(
                Phase::DropColumns,
                0,
                AlterOperation::DropColumn(ColumnOp {
                    table: self.name().clone(),
                    column: col.clone(),
                }),
            );
        }
        Ok(())
    }

    /// Drops a named default constraint before its column is touched.
    fn drop_default_first(&mut self, col: &ColumnDescriptor) {
        let mut without = col.clone();
        without.default = None;
        self.push(
            Phase::DropDependents,
            RANK_DEFAULT,
            AlterOperation::AlterColumnDefault(AlterColumnOp {
                table: self.old_name().clone(),
                before: col.clone(),
                after: without,
            }),
        );
    }

    fn alter_column(
        &mut self,
        before: &'a ColumnDescriptor,
        after: &'a ColumnDescriptor,
        delta: ColumnDelta,
    ) -> Result<()> {
        let table = self.name().clone();
        let op = AlterColumnOp {
            table,
            before: before.clone(),
            after: after.clone(),
        };

        if delta.data_type {
            self.require(OperationKind::AlterColumnType);
            self.disturbed.insert(before.name.as_str());
            self.redefined.insert(after.name.as_str());
        }
        if delta.nullability {
            self.require(OperationKind::AlterColumnNullability);
        }
        if delta.default {
            self.require(OperationKind::AlterColumnDefault);
        }
        if delta.auto_increment {
            self.require(OperationKind::AlterColumnAutoIncrement);
        }
        if self.needs_rebuild.is_some() {
            return Ok(());
        }

        let tightened = delta.nullability && after.not_null && !before.not_null;
        let fill = if tightened && self.options.use_permissive_actions {
            let value = not_null_fill(self.name(), after, true)?;
            Some(AlterOperation::FillNulls(FillNullsOp {
                table: self.name().clone(),
                column: after.name.clone(),
                value,
            }))
        } else {
            None
        };

        match self.caps.column_alter_style {
            ColumnAlterStyle::Separate => {
                if delta.data_type || delta.auto_increment {
                    self.push(Phase::AlterColumns, 0, AlterOperation::AlterColumnType(op.clone()));
                }
                if let Some(fill) = fill {
                    self.push(Phase::AlterColumns, 1, fill);
                }
                if delta.nullability {
                    self.push(
                        Phase::AlterColumns,
                        2,
                        AlterOperation::AlterColumnNullability(op.clone()),
                    );
                }
                if delta.default {
                    self.push(Phase::AlterColumns, 3, AlterOperation::AlterColumnDefault(op));
                }
            }
            ColumnAlterStyle::TypeWithNullability => {
                if let Some(fill) = fill {
                    self.push(Phase::AlterColumns, 0, fill);
                }
                let restated = delta.data_type || delta.nullability || delta.auto_increment;
                if restated {
                    self.push(Phase::AlterColumns, 0, AlterOperation::AlterColumnType(op.clone()));
                }
                let default_blocks = self.caps.default_style == DefaultStyle::NamedConstraint
                    && restated
                    && before.default.is_some();
                if default_blocks {
                    // The default constraint is dropped up front and
                    // re-created from the after shape once the column
                    // is restated.
                    self.drop_default_first(before);
                    if after.default.is_some() {
                        let mut bare = after.clone();
                        bare.default = None;
                        bare.default_constraint = None;
                        self.push(
                            Phase::AddDependents,
                            RANK_DEFAULT,
                            AlterOperation::AlterColumnDefault(AlterColumnOp {
                                table: self.name().clone(),
                                before: bare,
                                after: after.clone(),
                            }),
                        );
                    }
                } else if delta.default {
                    self.push(Phase::AlterColumns, 3, AlterOperation::AlterColumnDefault(op));
                }
            }
            ColumnAlterStyle::FullDefinition => {
                if let Some(fill) = fill {
                    self.push(Phase::AlterColumns, 0, fill);
                }
                let op = if delta.data_type || delta.auto_increment {
                    AlterOperation::AlterColumnType(op)
                } else if delta.nullability {
                    AlterOperation::AlterColumnNullability(op)
                } else {
                    AlterOperation::AlterColumnDefault(op)
                };
                self.push(Phase::AlterColumns, 0, op);
            }
        }
        Ok(())
    }

    fn plan_indexes(&mut self) {
        let diff = self.diff;
        for change in &diff.indexes {
            let (drop, add) = match *change {
                DependentChange::Removed(index) => (Some(index), None),
                DependentChange::Added(index) => (None, Some(index)),
                DependentChange::Unchanged { before, after } => {
                    if before.columns.iter().any(|c| self.disturbed.contains(c.as_str())) {
                        (Some(before), Some(after))
                    } else {
                        (None, None)
                    }
                }
            };
            if let Some(index) = drop {
                if self.require(OperationKind::DropIndex) {
                    self.push(
                        Phase::DropDependents,
                        RANK_INDEX,
                        AlterOperation::DropIndex(IndexOp {
                            table: self.old_name().clone(),
                            index: index.clone(),
                        }),
                    );
                }
            }
            if let Some(index) = add {
                if self.require(OperationKind::AddIndex) {
                    self.push(
                        Phase::AddDependents,
                        RANK_INDEX,
                        AlterOperation::AddIndex(IndexOp {
                            table: self.name().clone(),
                            index: index.clone(),
                        }),
                    );
                }
            }
        }
    }

    fn plan_constraints(&mut self) {
        let diff = self.diff;
        for change in &diff.constraints {
            let (drop, add) = match *change {
                DependentChange::Removed(c) => (Some(c), None),
                DependentChange::Added(c) => (None, Some(c)),
                DependentChange::Unchanged { before, after } => {
                    if before.columns.iter().any(|c| self.disturbed.contains(c.as_str())) {
                        (Some(before), Some(after))
                    } else {
                        (None, None)
                    }
                }
            };
            if let Some(c) = drop {
                if c.name.is_none() {
                    // Nothing to address it by.
                    debug!(table = %self.name(), "unnamed constraint forces a rebuild");
                    self.needs_rebuild.get_or_insert(OperationKind::DropConstraint);
                } else if self.require(OperationKind::DropConstraint) {
                    self.push(
                        Phase::DropDependents,
                        constraint_rank(c),
                        AlterOperation::DropConstraint(ConstraintOp {
                            table: self.old_name().clone(),
                            constraint: c.clone(),
                        }),
                    );
                }
            }
            if let Some(c) = add {
                if self.require(OperationKind::AddConstraint) {
                    let phase = if c.is_foreign_key() {
                        Phase::AddForeignKeys
                    } else {
                        Phase::AddDependents
                    };
                    self.push(
                        phase,
                        constraint_rank(c),
                        AlterOperation::AddConstraint(ConstraintOp {
                            table: self.name().clone(),
                            constraint: c.clone(),
                        }),
                    );
                }
            }
        }
    }

    /// Replaces every operation on this table with one rebuild. Table
    /// renames are kept.
    fn plan_rebuild(&mut self, kind: OperationKind) -> Result<()> {
        let table = self.name().clone();
        if !self.caps.supports(OperationKind::RebuildTable) {
            return Err(AlterError::UnsupportedOperation {
                table,
                operation: kind,
                reason: "no in-place form exists and the dialect cannot rebuild tables"
                    .to_string(),
            });
        }
        debug!(table = %table, ?kind, "rebuilding table");

        let diff = self.diff;
        let permissive = self.options.use_permissive_actions;
        let mut copy = Vec::new();
        for change in &diff.columns {
            match *change {
                ColumnChange::Unchanged { before, after } => copy.push(CopyColumn {
                    target: after.name.clone(),
                    expr: CopyExpr::Column(before.name.clone()),
                    fallback: None,
                }),
                ColumnChange::Modified {
                    before,
                    after,
                    delta,
                } => {
                    let expr = if delta.data_type {
                        CopyExpr::Cast {
                            column: before.name.clone(),
                            data_type: after.data_type.clone(),
                        }
                    } else {
                        CopyExpr::Column(before.name.clone())
                    };
                    let fallback = if after.not_null && !before.not_null {
                        Some(not_null_fill(&table, after, permissive)?)
                    } else {
                        None
                    };
                    copy.push(CopyColumn {
                        target: after.name.clone(),
                        expr,
                        fallback,
                    });
                }
                ColumnChange::Added(after) => {
                    if after.not_null && after.default.is_none() && !after.auto_increment {
                        let fill = not_null_fill(&table, after, permissive)?;
                        copy.push(CopyColumn {
                            target: after.name.clone(),
                            expr: CopyExpr::Literal(fill),
                            fallback: None,
                        });
                    }
                }
                ColumnChange::Removed(before) => {
                    if self.kept.iter().any(|k| k.name == before.name) {
                        copy.push(CopyColumn {
                            target: before.name.clone(),
                            expr: CopyExpr::Column(before.name.clone()),
                            fallback: None,
                        });
                    }
                }
            }
        }

        let mut shape = diff.after.clone();
        shape.columns.extend(self.kept.iter().map(|c| (*c).clone()));
        shape.renumber();
        check_auto_increment(&shape, self.caps, kind)?;

        self.ops.retain(|p| matches!(p.op, AlterOperation::RenameTable(_)));
        self.push(
            Phase::Rebuilds,
            0,
            AlterOperation::RebuildTable(RebuildTableOp {
                shadow: table.with_name(format!("{}{REBUILD_SUFFIX}", table.name)),
                table,
                shape,
                copy,
            }),
        );
        Ok(())
    }

    /// Foreign keys of other tables that reference a redefined, dropped or
    /// rebuilt part of this table.
    fn plan_referencing_foreign_keys(&mut self) {
        let Some(context) = self.context else {
            return;
        };
        if !self.caps.drop_constraint || !self.caps.add_constraint {
            return;
        }
        let rebuilt = self.needs_rebuild.is_some();
        let target = self.name().clone();
        let after = self.diff.after;

        let mut planned = Vec::new();
        for (other, fk) in context.referencing_foreign_keys(&target) {
            let ConstraintKind::ForeignKey { ref_columns, .. } = &fk.kind else {
                continue;
            };
            let dangling = ref_columns.iter().any(|c| after.find_column(c).is_none());
            let affected = rebuilt
                || dangling
                || ref_columns.iter().any(|c| self.redefined.contains(c.as_str()));
            if !affected {
                continue;
            }
            if fk.name.is_none() {
                debug!(table = %other.name, "unnamed foreign key left in place");
                continue;
            }
            // Drops run before table renames, so they address the
            // referencing table and key as they exist before.
            let existing = match self.previous {
                None => Some((other.name.clone(), fk.clone())),
                Some(previous) => counterpart(&previous.tables, other).and_then(|table| {
                    counterpart(&table.constraints, fk)
                        .map(|old| (table.name.clone(), old.clone()))
                }),
            };
            let Some((old_table, old_fk)) = existing else {
                // New on the other table, which adds it itself.
                continue;
            };
            planned.push((old_table, old_fk, other.name.clone(), fk.clone(), !dangling));
        }

        for (old_table, old_fk, table, fk, re_add) in planned {
            self.push(
                Phase::DropDependents,
                RANK_FOREIGN_KEY,
                AlterOperation::DropConstraint(ConstraintOp {
                    table: old_table,
                    constraint: old_fk,
                }),
            );
            if re_add {
                self.push(
                    Phase::AddForeignKeys,
                    RANK_FOREIGN_KEY,
                    AlterOperation::AddConstraint(ConstraintOp {
                        table,
                        constraint: fk,
                    }),
                );
            }
        }
    }
}

fn constraint_rank(c: &ConstraintDescriptor) -> u8 {
    if c.is_foreign_key() {
        RANK_FOREIGN_KEY
    } else {
        RANK_CONSTRAINT
    }
}

/// Value copied into a column that becomes NOT NULL during a rebuild.
fn not_null_fill(
    table: &TableName,
    col: &ColumnDescriptor,
    permissive: bool,
) -> Result<crate::types::DefaultValue> {
    if let Some(ref default) = col.default {
        return Ok(default.clone());
    }
    let unsupported = |reason: &str| AlterError::UnsupportedOperation {
        table: table.clone(),
        operation: OperationKind::AlterColumnNullability,
        reason: format!("column '{}': {reason}", col.name),
    };
    if !permissive {
        return Err(unsupported(
            "rows holding NULL cannot be copied into a NOT NULL column without a default",
        ));
    }
    col.data_type
        .zero_value()
        .ok_or_else(|| unsupported("the column type has no zero value to substitute for NULL"))
}

/// Orders column renames so that no rename targets a name still in use.
/// Cycles are broken through a temporary name.
fn order_renames(
    diff: &TableDiff<'_>,
    mut pending: Vec<(String, String)>,
) -> Vec<(String, String)> {
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let free = pending
            .iter()
            .position(|(_, to)| !pending.iter().any(|(from, _)| from == to));
        match free {
            Some(i) => ordered.push(pending.remove(i)),
            None => {
                let (from, to) = pending.remove(0);
                let temp = temp_name(diff, &from);
                debug!(column = %from, temp = %temp, "breaking rename cycle");
                ordered.push((from, temp.clone()));
                pending.push((temp, to));
            }
        }
    }
    ordered
}

fn temp_name(diff: &TableDiff<'_>, base: &str) -> String {
    let taken = |name: &str| {
        diff.before.find_column(name).is_some() || diff.after.find_column(name).is_some()
    };
    let mut candidate = format!("{base}{TEMP_SUFFIX}");
    let mut n = 1;
    while taken(&candidate) {
        n += 1;
        candidate = format!("{base}{TEMP_SUFFIX}{n}");
    }
    candidate
}
