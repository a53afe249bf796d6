//! Alter-script entry points.
//!
//! Glues the pipeline together: diff the snapshots, plan the operations
//! for the target dialect's capabilities, render each step.
//!
//! ```
//! use schemashift::{compute_alter_script, AlterOptions, Dialect};
//! use schemashift::descriptor::{ColumnDescriptor, TableDescriptor, TableName};
//! use schemashift::types::DataType;
//!
//! let before = TableDescriptor::new(TableName::new("users"))
//!     .paired("users")
//!     .column(ColumnDescriptor::new("id", DataType::Integer).not_null().paired("users.id"));
//! let after = before
//!     .clone()
//!     .column(ColumnDescriptor::new("email", DataType::Text).paired("users.email"));
//!
//! let script = compute_alter_script(
//!     &before,
//!     &after,
//!     &AlterOptions::default(),
//!     None,
//!     Dialect::Postgres,
//! )
//! .unwrap();
//! assert_eq!(
//!     script.statements,
//!     vec![r#"ALTER TABLE "users" ADD COLUMN "email" TEXT"#]
//! );
//! ```

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::descriptor::{DatabaseDescriptor, TableDescriptor, TableName};
use crate::dialect::{Dialect, DialectCapabilities, OperationKind, SqlRenderer};
use crate::diff::{diff_database, diff_table_in, DiffContext, DiffWarning, TableChange};
use crate::error::{AlterError, RenderError, Result};
use crate::operation::PlanStep;
use crate::plan::{plan, plan_database, Plan, SkippedChange};

/// Switches that change what the planner is allowed to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlterOptions {
    /// Keep removed columns instead of dropping them.
    #[serde(alias = "noDropColumn")]
    pub no_drop_column: bool,
    /// Keep removed tables instead of dropping them.
    #[serde(alias = "noDropTable")]
    pub no_drop_table: bool,
    /// Allow lossy fills during rebuilds, such as substituting a type's
    /// zero value for NULL in a column that becomes NOT NULL.
    #[serde(alias = "usePermissiveActions")]
    pub use_permissive_actions: bool,
}

impl AlterOptions {
    /// Options with every switch off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON. Both `snake_case` and `camelCase` keys
    /// are accepted; missing keys are off.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Keep removed columns.
    #[must_use]
    pub const fn with_no_drop_column(mut self) -> Self {
        self.no_drop_column = true;
        self
    }

    /// Keep removed tables.
    #[must_use]
    pub const fn with_no_drop_table(mut self) -> Self {
        self.no_drop_table = true;
        self
    }

    /// Allow lossy fills during rebuilds.
    #[must_use]
    pub const fn with_permissive_actions(mut self) -> Self {
        self.use_permissive_actions = true;
        self
    }
}

/// A statement that could not be rendered and was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFailure {
    /// Table of the failing operation.
    pub table: TableName,
    /// The failing operation.
    pub operation: OperationKind,
    /// Why it failed.
    pub error: RenderError,
}

/// Result of an alter-script computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlterScript {
    /// Statements to execute, in order, without trailing separators.
    pub statements: Vec<String>,
    /// Warnings raised while pairing entities.
    pub warnings: Vec<DiffWarning>,
    /// Destructive changes suppressed by the options.
    pub skipped: Vec<SkippedChange>,
    /// Statements left out because they could not be rendered. Only
    /// statements nothing else depends on end up here.
    pub failures: Vec<RenderFailure>,
}

impl AlterScript {
    /// Returns `true` if there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The statements joined into one script, each terminated by `;`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.statements
            .iter()
            .map(|s| format!("{s};\n"))
            .collect()
    }
}

/// Computes the statements turning `before` into `after` on `dialect`.
///
/// `after_db` is the database `after` belongs to. When given, foreign
/// keys of other tables that reference this one are dropped and
/// re-created around changes to the referenced columns, and foreign-key
/// targets are compared by identity rather than by name.
pub fn compute_alter_script(
    before: &TableDescriptor,
    after: &TableDescriptor,
    options: &AlterOptions,
    after_db: Option<&DatabaseDescriptor>,
    dialect: Dialect,
) -> Result<AlterScript> {
    compute_alter_script_with(
        before,
        after,
        options,
        after_db,
        dialect.capabilities(),
        dialect.renderer(),
    )
}

/// [`compute_alter_script`] with explicit capabilities, for engine
/// versions whose flags differ from the built-in ones.
pub fn compute_alter_script_with(
    before: &TableDescriptor,
    after: &TableDescriptor,
    options: &AlterOptions,
    after_db: Option<&DatabaseDescriptor>,
    caps: &DialectCapabilities,
    renderer: &dyn SqlRenderer,
) -> Result<AlterScript> {
    let ctx = DiffContext {
        before: None,
        after: after_db,
    };
    let diff = diff_table_in(before, after, ctx);
    let plan = plan(&diff, caps, options, after_db)?;
    let mut script = render_plan(&plan, renderer)?;
    script.warnings = diff.warnings;
    log_warnings(&script.warnings);
    Ok(script)
}

/// Computes the statements turning database `before` into `after`.
pub fn compute_database_script(
    before: &DatabaseDescriptor,
    after: &DatabaseDescriptor,
    options: &AlterOptions,
    dialect: Dialect,
) -> Result<AlterScript> {
    let diff = diff_database(before, after);
    let plan = plan_database(&diff, dialect.capabilities(), options)?;
    let mut script = render_plan(&plan, dialect.renderer())?;

    script.warnings = diff.warnings.clone();
    for change in &diff.tables {
        if let TableChange::Paired(table) = change {
            script.warnings.extend(table.warnings.iter().cloned());
        }
    }
    log_warnings(&script.warnings);
    Ok(script)
}

/// Renders every step of a plan.
///
/// A step that cannot be rendered aborts with [`AlterError::Render`] if
/// later steps depend on it; otherwise it is recorded in
/// [`AlterScript::failures`] and the rest of the script is kept.
pub fn render_plan(plan: &Plan, renderer: &dyn SqlRenderer) -> Result<AlterScript> {
    let mut script = AlterScript {
        skipped: plan.skipped.clone(),
        ..AlterScript::default()
    };

    for phased in &plan.steps {
        let rendered = match &phased.step {
            PlanStep::Single(op) => renderer.render_operation(op),
            PlanStep::Batch { table, operations } => renderer.render_batch(table, operations),
        };
        match rendered {
            Ok(statements) => {
                for statement in &statements {
                    trace!(sql = %statement, "rendered statement");
                }
                script.statements.extend(statements);
            }
            Err(error) if !phased.phase.is_prerequisite() => {
                for op in phased.step.operations() {
                    warn!(table = %op.table(), ?error, "statement left out");
                    script.failures.push(RenderFailure {
                        table: op.table().clone(),
                        operation: op.kind(),
                        error: error.clone(),
                    });
                }
            }
            Err(error) => return Err(AlterError::Render(error)),
        }
    }
    Ok(script)
}

fn log_warnings(warnings: &[DiffWarning]) {
    for warning in warnings {
        warn!(?warning, "schema diff warning");
    }
}
