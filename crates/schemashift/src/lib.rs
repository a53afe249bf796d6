//! # schemashift
//!
//! Computes the DDL that turns one snapshot of a relational schema into
//! another, for PostgreSQL, MySQL, SQL Server and SQLite.
//!
//! The crate is a pure function of its inputs: it never connects to a
//! database. The pipeline is:
//!
//! - [`identity`]: pair before/after entities by stable pairing ids, so a
//!   renamed column stays the same column
//! - [`diff`]: classify every table, column, index and constraint as
//!   unchanged, added, removed or modified
//! - [`plan`]: order abstract operations for one dialect's
//!   [`DialectCapabilities`], falling back to a table rebuild when an
//!   engine cannot alter in place
//! - [`dialect`]: render operations to statement text
//!
//! ## Example
//!
//! ```rust
//! use schemashift::{compute_alter_script, AlterOptions, Dialect};
//! use schemashift::descriptor::{ColumnDescriptor, TableDescriptor, TableName};
//! use schemashift::types::DataType;
//!
//! let before = TableDescriptor::new(TableName::new("t1"))
//!     .paired("t1")
//!     .column(ColumnDescriptor::new("id", DataType::Integer).not_null().paired("c1"))
//!     .column(ColumnDescriptor::new("col_std", DataType::Integer).paired("c2"));
//!
//! // Same column, new name.
//! let mut after = before.clone();
//! after.columns[1].name = "col_renamed".into();
//!
//! let script = compute_alter_script(
//!     &before,
//!     &after,
//!     &AlterOptions::default(),
//!     None,
//!     Dialect::Sqlite,
//! )
//! .unwrap();
//! assert_eq!(
//!     script.statements,
//!     vec![r#"ALTER TABLE "t1" RENAME COLUMN "col_std" TO "col_renamed""#]
//! );
//! ```

pub mod descriptor;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod identity;
pub mod operation;
pub mod plan;
pub mod script;
pub mod types;

pub use descriptor::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, DatabaseDescriptor, IndexDescriptor,
    TableDescriptor, TableName,
};
pub use dialect::{Dialect, DialectCapabilities, OperationKind, SqlRenderer};
pub use diff::{diff_database, diff_table, DatabaseDiff, DiffWarning, TableDiff};
pub use error::{AlterError, RenderError, Result};
pub use identity::{match_entities, PairingId};
pub use operation::{AlterOperation, PlanStep};
pub use plan::{plan, plan_database, Plan, SkippedChange};
pub use script::{
    compute_alter_script, compute_alter_script_with, compute_database_script, render_plan,
    AlterOptions, AlterScript, RenderFailure,
};
pub use types::{DataType, DefaultValue, ForeignKeyAction};
