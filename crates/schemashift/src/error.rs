//! Error types for diffing, planning and rendering.

use serde::Serialize;

use crate::descriptor::TableName;
use crate::dialect::OperationKind;

/// Errors surfaced to the caller of the alter-script entry points.
#[derive(Debug, thiserror::Error)]
pub enum AlterError {
    /// A required change has no expressible form on the target dialect,
    /// neither incrementally nor through a table rebuild.
    #[error("Unsupported operation {operation:?} on table '{table}': {reason}")]
    UnsupportedOperation {
        /// Table being altered.
        table: TableName,
        /// The change that cannot be expressed.
        operation: OperationKind,
        /// Why no fallback applies.
        reason: String,
    },

    /// A statement could not be rendered and later statements depend on it.
    #[error("Cannot render prerequisite statement: {0}")]
    Render(#[from] RenderError),

    /// Snapshot JSON could not be ingested.
    #[error("Invalid snapshot: {0}")]
    Ingest(#[from] serde_json::Error),
}

/// An identifier that cannot be safely quoted for the target dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Cannot render identifier {identifier:?}: {reason}")]
pub struct RenderError {
    /// The offending identifier (may be empty).
    pub identifier: String,
    /// What is wrong with it.
    pub reason: String,
}

impl RenderError {
    /// Creates a render error.
    #[must_use]
    pub fn new(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for alter-script operations.
pub type Result<T> = std::result::Result<T, AlterError>;
