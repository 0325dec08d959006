use thiserror::Error;

use crate::operation::{ChangeKind, OperationRef};

/// Reason an individual operation was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    /// Line numbers are 1-indexed
    #[error("start line must be at least 1")]
    StartLineZero,
    /// DELETE/REPLACE range runs backwards
    #[error("end line {end_line} is before start line {start_line}")]
    EndBeforeStart { start_line: usize, end_line: usize },
    /// INSERT/REPLACE without any lines to write
    #[error("{0} requires non-empty content")]
    MissingContent(ChangeKind),
    /// Range reaches past the end of the file while clamping is disabled
    #[error("line {line} is past the end of the file ({line_count} lines)")]
    PastEndOfFile { line: usize, line_count: usize },
}

/// Error types for edit operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// A single operation is malformed or cannot apply under the active policy
    #[error("invalid {operation}: {reason}")]
    InvalidOperation {
        operation: OperationRef,
        reason: InvalidReason,
    },
    /// Two operations in the same batch touch the same lines
    #[error("conflicting edits: {first} overlaps {second}")]
    ConflictingEdits {
        first: OperationRef,
        second: OperationRef,
    },
    /// A batch was built from operations targeting more than one file
    #[error("operation [{index}] targets '{found}' but the batch is for '{expected}'")]
    UnknownFilenameBatch {
        expected: String,
        found: String,
        index: usize,
    },
}

impl EditError {
    /// Attach the operation's position in its batch to an engine-level error
    pub fn with_index(self, index: usize) -> Self {
        match self {
            EditError::InvalidOperation { operation, reason } => EditError::InvalidOperation {
                operation: operation.at_index(index),
                reason,
            },
            other => other,
        }
    }

    /// The operation the error is about, if it concerns a single one
    pub fn operation(&self) -> Option<&OperationRef> {
        match self {
            EditError::InvalidOperation { operation, .. } => Some(operation),
            EditError::ConflictingEdits { second, .. } => Some(second),
            EditError::UnknownFilenameBatch { .. } => None,
        }
    }
}
