use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{EditError, InvalidReason};
use crate::range::LineRange;

/// Ordered lines of one file; index 0 is line 1, no line terminators
pub type FileLines = Vec<String>;

/// Kind of change an operation makes
///
/// Parsed case-insensitively. `ADD` is accepted as INSERT and `MODIFY` as
/// REPLACE, since planners emit both spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum ChangeKind {
    /// Splice content before `start_line`
    Insert,
    /// Remove `start_line..=end_line`
    Delete,
    /// Swap `start_line..=end_line` for content
    Replace,
}

impl ChangeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Delete => "DELETE",
            ChangeKind::Replace => "REPLACE",
        }
    }

    /// Application priority among operations sharing a start line
    ///
    /// Higher applies first: DELETE, then REPLACE, then INSERT.
    pub fn priority(&self) -> u8 {
        match self {
            ChangeKind::Delete => 2,
            ChangeKind::Replace => 1,
            ChangeKind::Insert => 0,
        }
    }

    /// Whether the operation removes the lines in its range
    pub fn is_ranged(&self) -> bool {
        match self {
            ChangeKind::Insert => false,
            ChangeKind::Delete | ChangeKind::Replace => true,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognised operation name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation '{0}', expected INSERT, DELETE or REPLACE")]
pub struct UnknownKind(pub String);

impl FromStr for ChangeKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" | "ADD" => Ok(ChangeKind::Insert),
            "DELETE" => Ok(ChangeKind::Delete),
            "REPLACE" | "MODIFY" => Ok(ChangeKind::Replace),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChangeKind {
    type Error = UnknownKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One line-range edit to a file
///
/// Line numbers always refer to the file as the planner read it, before any
/// operation in the same batch was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOperation {
    /// What the operation does
    pub kind: ChangeKind,
    /// File the operation targets; opaque to the engine
    pub filename: String,
    /// First line affected (1-indexed); for INSERT, the line to insert before
    pub start_line: usize,
    /// Last line affected (1-indexed, inclusive); equals `start_line` for INSERT
    pub end_line: usize,
    /// Lines written by INSERT and REPLACE; empty for DELETE
    pub content: FileLines,
}

impl ChangeOperation {
    pub fn insert(filename: impl Into<String>, start_line: usize, content: FileLines) -> Self {
        Self {
            kind: ChangeKind::Insert,
            filename: filename.into(),
            start_line,
            end_line: start_line,
            content,
        }
    }

    pub fn delete(filename: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            kind: ChangeKind::Delete,
            filename: filename.into(),
            start_line,
            end_line,
            content: Vec::new(),
        }
    }

    pub fn replace(
        filename: impl Into<String>,
        start_line: usize,
        end_line: usize,
        content: FileLines,
    ) -> Self {
        Self {
            kind: ChangeKind::Replace,
            filename: filename.into(),
            start_line,
            end_line,
            content,
        }
    }

    /// Lines the operation covers in the original file
    ///
    /// For INSERT this is the single insertion point.
    pub fn range(&self) -> LineRange {
        match self.kind {
            ChangeKind::Insert => LineRange::new(self.start_line, self.start_line),
            ChangeKind::Delete | ChangeKind::Replace => {
                LineRange::new(self.start_line, self.end_line)
            }
        }
    }

    /// Lightweight description used in errors and reports
    pub fn describe(&self) -> OperationRef {
        OperationRef {
            index: None,
            kind: self.kind,
            filename: self.filename.clone(),
            start_line: self.start_line,
            end_line: self.end_line,
        }
    }

    fn invalid(&self, reason: InvalidReason) -> EditError {
        EditError::InvalidOperation {
            operation: self.describe(),
            reason,
        }
    }
}

/// Identifies an operation in error messages and results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRef {
    /// Position in the batch as supplied, when known
    pub index: Option<usize>,
    pub kind: ChangeKind,
    pub filename: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl OperationRef {
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl std::fmt::Display for OperationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(index) => write!(f, "operation [{}] ", index)?,
            None => write!(f, "operation ")?,
        }
        match self.kind {
            ChangeKind::Insert => write!(
                f,
                "{} at line {} in {}",
                self.kind, self.start_line, self.filename
            ),
            ChangeKind::Delete | ChangeKind::Replace => write!(
                f,
                "{} lines {}-{} in {}",
                self.kind, self.start_line, self.end_line, self.filename
            ),
        }
    }
}

/// Validate an operation's range and content
///
/// This is the single validation gate every operation passes through before
/// ordering. It never looks at file content, so past-EOF ranges are accepted
/// here and handled by the engine's policy.
///
/// # Arguments
/// * `op` - The operation to validate
///
/// # Returns
/// * `Ok(())` if the operation is well-formed
/// * `Err(EditError::InvalidOperation)` naming the first problem found
pub fn validate_operation(op: &ChangeOperation) -> Result<(), EditError> {
    if op.start_line < 1 {
        return Err(op.invalid(InvalidReason::StartLineZero));
    }

    match op.kind {
        ChangeKind::Insert => {
            if op.content.is_empty() {
                return Err(op.invalid(InvalidReason::MissingContent(op.kind)));
            }
        }
        ChangeKind::Delete => {
            if op.end_line < op.start_line {
                return Err(op.invalid(InvalidReason::EndBeforeStart {
                    start_line: op.start_line,
                    end_line: op.end_line,
                }));
            }
        }
        ChangeKind::Replace => {
            if op.end_line < op.start_line {
                return Err(op.invalid(InvalidReason::EndBeforeStart {
                    start_line: op.start_line,
                    end_line: op.end_line,
                }));
            }
            if op.content.is_empty() {
                return Err(op.invalid(InvalidReason::MissingContent(op.kind)));
            }
        }
    }

    Ok(())
}
