use tracing::debug;

use crate::config::ApplyPolicy;
use crate::error::{EditError, InvalidReason};
use crate::operation::{ChangeKind, ChangeOperation, FileLines, validate_operation};
use crate::range::IndexSpan;

/// Result of applying one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResult {
    /// Lines after the operation
    pub lines: FileLines,
    /// Line count shift (positive = file grew, negative = shrank)
    pub line_shift: i64,
}

/// Apply a single operation to a sequence of lines
///
/// Line numbers are read against `lines` as given, so when several operations
/// target one file the caller is responsible for ordering them (see
/// [`crate::batch::apply_batch`]).
///
/// This function:
/// 1. Validates the operation
/// 2. Resolves its range against the current line count under `policy`
/// 3. Builds a fresh line sequence; `lines` is never modified
///
/// Past-EOF handling is lenient by default. INSERT past the end appends.
/// DELETE/REPLACE ranges whose end runs past the end are clamped to the last
/// line; a DELETE starting past the end removes nothing and a REPLACE
/// starting past the end appends its content. With
/// `policy.clamp_end_line == false` those ranges are rejected instead.
///
/// # Arguments
/// * `lines` - Current file lines
/// * `op` - The operation to apply
/// * `policy` - Out-of-range handling
///
/// # Returns
/// * `Ok(EditResult)` - New lines and the line shift
/// * `Err(EditError::InvalidOperation)` - Nothing was applied
pub fn apply_operation(
    lines: &[String],
    op: &ChangeOperation,
    policy: ApplyPolicy,
) -> Result<EditResult, EditError> {
    validate_operation(op)?;
    check_bounds(op, lines.len(), policy)?;

    Ok(splice(lines, op, op.range().clamped_span(lines.len())))
}

/// Reject a ranged operation that runs past `line_count` under a strict policy
///
/// `line_count` must be the length of the lines the operation was numbered
/// against. In a batch that is the original file, not an intermediate result.
pub(crate) fn check_bounds(
    op: &ChangeOperation,
    line_count: usize,
    policy: ApplyPolicy,
) -> Result<(), EditError> {
    if op.kind.is_ranged() && !policy.clamp_end_line && op.end_line > line_count {
        return Err(EditError::InvalidOperation {
            operation: op.describe(),
            reason: InvalidReason::PastEndOfFile {
                line: op.end_line,
                line_count,
            },
        });
    }
    Ok(())
}

/// Replace `span` of `lines` with the operation's content
///
/// The span is already resolved and must lie within `lines`.
pub(crate) fn splice(lines: &[String], op: &ChangeOperation, span: IndexSpan) -> EditResult {
    // INSERT is a zero-width range at its insertion point
    let (removed, inserted): (usize, &[String]) = match op.kind {
        ChangeKind::Insert => (0, op.content.as_slice()),
        ChangeKind::Delete => (span.len(), &[][..]),
        ChangeKind::Replace => (span.len(), op.content.as_slice()),
    };
    let removed_end = span.start + removed;

    let mut new_lines = Vec::with_capacity(lines.len() - removed + inserted.len());
    new_lines.extend_from_slice(&lines[..span.start]);
    new_lines.extend_from_slice(inserted);
    new_lines.extend_from_slice(&lines[removed_end..]);

    let line_shift = inserted.len() as i64 - removed as i64;
    debug!(
        kind = %op.kind,
        file = %op.filename,
        start_line = op.start_line,
        end_line = op.end_line,
        removed,
        inserted = inserted.len(),
        "applied operation"
    );

    EditResult {
        lines: new_lines,
        line_shift,
    }
}

/// Compute the BLAKE3 checksum (hex-encoded) of lines joined with `\n`
pub fn checksum_lines(lines: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(line.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
