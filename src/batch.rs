use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::ApplyPolicy;
use crate::engine::{check_bounds, checksum_lines, splice};
use crate::error::EditError;
use crate::operation::{ChangeKind, ChangeOperation, FileLines, OperationRef, validate_operation};
use crate::report::{ProgressMarker, Reporter};

/// Operations targeting one file, applied together in a single pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyBatch {
    filename: String,
    operations: Vec<ChangeOperation>,
}

impl ApplyBatch {
    /// Build a batch for `filename`
    ///
    /// # Returns
    /// * `Err(EditError::UnknownFilenameBatch)` if any operation targets a
    ///   different file; no partial grouping is attempted
    pub fn new(
        filename: impl Into<String>,
        operations: Vec<ChangeOperation>,
    ) -> Result<Self, EditError> {
        let filename = filename.into();
        if let Some((index, op)) = operations
            .iter()
            .enumerate()
            .find(|(_, op)| op.filename != filename)
        {
            return Err(EditError::UnknownFilenameBatch {
                expected: filename,
                found: op.filename.clone(),
                index,
            });
        }

        Ok(Self {
            filename,
            operations,
        })
    }

    /// Build a batch from operations that must all share one filename
    pub fn from_operations(operations: Vec<ChangeOperation>) -> Result<Option<Self>, EditError> {
        match operations.first() {
            Some(first) => {
                let filename = first.filename.clone();
                Self::new(filename, operations).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn operations(&self) -> &[ChangeOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Group a flat operation list into one batch per file
///
/// Batches come out in the order each filename first appears; operations
/// keep their relative order inside a batch.
pub fn partition_by_file(operations: Vec<ChangeOperation>) -> Vec<ApplyBatch> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut batches: Vec<ApplyBatch> = Vec::new();

    for op in operations {
        match slots.get(&op.filename) {
            Some(&slot) => batches[slot].operations.push(op),
            None => {
                slots.insert(op.filename.clone(), batches.len());
                batches.push(ApplyBatch {
                    filename: op.filename.clone(),
                    operations: vec![op],
                });
            }
        }
    }

    batches
}

/// An operation paired with its position in the batch as supplied
#[derive(Debug, Clone, Copy)]
pub struct PlannedOperation<'a> {
    pub index: usize,
    pub operation: &'a ChangeOperation,
}

/// Order operations for bottom-up application
///
/// Applying from the end of the file toward the start means every pending
/// operation still sees its original line numbers: changes below a line
/// never move it.
///
/// Ordering:
/// 1. `start_line` descending
/// 2. DELETE, then REPLACE, then INSERT at the same start line
/// 3. Later batch entries first, so INSERTs at the same point end up in
///    their original batch order in the output
pub fn sort_operations_descending(operations: &[ChangeOperation]) -> Vec<PlannedOperation<'_>> {
    let mut planned: Vec<PlannedOperation<'_>> = operations
        .iter()
        .enumerate()
        .map(|(index, operation)| PlannedOperation { index, operation })
        .collect();

    planned.sort_by(|a, b| {
        b.operation
            .start_line
            .cmp(&a.operation.start_line)
            .then(b.operation.kind.priority().cmp(&a.operation.kind.priority()))
            .then(b.index.cmp(&a.index))
    });
    planned
}

/// Reject batches whose operations touch the same lines
///
/// Two DELETE/REPLACE ranges conflict when they share a line. An INSERT
/// conflicts with a DELETE/REPLACE range when its insertion point falls
/// strictly inside the range, since the line it anchors to is going away.
/// INSERTs at the same point never conflict with each other.
pub fn detect_conflicts(operations: &[ChangeOperation]) -> Result<(), EditError> {
    let mut ranged: Vec<(usize, &ChangeOperation)> = operations
        .iter()
        .enumerate()
        .filter(|(_, op)| op.kind.is_ranged())
        .collect();
    ranged.sort_by_key(|(index, op)| (op.start_line, *index));

    // Sorted by start, so disjoint ranges only ever need checking against
    // their immediate predecessor
    for pair in ranged.windows(2) {
        let (prev_index, prev) = pair[0];
        let (index, op) = pair[1];
        if op.range().overlaps(&prev.range()) {
            return Err(conflict((prev_index, prev), (index, op)));
        }
    }

    for (index, insert) in operations
        .iter()
        .enumerate()
        .filter(|(_, op)| op.kind == ChangeKind::Insert)
    {
        if let Some(&(range_index, range_op)) = ranged
            .iter()
            .find(|(_, range_op)| range_op.range().splits_at(insert.start_line))
        {
            return Err(conflict((range_index, range_op), (index, insert)));
        }
    }

    Ok(())
}

fn conflict(a: (usize, &ChangeOperation), b: (usize, &ChangeOperation)) -> EditError {
    let (first, second) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    EditError::ConflictingEdits {
        first: first.1.describe().at_index(first.0),
        second: second.1.describe().at_index(second.0),
    }
}

/// Outcome of one operation inside an applied batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerOperationResult {
    /// The operation, with its batch index
    pub operation: OperationRef,
    /// Line shift introduced by this operation
    pub line_shift: i64,
}

/// Result of applying a whole batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub filename: String,
    /// Final lines after every operation
    pub lines: FileLines,
    /// Individual results in application order
    pub operations: Vec<PerOperationResult>,
    /// Total line shift across all operations
    pub total_line_shift: i64,
    /// BLAKE3 checksum of the final lines joined with `\n`
    pub final_checksum: String,
}

impl BatchResult {
    pub fn applied_count(&self) -> usize {
        self.operations.len()
    }
}

fn action_message(op: &ChangeOperation) -> String {
    match op.kind {
        ChangeKind::Insert => format!(
            "Adding content at line {} in {}",
            op.start_line, op.filename
        ),
        ChangeKind::Delete => format!(
            "Deleting content from line {} to {} in {}",
            op.start_line, op.end_line, op.filename
        ),
        ChangeKind::Replace => format!(
            "Replacing content from line {} to {} in {}",
            op.start_line, op.end_line, op.filename
        ),
    }
}

/// Apply every operation in a batch against the file's original lines
///
/// This function:
/// 1. Validates every operation and checks its range against `lines.len()`
/// 2. Rejects overlapping ranges
/// 3. Sorts operations bottom-up (see [`sort_operations_descending`])
/// 4. Resolves each range against the original line count, clamping past-end
///    ranges and insertion points to the end of the file
/// 5. Applies them one at a time to the lines produced so far
///
/// All-or-nothing: on any error `lines` is untouched and nothing is returned
/// but the error, which names the operation by its batch index.
///
/// # Arguments
/// * `lines` - The file's lines as the planner saw them
/// * `batch` - Operations for that file
/// * `policy` - Out-of-range handling, judged against `lines`
/// * `reporter` - Receives one status line per operation and any error
pub fn apply_batch(
    lines: &[String],
    batch: &ApplyBatch,
    policy: ApplyPolicy,
    reporter: &dyn Reporter,
) -> Result<BatchResult, EditError> {
    let result = apply_batch_inner(lines, batch, policy, reporter);

    match &result {
        Ok(applied) => info!(
            file = %batch.filename,
            operations = applied.applied_count(),
            line_shift = applied.total_line_shift,
            "batch applied"
        ),
        Err(error) => {
            warn!(file = %batch.filename, %error, "batch rejected");
            reporter.error(&format!("Rejected changes to {}: {}", batch.filename, error));
        }
    }

    result
}

fn apply_batch_inner(
    lines: &[String],
    batch: &ApplyBatch,
    policy: ApplyPolicy,
    reporter: &dyn Reporter,
) -> Result<BatchResult, EditError> {
    // Every range is resolved against the original length, never against an
    // intermediate result that earlier appends have grown
    let line_count = lines.len();
    for (index, op) in batch.operations.iter().enumerate() {
        validate_operation(op)
            .and_then(|()| check_bounds(op, line_count, policy))
            .map_err(|e| e.with_index(index))?;
    }
    detect_conflicts(&batch.operations)?;

    let ordered = sort_operations_descending(&batch.operations);
    let total = ordered.len();

    let mut current: FileLines = lines.to_vec();
    let mut total_line_shift = 0i64;
    let mut results = Vec::with_capacity(total);

    for (position, planned) in ordered.iter().enumerate() {
        let marker = ProgressMarker::new(position + 1, total);
        reporter.info(&marker.annotate(&action_message(planned.operation)));

        let span = planned.operation.range().clamped_span(line_count);
        let applied = splice(&current, planned.operation, span);

        current = applied.lines;
        total_line_shift += applied.line_shift;
        results.push(PerOperationResult {
            operation: planned.operation.describe().at_index(planned.index),
            line_shift: applied.line_shift,
        });
    }

    let final_checksum = checksum_lines(&current);
    Ok(BatchResult {
        filename: batch.filename.clone(),
        lines: current,
        operations: results,
        total_line_shift,
        final_checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidReason;
    use crate::report::{NullReporter, RecordingReporter};
    use rstest::rstest;

    fn lines(items: &[&str]) -> FileLines {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn numbered(count: usize) -> FileLines {
        (1..=count).map(|n| format!("line {n}")).collect()
    }

    fn run(input: &[String], ops: Vec<ChangeOperation>) -> Result<BatchResult, EditError> {
        let batch = ApplyBatch::new("f.rs", ops)?;
        apply_batch(input, &batch, ApplyPolicy::default(), &NullReporter)
    }

    #[test]
    fn test_sort_operations_descending() {
        let ops = vec![
            ChangeOperation::delete("f.rs", 10, 20),
            ChangeOperation::insert("f.rs", 50, lines(&["b"])),
            ChangeOperation::replace("f.rs", 30, 40, lines(&["c"])),
        ];

        let sorted = sort_operations_descending(&ops);

        assert_eq!(sorted[0].operation.start_line, 50);
        assert_eq!(sorted[1].operation.start_line, 30);
        assert_eq!(sorted[2].operation.start_line, 10);
        assert_eq!(sorted[2].index, 0);
    }

    #[test]
    fn test_sort_ties_by_kind_then_reverse_index() {
        let ops = vec![
            ChangeOperation::insert("f.rs", 3, lines(&["first"])),
            ChangeOperation::insert("f.rs", 3, lines(&["second"])),
            ChangeOperation::delete("f.rs", 3, 3),
        ];

        let order: Vec<usize> = sort_operations_descending(&ops)
            .iter()
            .map(|p| p.index)
            .collect();

        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn test_partition_by_file_keeps_first_seen_order() {
        let ops = vec![
            ChangeOperation::delete("b.rs", 1, 1),
            ChangeOperation::delete("a.rs", 2, 2),
            ChangeOperation::delete("b.rs", 5, 6),
        ];

        let batches = partition_by_file(ops);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].filename(), "b.rs");
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0].operations()[1].start_line, 5);
        assert_eq!(batches[1].filename(), "a.rs");
    }

    #[test]
    fn test_mixed_filenames_rejected() {
        let ops = vec![
            ChangeOperation::delete("a.rs", 1, 1),
            ChangeOperation::delete("b.rs", 2, 2),
        ];

        match ApplyBatch::from_operations(ops) {
            Err(EditError::UnknownFilenameBatch {
                expected,
                found,
                index,
            }) => {
                assert_eq!(expected, "a.rs");
                assert_eq!(found, "b.rs");
                assert_eq!(index, 1);
            }
            other => panic!("Expected UnknownFilenameBatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let input = lines(&["a", "b"]);
        let result = run(&input, Vec::new()).unwrap();

        assert_eq!(result.lines, input);
        assert_eq!(result.applied_count(), 0);
        assert_eq!(result.total_line_shift, 0);
        assert_eq!(result.final_checksum, checksum_lines(&input));
    }

    #[test]
    fn test_apply_batch_uses_original_line_numbers() {
        let input = numbered(12);
        let ops = vec![
            ChangeOperation::delete("f.rs", 3, 5),
            ChangeOperation::replace("f.rs", 10, 12, lines(&["tail"])),
            ChangeOperation::insert("f.rs", 7, lines(&["new 7a", "new 7b"])),
        ];

        let result = run(&input, ops).unwrap();

        assert_eq!(
            result.lines,
            lines(&[
                "line 1", "line 2", "line 6", "new 7a", "new 7b", "line 7", "line 8", "line 9",
                "tail",
            ])
        );
        assert_eq!(result.total_line_shift, -3);
        // Application order is bottom-up
        let applied: Vec<usize> = result
            .operations
            .iter()
            .filter_map(|r| r.operation.index)
            .collect();
        assert_eq!(applied, vec![1, 2, 0]);
    }

    #[test]
    fn test_same_point_inserts_keep_batch_order() {
        let input = lines(&["a", "b", "c"]);
        let ops = vec![
            ChangeOperation::insert("f.rs", 2, lines(&["x"])),
            ChangeOperation::insert("f.rs", 2, lines(&["y"])),
        ];

        let result = run(&input, ops).unwrap();

        assert_eq!(result.lines, lines(&["a", "x", "y", "b", "c"]));
    }

    #[test]
    fn test_insert_at_start_of_deleted_range() {
        let input = lines(&["a", "b", "c", "d", "e"]);
        let ops = vec![
            ChangeOperation::insert("f.rs", 3, lines(&["X"])),
            ChangeOperation::delete("f.rs", 3, 4),
        ];

        let result = run(&input, ops).unwrap();

        assert_eq!(result.lines, lines(&["a", "b", "X", "e"]));
    }

    #[test]
    fn test_overlapping_ranges_conflict() {
        let input = numbered(15);
        let ops = vec![
            ChangeOperation::delete("f.rs", 5, 10),
            ChangeOperation::replace("f.rs", 8, 12, lines(&["z"])),
        ];

        match run(&input, ops) {
            Err(EditError::ConflictingEdits { first, second }) => {
                assert_eq!(first.index, Some(0));
                assert_eq!(second.index, Some(1));
            }
            other => panic!("Expected ConflictingEdits, got {:?}", other),
        }
        assert_eq!(input, numbered(15));
    }

    #[test]
    fn test_contained_range_conflicts() {
        let ops = vec![
            ChangeOperation::delete("f.rs", 9, 9),
            ChangeOperation::delete("f.rs", 2, 20),
        ];

        assert!(matches!(
            detect_conflicts(&ops),
            Err(EditError::ConflictingEdits { .. })
        ));
    }

    #[test]
    fn test_insert_inside_range_conflicts() {
        let ops = vec![
            ChangeOperation::replace("f.rs", 4, 6, lines(&["r"])),
            ChangeOperation::insert("f.rs", 5, lines(&["i"])),
        ];

        match detect_conflicts(&ops) {
            Err(EditError::ConflictingEdits { first, second }) => {
                assert_eq!(first.kind, ChangeKind::Replace);
                assert_eq!(second.kind, ChangeKind::Insert);
            }
            other => panic!("Expected ConflictingEdits, got {:?}", other),
        }
    }

    #[test]
    fn test_adjacent_ranges_do_not_conflict() {
        let ops = vec![
            ChangeOperation::delete("f.rs", 3, 5),
            ChangeOperation::delete("f.rs", 6, 8),
            ChangeOperation::insert("f.rs", 9, lines(&["after"])),
        ];

        assert!(detect_conflicts(&ops).is_ok());
    }

    #[test]
    fn test_invalid_operation_reports_batch_index() {
        let input = numbered(5);
        let ops = vec![
            ChangeOperation::delete("f.rs", 1, 1),
            ChangeOperation::insert("f.rs", 2, Vec::new()),
        ];

        match run(&input, ops) {
            Err(EditError::InvalidOperation { operation, .. }) => {
                assert_eq!(operation.index, Some(1));
            }
            other => panic!("Expected InvalidOperation, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_policy_failure_names_operation() {
        let input = numbered(5);
        let batch = ApplyBatch::new(
            "f.rs",
            vec![
                ChangeOperation::delete("f.rs", 1, 1),
                ChangeOperation::delete("f.rs", 4, 9),
            ],
        )
        .unwrap();

        let err = apply_batch(&input, &batch, ApplyPolicy::strict(), &NullReporter).unwrap_err();

        assert_eq!(err.operation().and_then(|op| op.index), Some(1));
    }

    #[test]
    fn test_reporter_receives_progress_and_errors() {
        let reporter = RecordingReporter::new();
        let input = lines(&["a", "b", "c", "d", "e"]);
        let batch = ApplyBatch::new(
            "f.rs",
            vec![
                ChangeOperation::delete("f.rs", 2, 3),
                ChangeOperation::insert("f.rs", 5, lines(&["x"])),
            ],
        )
        .unwrap();

        apply_batch(&input, &batch, ApplyPolicy::default(), &reporter).unwrap();

        assert_eq!(
            reporter.messages(),
            vec![
                "[1/2] Adding content at line 5 in f.rs",
                "[2/2] Deleting content from line 2 to 3 in f.rs",
            ]
        );

        let conflicting = ApplyBatch::new(
            "f.rs",
            vec![
                ChangeOperation::delete("f.rs", 1, 3),
                ChangeOperation::delete("f.rs", 2, 2),
            ],
        )
        .unwrap();
        reporter.take();

        assert!(apply_batch(&input, &conflicting, ApplyPolicy::default(), &reporter).is_err());
        let entries = reporter.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.starts_with("Rejected changes to f.rs: conflicting edits"));
    }

    #[rstest]
    #[case::stale_replace_then_append(
        vec![
            ChangeOperation::replace("f.rs", 4, 6, lines(&["R"])),
            ChangeOperation::insert("f.rs", 7, lines(&["X"])),
        ],
        &["a", "b", "c", "R", "X"]
    )]
    #[case::stale_delete_then_append(
        vec![
            ChangeOperation::insert("f.rs", 9, lines(&["X"])),
            ChangeOperation::delete("f.rs", 5, 6),
        ],
        &["a", "b", "c", "d", "X"]
    )]
    #[case::appends_follow_start_line(
        vec![
            ChangeOperation::insert("f.rs", 9, lines(&["X9"])),
            ChangeOperation::insert("f.rs", 7, lines(&["X7"])),
        ],
        &["a", "b", "c", "d", "e", "X7", "X9"]
    )]
    #[case::adjacent_appends_follow_start_line(
        vec![
            ChangeOperation::insert("f.rs", 8, lines(&["X8"])),
            ChangeOperation::insert("f.rs", 6, lines(&["X6"])),
        ],
        &["a", "b", "c", "d", "e", "X6", "X8"]
    )]
    #[case::replace_past_end_before_later_append(
        vec![
            ChangeOperation::insert("f.rs", 9, lines(&["X"])),
            ChangeOperation::replace("f.rs", 6, 7, lines(&["R"])),
        ],
        &["a", "b", "c", "d", "e", "R", "X"]
    )]
    fn test_past_end_resolved_against_original(
        #[case] ops: Vec<ChangeOperation>,
        #[case] expected: &[&str],
    ) {
        let input = lines(&["a", "b", "c", "d", "e"]);

        let result = run(&input, ops).unwrap();

        assert_eq!(result.lines, lines(expected));
    }

    #[test]
    fn test_strict_policy_ignores_growth_from_appends() {
        let input = lines(&["a", "b", "c", "d", "e"]);
        let reporter = RecordingReporter::new();
        let batch = ApplyBatch::new(
            "f.rs",
            vec![
                ChangeOperation::delete("f.rs", 5, 6),
                ChangeOperation::insert("f.rs", 9, lines(&["X"])),
            ],
        )
        .unwrap();

        match apply_batch(&input, &batch, ApplyPolicy::strict(), &reporter) {
            Err(EditError::InvalidOperation {
                operation,
                reason: InvalidReason::PastEndOfFile { line, line_count },
            }) => {
                assert_eq!(operation.index, Some(0));
                assert_eq!(line, 6);
                assert_eq!(line_count, 5);
            }
            other => panic!("Expected PastEndOfFile, got {:?}", other),
        }
        // Rejected before any progress was reported
        assert_eq!(reporter.messages().len(), 1);
    }
}
