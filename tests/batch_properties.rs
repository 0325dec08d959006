use line_edit::{
    ApplyBatch, ApplyPolicy, ChangeOperation, EditError, InvalidReason, NullReporter,
    RecordingReporter, apply_batch, apply_operation,
};
use rstest::rstest;

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn numbered(count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("line {n}")).collect()
}

fn run(input: &[String], ops: Vec<ChangeOperation>) -> Result<Vec<String>, EditError> {
    let batch = ApplyBatch::new("f.txt", ops)?;
    apply_batch(input, &batch, ApplyPolicy::default(), &NullReporter).map(|result| result.lines)
}

#[rstest]
#[case::delete_middle(
    vec![ChangeOperation::delete("f.txt", 2, 3)],
    &["a", "d", "e"]
)]
#[case::insert_at_top(
    vec![ChangeOperation::insert("f.txt", 1, lines(&["X"]))],
    &["X", "a", "b", "c", "d", "e"]
)]
#[case::replace_tail_with_more(
    vec![ChangeOperation::replace("f.txt", 4, 5, lines(&["Z1", "Z2", "Z3"]))],
    &["a", "b", "c", "Z1", "Z2", "Z3"]
)]
fn test_end_to_end_examples(#[case] ops: Vec<ChangeOperation>, #[case] expected: &[&str]) {
    let original = lines(&["a", "b", "c", "d", "e"]);

    let result = run(&original, ops).unwrap();

    assert_eq!(result, lines(expected));
}

#[test]
fn test_batch_order_does_not_matter() {
    let original = numbered(15);
    let late = ChangeOperation::replace("f.txt", 10, 12, lines(&["late"]));
    let early = ChangeOperation::delete("f.txt", 3, 5);

    // Reference: bottom edit first, then the top edit at its original indices
    let step = apply_operation(&original, &late, ApplyPolicy::default()).unwrap();
    let expected = apply_operation(&step.lines, &early, ApplyPolicy::default())
        .unwrap()
        .lines;

    let ascending = run(&original, vec![early.clone(), late.clone()]).unwrap();
    let descending = run(&original, vec![late, early]).unwrap();

    assert_eq!(ascending, expected);
    assert_eq!(descending, expected);
    assert_eq!(ascending.len(), 15 - 3 - 3 + 1);
    assert_eq!(ascending[2], "line 6");
    assert_eq!(ascending[6], "late");
}

#[test]
fn test_overlapping_ranges_rejected_without_mutation() {
    let original = numbered(15);
    let reporter = RecordingReporter::new();
    let batch = ApplyBatch::new(
        "f.txt",
        vec![
            ChangeOperation::delete("f.txt", 5, 10),
            ChangeOperation::replace("f.txt", 8, 12, lines(&["x"])),
        ],
    )
    .unwrap();

    let result = apply_batch(&original, &batch, ApplyPolicy::default(), &reporter);

    assert!(matches!(result, Err(EditError::ConflictingEdits { .. })));
    assert_eq!(original, numbered(15));
    let messages = reporter.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Rejected changes to f.txt"));
}

#[test]
fn test_empty_batch_is_identity() {
    let original = numbered(4);
    let batch = ApplyBatch::new("f.txt", Vec::new()).unwrap();

    let result = apply_batch(&original, &batch, ApplyPolicy::default(), &NullReporter).unwrap();

    assert_eq!(result.lines, original);
    assert_eq!(result.total_line_shift, 0);
    assert_eq!(result.applied_count(), 0);
}

#[rstest]
#[case(1, 1)]
#[case(2, 6)]
#[case(7, 7)]
#[case(3, 5)]
fn test_delete_shrinks_by_range(#[case] start: usize, #[case] end: usize) {
    let original = numbered(7);

    let result = run(&original, vec![ChangeOperation::delete("f.txt", start, end)]).unwrap();

    assert_eq!(result.len(), original.len() - (end - start + 1));
}

#[rstest]
#[case(1)]
#[case(4)]
#[case(8)]
fn test_insert_precedes_former_line(#[case] at: usize) {
    let original = numbered(7);
    let content = lines(&["new 1", "new 2"]);

    let result = run(&original, vec![ChangeOperation::insert("f.txt", at, content.clone())]).unwrap();

    assert_eq!(&result[..at - 1], &original[..at - 1]);
    assert_eq!(&result[at - 1..at + 1], content.as_slice());
    assert_eq!(&result[at + 1..], &original[at - 1..]);
}

#[rstest]
#[case(2, 2)]
#[case(3, 6)]
#[case(6, 7)]
fn test_replace_matches_delete_then_insert(#[case] start: usize, #[case] end: usize) {
    let original = numbered(7);
    let content = lines(&["r1", "r2", "r3"]);

    let replaced = run(
        &original,
        vec![ChangeOperation::replace("f.txt", start, end, content.clone())],
    )
    .unwrap();
    let deleted = run(&original, vec![ChangeOperation::delete("f.txt", start, end)]).unwrap();
    let reinserted = run(&deleted, vec![ChangeOperation::insert("f.txt", start, content)]).unwrap();

    assert_eq!(replaced, reinserted);
}

#[test]
fn test_mixed_batch_against_original_numbering() {
    let original = numbered(10);

    let result = run(
        &original,
        vec![
            ChangeOperation::insert("f.txt", 1, lines(&["header"])),
            ChangeOperation::delete("f.txt", 2, 3),
            ChangeOperation::replace("f.txt", 6, 6, lines(&["six"])),
            ChangeOperation::insert("f.txt", 11, lines(&["footer"])),
        ],
    )
    .unwrap();

    assert_eq!(
        result,
        lines(&[
            "header", "line 1", "line 4", "line 5", "six", "line 7", "line 8", "line 9",
            "line 10", "footer",
        ])
    );
}

#[rstest]
#[case::stale_end_with_append(
    vec![
        ChangeOperation::replace("f.txt", 4, 6, lines(&["R"])),
        ChangeOperation::insert("f.txt", 7, lines(&["X"])),
    ],
    &["a", "b", "c", "R", "X"]
)]
#[case::appends_in_line_order(
    vec![
        ChangeOperation::insert("f.txt", 7, lines(&["X7"])),
        ChangeOperation::insert("f.txt", 9, lines(&["X9"])),
    ],
    &["a", "b", "c", "d", "e", "X7", "X9"]
)]
fn test_past_end_operations_share_original_numbering(
    #[case] ops: Vec<ChangeOperation>,
    #[case] expected: &[&str],
) {
    let original = lines(&["a", "b", "c", "d", "e"]);

    assert_eq!(run(&original, ops.clone()).unwrap(), lines(expected));

    let mut reversed = ops;
    reversed.reverse();
    assert_eq!(run(&original, reversed).unwrap(), lines(expected));
}

#[test]
fn test_strict_policy_checks_original_length() {
    let original = lines(&["a", "b", "c", "d", "e"]);
    let batch = ApplyBatch::new(
        "f.txt",
        vec![
            ChangeOperation::delete("f.txt", 5, 6),
            ChangeOperation::insert("f.txt", 9, lines(&["X"])),
        ],
    )
    .unwrap();

    let result = apply_batch(&original, &batch, ApplyPolicy::strict(), &NullReporter);

    assert!(matches!(
        result,
        Err(EditError::InvalidOperation {
            reason: InvalidReason::PastEndOfFile { line: 6, line_count: 5 },
            ..
        })
    ));
}
