/// Inclusive range of 1-indexed lines in a text file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRange {
    /// First line of the range (1-indexed)
    pub start_line: usize,
    /// Last line of the range (1-indexed, inclusive)
    pub end_line: usize,
}

/// Half-open span of 0-indexed positions into a line sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpan {
    /// First index removed or replaced
    pub start: usize,
    /// One past the last index removed or replaced
    pub end: usize,
}

impl IndexSpan {
    /// Number of lines covered by the span
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl LineRange {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Number of lines the range names
    ///
    /// # Returns
    /// * `end_line - start_line + 1`, or 0 for a backwards range
    pub fn line_count(&self) -> usize {
        (self.end_line + 1).saturating_sub(self.start_line)
    }

    /// Check whether two inclusive ranges share at least one line
    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start_line <= other.end_line && other.start_line <= self.end_line
    }

    /// Check whether inserting before `line` would land inside this range
    ///
    /// Inserting before the first line of the range, or right after its last
    /// line, keeps the range intact. Anything in between splits it.
    pub fn splits_at(&self, line: usize) -> bool {
        self.start_line < line && line <= self.end_line
    }

    /// Convert to 0-indexed positions, clamped to `line_count` lines
    ///
    /// # Arguments
    /// * `line_count` - Current number of lines in the file
    ///
    /// # Returns
    /// * `IndexSpan` covering `[start_line-1, end_line)`, with both ends capped
    ///   at `line_count`. A range starting past the end yields an empty span
    ///   positioned at `line_count`.
    pub fn clamped_span(&self, line_count: usize) -> IndexSpan {
        let start = self.start_line.saturating_sub(1).min(line_count);
        let end = self.end_line.min(line_count).max(start);
        IndexSpan { start, end }
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlaps_shared_line() {
        let a = LineRange::new(5, 10);
        let b = LineRange::new(8, 12);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        let a = LineRange::new(3, 5);
        let b = LineRange::new(6, 9);

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_splits_at() {
        let range = LineRange::new(4, 6);

        assert!(!range.splits_at(4));
        assert!(range.splits_at(5));
        assert!(range.splits_at(6));
        assert!(!range.splits_at(7));
    }

    #[test]
    fn test_clamped_span_within_file() {
        let span = LineRange::new(2, 3).clamped_span(5);

        assert_eq!(span, IndexSpan { start: 1, end: 3 });
        assert_eq!(span.len(), 2);
    }

    #[test]
    fn test_clamped_span_past_end() {
        // End clamps to the last line
        assert_eq!(LineRange::new(4, 9).clamped_span(5), IndexSpan { start: 3, end: 5 });

        // Start past the end collapses to an empty span at the end
        let span = LineRange::new(8, 9).clamped_span(5);
        assert_eq!(span, IndexSpan { start: 5, end: 5 });
        assert!(span.is_empty());
    }

    #[test]
    fn test_line_count() {
        assert_eq!(LineRange::new(10, 12).line_count(), 3);
        assert_eq!(LineRange::new(4, 4).line_count(), 1);
        assert_eq!(LineRange::new(5, 3).line_count(), 0);
    }
}
