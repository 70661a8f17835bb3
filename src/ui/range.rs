//! Range algebra shared by the selection and the viewport
//!
//! A caller-supplied [`Range`] carries its columns in exactly one coordinate
//! space. [`legitimise`] clips it and derives the other space through the
//! column store, producing a [`ResolvedRange`] that remembers which space was
//! authoritative.

use crate::data::cells::CellArea;
use crate::data::column_store::ColumnStore;

/// Which column coordinate space a value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpaceKind {
    /// Visible columns only
    #[default]
    Display,
    /// All columns, hidden ones included
    Real,
}

/// Column extent of a range in one coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnSpan {
    pub start: usize,
    pub end: usize,
    /// Anchor column the range was started from
    pub pos: usize,
    /// Column the cursor last moved to
    pub focus: usize,
}

impl ColumnSpan {
    pub fn new(start: usize, end: usize, pos: usize, focus: usize) -> Self {
        Self {
            start,
            end,
            pos,
            focus,
        }
    }

    pub fn single(column: usize) -> Self {
        Self::new(column, column, column, column)
    }

    /// Span from `start` to `end` anchored and focused on `start`
    pub fn between(start: usize, end: usize) -> Self {
        Self::new(start, end, start, start)
    }

    pub fn contains(&self, column: usize) -> bool {
        column >= self.start && column <= self.end
    }

    fn clipped(self, count: usize) -> Self {
        let max = count.saturating_sub(1);
        let (start, end) = if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        };
        Self {
            start: start.min(max),
            end: end.min(max),
            pos: self.pos.min(max),
            focus: self.focus.min(max),
        }
    }
}

/// The authoritative column span of a caller-supplied range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSpace {
    Display(ColumnSpan),
    Real(ColumnSpan),
}

impl ColumnSpace {
    pub fn new(kind: SpaceKind, span: ColumnSpan) -> Self {
        match kind {
            SpaceKind::Display => ColumnSpace::Display(span),
            SpaceKind::Real => ColumnSpace::Real(span),
        }
    }

    pub fn kind(&self) -> SpaceKind {
        match self {
            ColumnSpace::Display(_) => SpaceKind::Display,
            ColumnSpace::Real(_) => SpaceKind::Real,
        }
    }

    pub fn span(&self) -> ColumnSpan {
        match self {
            ColumnSpace::Display(span) | ColumnSpace::Real(span) => *span,
        }
    }
}

/// A rectangular selection with its columns in one coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub top: usize,
    pub bottom: usize,
    pub row_no: usize,
    pub row_focus: usize,
    pub columns: ColumnSpace,
}

impl Range {
    pub fn new(top: usize, bottom: usize, columns: ColumnSpace) -> Self {
        Self {
            top,
            bottom,
            row_no: top,
            row_focus: top,
            columns,
        }
    }

    /// A single cell
    pub fn cell(row: usize, column: usize, kind: SpaceKind) -> Self {
        Self::new(row, row, ColumnSpace::new(kind, ColumnSpan::single(column)))
    }

    /// Rows `top..=bottom` and display columns `left..=right`
    pub fn display(top: usize, bottom: usize, left: usize, right: usize) -> Self {
        Self::new(top, bottom, ColumnSpace::Display(ColumnSpan::between(left, right)))
    }

    /// Rows `top..=bottom` and real columns `start..=end`
    pub fn real(top: usize, bottom: usize, start: usize, end: usize) -> Self {
        Self::new(top, bottom, ColumnSpace::Real(ColumnSpan::between(start, end)))
    }

    pub fn with_row_anchor(mut self, row_no: usize) -> Self {
        self.row_no = row_no;
        self.row_focus = row_no;
        self
    }

    pub fn with_column_anchor(mut self, pos: usize) -> Self {
        let mut span = self.columns.span();
        span.pos = pos;
        span.focus = pos;
        self.columns = ColumnSpace::new(self.columns.kind(), span);
        self
    }
}

/// A range expressed in both coordinate spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedRange {
    pub top: usize,
    pub bottom: usize,
    pub row_no: usize,
    pub row_focus: usize,
    pub display: ColumnSpan,
    pub real: ColumnSpan,
    /// The space the other one was derived from
    pub source: SpaceKind,
}

impl ResolvedRange {
    pub fn left(&self) -> usize {
        self.display.start
    }

    pub fn right(&self) -> usize {
        self.display.end
    }

    pub fn col_no(&self) -> usize {
        self.display.pos
    }

    pub fn col_focus(&self) -> usize {
        self.display.focus
    }

    pub fn column_start(&self) -> usize {
        self.real.start
    }

    pub fn column_end(&self) -> usize {
        self.real.end
    }

    pub fn column_pos(&self) -> usize {
        self.real.pos
    }

    pub fn column_focus(&self) -> usize {
        self.real.focus
    }

    pub fn span(&self, kind: SpaceKind) -> ColumnSpan {
        match kind {
            SpaceKind::Display => self.display,
            SpaceKind::Real => self.real,
        }
    }

    /// Back to a single-space range, using `kind` as the authority
    pub fn to_range(&self, kind: SpaceKind) -> Range {
        Range {
            top: self.top,
            bottom: self.bottom,
            row_no: self.row_no,
            row_focus: self.row_focus,
            columns: ColumnSpace::new(kind, self.span(kind)),
        }
    }

    pub fn to_source_range(&self) -> Range {
        self.to_range(self.source)
    }

    pub fn contains_cell(&self, row: usize, column: usize, kind: SpaceKind) -> bool {
        row >= self.top && row <= self.bottom && self.span(kind).contains(column)
    }

    /// Display-space cell rectangle
    pub fn area(&self) -> CellArea {
        CellArea::new(self.left(), self.top, self.right(), self.bottom)
    }

    pub fn row_count(&self) -> usize {
        self.bottom + 1 - self.top
    }
}

/// Upper limits of every coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub rows: usize,
    pub display_columns: usize,
    pub real_columns: usize,
}

impl Bounds {
    pub fn of(store: &ColumnStore) -> Self {
        Self {
            rows: store.v_row_count,
            display_columns: store.v_column_count,
            real_columns: store.column_count,
        }
    }

    fn columns(&self, kind: SpaceKind) -> usize {
        match kind {
            SpaceKind::Display => self.display_columns,
            SpaceKind::Real => self.real_columns,
        }
    }
}

fn clip_rows(top: &mut usize, bottom: &mut usize, row_no: &mut usize, row_focus: &mut usize, rows: usize) {
    let max = rows.saturating_sub(1);
    if *top > *bottom {
        std::mem::swap(top, bottom);
    }
    *top = (*top).min(max);
    *bottom = (*bottom).min(max);
    *row_no = (*row_no).min(max);
    *row_focus = (*row_focus).min(max);
}

/// Clamp every coordinate of `range` to `[0, count - 1]` of its space
pub fn clip(range: &mut Range, bounds: &Bounds) {
    clip_rows(
        &mut range.top,
        &mut range.bottom,
        &mut range.row_no,
        &mut range.row_focus,
        bounds.rows,
    );
    let kind = range.columns.kind();
    range.columns = ColumnSpace::new(kind, range.columns.span().clipped(bounds.columns(kind)));
}

/// Clamp both column spans and the rows of a resolved range
pub fn clip_resolved(range: &mut ResolvedRange, bounds: &Bounds) {
    clip_rows(
        &mut range.top,
        &mut range.bottom,
        &mut range.row_no,
        &mut range.row_focus,
        bounds.rows,
    );
    range.display = range.display.clipped(bounds.display_columns);
    range.real = range.real.clipped(bounds.real_columns);
}

/// Derive the missing coordinate space of `range`
pub fn legitimise(range: &Range, store: &ColumnStore) -> ResolvedRange {
    let bounds = Bounds::of(store);
    let mut range = *range;
    clip(&mut range, &bounds);

    let (display, real) = match range.columns {
        ColumnSpace::Display(span) => (span, display_to_real(span, store)),
        ColumnSpace::Real(span) => (real_to_display(span, store), span),
    };

    let mut resolved = ResolvedRange {
        top: range.top,
        bottom: range.bottom,
        row_no: range.row_no,
        row_focus: range.row_focus,
        display,
        real,
        source: range.columns.kind(),
    };
    clip_resolved(&mut resolved, &bounds);
    resolved
}

/// Display columns map straight to the real index of the column showing there
pub fn display_to_real(span: ColumnSpan, store: &ColumnStore) -> ColumnSpan {
    let real = |d: usize| store.get_column_by_display(d).map(|c| c.index).unwrap_or(0);
    ColumnSpan::new(real(span.start), real(span.end), real(span.pos), real(span.focus))
}

/// Real columns may be hidden, in which case the nearest visible column inside
/// the span stands in: the start scans forward, the end and the anchor scan
/// backward, the focus scans forward.
pub fn real_to_display(span: ColumnSpan, store: &ColumnStore) -> ColumnSpan {
    if store.is_empty() || span.start > span.end {
        return ColumnSpan::default();
    }

    let left = display_of(store, span.start)
        .or_else(|| scan_forward(store, span.start, span.end))
        .unwrap_or(0);
    let right = display_of(store, span.end)
        .or_else(|| scan_backward(store, span.end, span.start))
        .unwrap_or(left);
    let pos = display_of(store, span.pos)
        .or_else(|| scan_backward(store, span.pos.clamp(span.start, span.end), span.start))
        .unwrap_or(left);
    let focus = display_of(store, span.focus)
        .or_else(|| scan_forward(store, span.start, span.end))
        .unwrap_or(left);

    ColumnSpan::new(left, right, pos, focus)
}

fn display_of(store: &ColumnStore, index: usize) -> Option<usize> {
    store.get_column(index).and_then(|c| c.d_index)
}

fn scan_forward(store: &ColumnStore, from: usize, to: usize) -> Option<usize> {
    (from..=to).find_map(|i| display_of(store, i))
}

fn scan_backward(store: &ColumnStore, from: usize, to: usize) -> Option<usize> {
    (to..=from).rev().find_map(|i| display_of(store, i))
}

/// Closed-interval overlap on rows and on the columns of `kind`
pub fn ranges_overlap(a: &ResolvedRange, b: &ResolvedRange, kind: SpaceKind) -> bool {
    let vertical = a.top <= b.bottom && b.top <= a.bottom;
    let (sa, sb) = (a.span(kind), b.span(kind));
    let horizontal = sa.start <= sb.end && sb.start <= sa.end;
    vertical && horizontal
}

/// Inclusive interval of rows or columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub start: usize,
    pub end: usize,
}

impl Block {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn count(&self) -> usize {
        self.end + 1 - self.start
    }

    /// Overlapping or directly adjacent
    pub fn touches(&self, other: &Block) -> bool {
        self.start <= other.end.saturating_add(1) && other.start <= self.end.saturating_add(1)
    }

    fn union(&self, other: &Block) -> Block {
        Block {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Insert `block` into a sorted list of disjoint, non-adjacent blocks,
/// absorbing every block it touches. Absorbing can make the grown block touch
/// another neighbour, so the search repeats until nothing touches.
pub fn merge_adjacent_blocks(blocks: &mut Vec<Block>, block: Block) {
    let mut pending = block;
    while let Some(i) = blocks.iter().position(|b| pending.touches(b)) {
        let absorbed = blocks.remove(i);
        pending = pending.union(&absorbed);
    }
    let at = blocks.partition_point(|b| b.start < pending.start);
    blocks.insert(at, pending);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column::ColumnType;
    use crate::data::schema::{ColumnAction, ColumnSchema, DataSetInfo};

    /// F(hidden) A B H(hidden) C, 10 rows
    fn create_store() -> ColumnStore {
        let column = |id: u32, name: &str, hidden: bool| {
            let mut entry = ColumnSchema::new(ColumnAction::Insert, id);
            entry.name = Some(name.to_string());
            entry.column_type = Some(ColumnType::Data);
            entry.hidden = Some(hidden);
            entry
        };
        let mut info = DataSetInfo::default();
        info.schema.columns = vec![
            column(9, "F", true),
            column(1, "A", false),
            column(2, "B", false),
            column(5, "H", true),
            column(3, "C", false),
        ];
        info.schema.column_count = 5;
        info.schema.t_column_count = 5;
        info.schema.v_column_count = 3;
        info.schema.v_row_count = 10;
        info.schema.row_count = 10;
        let mut store = ColumnStore::new();
        store.setup(&info);
        store
    }

    #[test]
    fn test_display_to_real() {
        let store = create_store();
        let resolved = legitimise(&Range::display(0, 3, 1, 2), &store);
        assert_eq!((resolved.column_start(), resolved.column_end()), (2, 4));
        assert_eq!(resolved.source, SpaceKind::Display);
    }

    #[test]
    fn test_hidden_boundaries_walk_inward() {
        let store = create_store();
        // F..H: start F is hidden so scan forward to A, end H is hidden so scan back to B
        let resolved = legitimise(&Range::real(0, 0, 0, 3), &store);
        assert_eq!((resolved.left(), resolved.right()), (0, 1));
        assert_eq!(resolved.col_no(), 0);
    }

    #[test]
    fn test_hidden_anchors_resolve_in_opposite_directions() {
        let store = create_store();
        // A..C with the anchor and focus on hidden H
        let span = real_to_display(ColumnSpan::new(1, 4, 3, 3), &store);
        assert_eq!((span.start, span.end), (0, 2));
        assert_eq!(span.pos, 1);
        assert_eq!(span.focus, 0);

        // visible anchors are kept even outside the span
        let span = real_to_display(ColumnSpan::new(1, 2, 4, 4), &store);
        assert_eq!((span.start, span.end), (0, 1));
        assert_eq!((span.pos, span.focus), (2, 2));
    }

    #[test]
    fn test_range_inside_hidden_collapses() {
        let store = create_store();
        let resolved = legitimise(&Range::real(0, 0, 3, 3), &store);
        assert_eq!((resolved.left(), resolved.right()), (0, 0));
    }

    #[test]
    fn test_legitimise_is_idempotent() {
        let store = create_store();
        for range in [
            Range::real(2, 7, 0, 3),
            Range::display(0, 40, 2, 9),
            Range::cell(3, 3, SpaceKind::Real),
        ] {
            let once = legitimise(&range, &store);
            let twice = legitimise(&once.to_source_range(), &store);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_clip_clamps_every_field() {
        let store = create_store();
        let resolved = legitimise(&Range::display(5, 50, 1, 12), &store);
        assert_eq!((resolved.top, resolved.bottom), (5, 9));
        assert_eq!(resolved.right(), 2);
        assert_eq!(resolved.column_end(), 4);
    }

    #[test]
    fn test_empty_store_does_not_loop() {
        let store = ColumnStore::new();
        let resolved = legitimise(&Range::real(0, 0, 4, 8), &store);
        assert_eq!(resolved, ResolvedRange {
            source: SpaceKind::Real,
            ..Default::default()
        });
    }

    #[test]
    fn test_ranges_overlap_closed_intervals() {
        let store = create_store();
        let a = legitimise(&Range::display(0, 2, 0, 1), &store);
        let b = legitimise(&Range::display(2, 4, 1, 2), &store);
        let c = legitimise(&Range::display(3, 4, 0, 2), &store);
        assert!(ranges_overlap(&a, &b, SpaceKind::Display));
        assert!(!ranges_overlap(&a, &c, SpaceKind::Display));
    }

    #[test]
    fn test_merge_cascades() {
        let mut blocks = vec![Block::new(0, 1), Block::new(5, 6), Block::new(9, 9)];
        merge_adjacent_blocks(&mut blocks, Block::new(2, 4));
        assert_eq!(blocks, vec![Block::new(0, 6), Block::new(9, 9)]);
        merge_adjacent_blocks(&mut blocks, Block::new(8, 8));
        assert_eq!(blocks, vec![Block::new(0, 6), Block::new(8, 9)]);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let columns = [7usize, 3, 4, 12, 8, 0, 11, 5];
        let mut forward = Vec::new();
        for &c in &columns {
            merge_adjacent_blocks(&mut forward, Block::new(c, c));
        }
        let mut backward = Vec::new();
        for &c in columns.iter().rev() {
            merge_adjacent_blocks(&mut backward, Block::new(c, c));
        }
        assert_eq!(forward, backward);
        assert_eq!(
            forward,
            vec![Block::new(0, 0), Block::new(3, 5), Block::new(7, 8), Block::new(11, 12)]
        );
        for pair in forward.windows(2) {
            assert!(pair[0].end + 1 < pair[1].start);
        }
    }
}
