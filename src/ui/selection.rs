//! The grid selection: a primary range plus secondary sub-selections
//!
//! Every mutation goes through this type, which legitimises the new ranges
//! against the column store and notifies the registered observers. Which
//! column space drives the selection is chosen by `hidden_included`: the real
//! space when hidden columns take part (variable list), the display space
//! otherwise (spreadsheet).

use tracing::{debug, trace};

use crate::data::cells::{CellBlock, Value, WriteBlock};
use crate::data::column::{Column, ColumnId, ColumnType};
use crate::data::column_store::ColumnStore;
use crate::data::schema_diff::{ColumnChange, ProcessedResponse};
use crate::ui::range::{
    legitimise, merge_adjacent_blocks, ranges_overlap, Block, ColumnSpace, ColumnSpan, Range,
    ResolvedRange, SpaceKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// How a range joins the selection list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendKind {
    #[default]
    Positive,
    /// The new range is to be cut out of the existing selection
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionType {
    Single,
    Multi,
}

/// Secondary notifications about the shape of the selection
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    TypeChanged(SelectionType),
    SubselectionChanged,
    Cleared,
    Appended {
        previous: ResolvedRange,
        subtract: bool,
    },
}

/// Views that follow the selection
pub trait SelectionObserver: Send {
    /// The primary range changed. `silent` changes re-derive state after an
    /// external update and must not trigger edits.
    fn on_selection_changed(
        &mut self,
        old: &ResolvedRange,
        new: &ResolvedRange,
        silent: bool,
        ignore_tab_start: bool,
    );

    fn on_selection_event(&mut self, _event: &SelectionEvent) {}

    fn name(&self) -> &str;
}

pub struct Selection {
    current: ResolvedRange,
    sub_selections: Vec<ResolvedRange>,
    /// The last appended range is waiting to be subtracted
    negative: bool,
    hidden_included: bool,
    observers: Vec<Box<dyn SelectionObserver>>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("current", &self.current)
            .field("sub_selections", &self.sub_selections)
            .field("negative", &self.negative)
            .field("hidden_included", &self.hidden_included)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Selection {
    pub fn new() -> Self {
        Self {
            current: ResolvedRange::default(),
            sub_selections: Vec::new(),
            negative: false,
            hidden_included: false,
            observers: Vec::new(),
        }
    }

    pub fn with_hidden_included(mut self, hidden_included: bool) -> Self {
        self.hidden_included = hidden_included;
        self
    }

    pub fn register_observer(&mut self, observer: Box<dyn SelectionObserver>) {
        debug!(target: "selection", "Adding observer: {}", observer.name());
        self.observers.push(observer);
    }

    pub fn current(&self) -> &ResolvedRange {
        &self.current
    }

    pub fn sub_selections(&self) -> &[ResolvedRange] {
        &self.sub_selections
    }

    /// Sub-selections followed by the primary range
    pub fn all_ranges(&self) -> Vec<ResolvedRange> {
        let mut ranges = self.sub_selections.clone();
        ranges.push(self.current);
        ranges
    }

    pub fn row_no(&self) -> usize {
        self.current.row_no
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn hidden_included(&self) -> bool {
        self.hidden_included
    }

    /// Switch the authoritative column space
    pub fn set_hidden_included(&mut self, hidden_included: bool) {
        self.hidden_included = hidden_included;
    }

    /// The column space this selection works in
    pub fn space(&self) -> SpaceKind {
        if self.hidden_included {
            SpaceKind::Real
        } else {
            SpaceKind::Display
        }
    }

    fn span(&self, range: &ResolvedRange) -> ColumnSpan {
        range.span(self.space())
    }

    fn column_limit(&self, store: &ColumnStore) -> usize {
        match self.space() {
            SpaceKind::Display => store.v_column_count,
            SpaceKind::Real => store.column_count,
        }
    }

    fn emit(&mut self, event: SelectionEvent) {
        trace!(target: "selection", "Selection event: {:?}", event);
        for observer in &mut self.observers {
            observer.on_selection_event(&event);
        }
    }

    fn apply(&mut self, range: ResolvedRange, silent: bool, ignore_tab_start: bool) {
        let old = std::mem::replace(&mut self.current, range);
        debug!(
            target: "selection",
            "Selection rows {}..={} columns {}..={} (silent: {})",
            range.top,
            range.bottom,
            range.left(),
            range.right(),
            silent
        );
        for observer in &mut self.observers {
            observer.on_selection_changed(&old, &range, silent, ignore_tab_start);
        }
    }

    /// Collapse to the single cell at `row`, `column`
    pub fn set_selection(&mut self, store: &ColumnStore, row: usize, column: usize, clear_sub_selections: bool) {
        let range = Range::cell(row, column, self.space());
        let subs = if clear_sub_selections { Some(Vec::new()) } else { None };
        self.set_selections(store, range, subs, false, false);
    }

    /// Replace the primary range. `subs` of `None` keeps the current list,
    /// `Some` replaces it.
    pub fn set_selections(
        &mut self,
        store: &ColumnStore,
        primary: Range,
        subs: Option<Vec<Range>>,
        silent: bool,
        ignore_tab_start: bool,
    ) {
        let primary = legitimise(&primary, store);

        if let Some(subs) = subs {
            self.clear_selection_list();
            if !subs.is_empty() {
                self.sub_selections = subs.iter().map(|r| legitimise(r, store)).collect();
                self.emit(SelectionEvent::SubselectionChanged);
                self.emit(SelectionEvent::TypeChanged(SelectionType::Multi));
            } else {
                self.emit(SelectionEvent::TypeChanged(SelectionType::Single));
            }
        } else if self.sub_selections.is_empty() {
            self.emit(SelectionEvent::TypeChanged(SelectionType::Single));
        }

        self.apply(primary, silent, ignore_tab_start);
    }

    pub fn clear_selection_list(&mut self) {
        self.sub_selections.clear();
        self.emit(SelectionEvent::Cleared);
    }

    /// Push the current primary range onto the list and make `range` primary
    pub fn add_new_selection_to_list(&mut self, store: &ColumnStore, range: Range, kind: AppendKind) {
        let range = legitimise(&range, store);
        self.negative = kind == AppendKind::Negative;

        let previous = self.current;
        self.sub_selections.insert(0, previous);
        self.emit(SelectionEvent::Appended {
            previous,
            subtract: self.negative,
        });

        self.apply(range, false, false);
    }

    /// Subtract a negative primary range from the sub-selections. Fully
    /// covered sub-selections are dropped; partly covered ones are replaced by
    /// their top, bottom, left and right remainders. Returns false when there
    /// was nothing to subtract.
    pub fn resolve_selection_list(&mut self, store: &ColumnStore) -> bool {
        if !self.negative {
            return false;
        }

        let kind = self.space();
        let cut = self.current;
        let cut_span = cut.span(kind);

        let mut resolved = Vec::with_capacity(self.sub_selections.len());
        for sub in &self.sub_selections {
            let span = sub.span(kind);
            let contained = span.start >= cut_span.start
                && span.end <= cut_span.end
                && sub.top >= cut.top
                && sub.bottom <= cut.bottom;

            if contained {
                continue;
            }
            if !ranges_overlap(&cut, sub, kind) {
                resolved.push(sub.to_range(kind));
                continue;
            }
            resolved.extend(Self::slivers(sub, span, &cut, cut_span, kind));
        }

        self.negative = false;
        debug!(target: "selection", "Negative selection resolved into {} ranges", resolved.len());

        if resolved.is_empty() {
            let (row, column) = (cut.row_no, cut_span.pos);
            self.set_selection(store, row, column, true);
        } else {
            let primary = resolved.remove(0);
            self.set_selections(store, primary, Some(resolved), false, false);
        }
        true
    }

    /// Remainders of `sub` around its overlap with `cut`, top, bottom, left
    /// then right
    fn slivers(
        sub: &ResolvedRange,
        span: ColumnSpan,
        cut: &ResolvedRange,
        cut_span: ColumnSpan,
        kind: SpaceKind,
    ) -> Vec<Range> {
        let overlap_top = cut.top.max(sub.top);
        let overlap_bottom = cut.bottom.min(sub.bottom);
        let overlap_left = cut_span.start.max(span.start);
        let overlap_right = cut_span.end.min(span.end);

        let top = overlap_top - sub.top;
        let bottom = sub.bottom - overlap_bottom;
        let left = overlap_left - span.start;
        let right = span.end - overlap_right;

        let sliver = |t: usize, b: usize, l: usize, r: usize| {
            Range::new(t, b, ColumnSpace::new(kind, ColumnSpan::between(l, r)))
        };

        let mut out = Vec::new();
        if top > 0 {
            out.push(sliver(sub.top, sub.top + top - 1, span.start, span.end));
        }
        if bottom > 0 {
            out.push(sliver(sub.bottom - bottom + 1, sub.bottom, span.start, span.end));
        }
        if left > 0 {
            out.push(sliver(sub.top + top, sub.bottom - bottom, span.start, span.start + left - 1));
        }
        if right > 0 {
            out.push(sliver(sub.top + top, sub.bottom - bottom, span.end - right + 1, span.end));
        }
        out
    }

    /// Arrow-key movement. Extending shrinks back toward the anchor before
    /// growing past it. Returns false when an extension is already at the
    /// data set boundary.
    pub fn move_cursor(
        &mut self,
        store: &ColumnStore,
        direction: Direction,
        extend: bool,
        ignore_tab_start: bool,
    ) -> bool {
        let kind = self.space();
        let column_limit = self.column_limit(store);
        let row_limit = store.v_row_count;

        let current = self.current;
        let mut span = self.span(&current);
        let mut range = current.to_range(kind);

        match (direction, extend) {
            (Direction::Left, true) => {
                if span.end > span.pos {
                    span.end -= 1;
                    span.focus = span.end;
                } else if span.start > 0 {
                    span.start -= 1;
                    span.focus = span.start;
                } else {
                    return false;
                }
            }
            (Direction::Right, true) => {
                if span.start < span.pos {
                    span.start += 1;
                    span.focus = span.start;
                } else if span.end + 1 < column_limit {
                    span.end += 1;
                    span.focus = span.end;
                } else {
                    return false;
                }
            }
            (Direction::Up, true) => {
                if range.bottom > range.row_no {
                    range.bottom -= 1;
                    range.row_focus = range.bottom;
                } else if range.top > 0 {
                    range.top -= 1;
                    range.row_focus = range.top;
                } else {
                    return false;
                }
            }
            (Direction::Down, true) => {
                if range.top < range.row_no {
                    range.top += 1;
                    range.row_focus = range.top;
                } else if range.bottom + 1 < row_limit {
                    range.bottom += 1;
                    range.row_focus = range.bottom;
                } else {
                    return false;
                }
            }
            (direction, false) => {
                let mut row = current.row_no;
                let mut column = span.pos;
                match direction {
                    Direction::Left => column = column.saturating_sub(1),
                    Direction::Right => column = (column + 1).min(column_limit.saturating_sub(1)),
                    Direction::Up => row = row.saturating_sub(1),
                    Direction::Down => row = (row + 1).min(row_limit.saturating_sub(1)),
                }
                span = ColumnSpan::single(column);
                range = Range::new(row, row, range.columns);
            }
        }

        range.columns = ColumnSpace::new(kind, span);
        self.set_selections(store, range, Some(Vec::new()), false, ignore_tab_start);
        true
    }

    /// Minimal sorted column intervals covered by the whole selection
    pub fn selection_to_column_blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        for range in std::iter::once(&self.current).chain(&self.sub_selections) {
            let span = self.span(range);
            merge_adjacent_blocks(&mut blocks, Block::new(span.start, span.end));
        }
        blocks
    }

    /// Minimal sorted row intervals covered by the whole selection
    pub fn current_selection_to_row_blocks(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        for range in std::iter::once(&self.current).chain(&self.sub_selections) {
            merge_adjacent_blocks(&mut blocks, Block::new(range.top, range.bottom));
        }
        blocks
    }

    /// Every selected column once, ordered by real index
    pub fn current_selection_to_columns<'a>(&self, store: &'a ColumnStore) -> Vec<&'a Column> {
        let display = self.space() == SpaceKind::Display;
        let mut columns: Vec<&Column> = Vec::new();

        for range in std::iter::once(&self.current).chain(&self.sub_selections) {
            let span = self.span(range);
            for c in span.start..=span.end {
                if let Some(column) = store.get_column_in(c, display) {
                    if !columns.iter().any(|existing| existing.id == column.id) {
                        columns.push(column);
                    }
                }
            }
        }

        columns.sort_by_key(|c| c.index);
        columns
    }

    /// Select runs of adjacent columns on row `row_no`. The last run becomes
    /// the primary range.
    pub fn create_selections_from_columns(
        &mut self,
        store: &ColumnStore,
        row_no: usize,
        ids: &[ColumnId],
        silent: bool,
        ignore_tab_start: bool,
    ) {
        let kind = self.space();
        let mut positions: Vec<usize> = ids
            .iter()
            .filter_map(|&id| store.get_column_by_id(id))
            .filter_map(|c| match kind {
                SpaceKind::Display => c.d_index,
                SpaceKind::Real => Some(c.index),
            })
            .collect();
        positions.sort_unstable();
        positions.dedup();

        let mut runs: Vec<Block> = Vec::new();
        for position in positions {
            match runs.last_mut() {
                Some(run) if position == run.end + 1 => run.end = position,
                _ => runs.push(Block::new(position, position)),
            }
        }

        let Some(last) = runs.pop() else {
            debug!(target: "selection", "No selectable columns among {} ids", ids.len());
            return;
        };

        let to_range = |run: Block| {
            Range::new(row_no, row_no, ColumnSpace::new(kind, ColumnSpan::between(run.start, run.end)))
        };
        let subs = runs.into_iter().map(to_range).collect();
        self.set_selections(store, to_range(last), Some(subs), silent, ignore_tab_start);
    }

    /// Rebuild a sensible selection after an undo or redo. The first non-empty
    /// category wins: written cells, inserted columns, inserted or removed rows,
    /// then changed column properties. Returns false when none applied.
    pub fn undo_redo_data_to_selection(&mut self, store: &ColumnStore, processed: &ProcessedResponse) -> bool {
        let full_rows = store.visible_row_count().saturating_sub(1);
        let row_no = self.current.row_no;
        let mut selections: Vec<Range> = Vec::new();

        let written = processed
            .data_write
            .as_ref()
            .map(|w| w.data.as_slice())
            .unwrap_or_default();

        if !written.is_empty() {
            selections = Self::convert_area_data_to_selections(written);
        } else if !processed.inserted.is_empty() {
            let indices = processed.inserted.iter().filter_map(|placement| {
                let column = store.get_column_by_id(placement.id)?;
                if column.column_type == ColumnType::None {
                    return None;
                }
                column.d_index
            });
            selections = Self::column_runs(indices, full_rows, row_no);
        } else if !processed.rows_deleted.is_empty() || !processed.rows_inserted.is_empty() {
            let mut blocks = Vec::new();
            for span in processed.rows_deleted.iter().chain(&processed.rows_inserted) {
                if span.count > 0 {
                    merge_adjacent_blocks(&mut blocks, Block::new(span.row_start, span.row_start + span.count - 1));
                }
            }
            let right = store.v_column_count.saturating_sub(1);
            let col_no = self.current.col_no();
            selections = blocks
                .into_iter()
                .map(|b| Range::display(b.start, b.end, 0, right).with_column_anchor(col_no))
                .collect();
        }

        if selections.is_empty() {
            let indices = processed.column_changes.iter().filter_map(|change| {
                let d_index = change.previous_d_index()?;
                match change {
                    ColumnChange::Deleted { previous } if previous.column_type != ColumnType::None => {
                        Some(d_index)
                    }
                    ColumnChange::Modified(m) => {
                        let f = &m.flags;
                        let relevant = f.column_type
                            || f.measure_type
                            || f.data_type
                            || !m.level_name_changes.is_empty()
                            || f.formula
                            || f.name
                            || f.hidden;
                        relevant.then_some(d_index)
                    }
                    _ => None,
                }
            });
            selections = Self::column_runs(indices, full_rows, row_no);
        }

        if selections.is_empty() {
            return false;
        }

        selections.sort_by_key(|r| (r.top, r.columns.span().start));
        let primary = selections.remove(0);
        self.set_selections(store, primary, Some(selections), false, false);
        true
    }

    /// Full-height display ranges for `indices`, extending a range when an
    /// index lands right next to it
    fn column_runs(indices: impl Iterator<Item = usize>, bottom: usize, row_no: usize) -> Vec<Range> {
        let mut runs: Vec<Block> = Vec::new();
        for index in indices {
            let merged = runs.iter_mut().find_map(|run| {
                if index + 1 == run.start {
                    run.start = index;
                    Some(())
                } else if index == run.end + 1 {
                    run.end = index;
                    Some(())
                } else {
                    None
                }
            });
            if merged.is_none() {
                runs.push(Block::new(index, index));
            }
        }

        runs.into_iter()
            .map(|run| Range::display(0, bottom, run.start, run.end).with_row_anchor(row_no))
            .collect()
    }

    /// Display ranges covering each cell block, anchored on their top-left cell
    pub fn convert_area_data_to_selections(blocks: &[CellBlock]) -> Vec<Range> {
        blocks
            .iter()
            .filter_map(|b| b.area())
            .map(|a| Range::display(a.top, a.bottom, a.left, a.right))
            .collect()
    }

    /// Clip each selection to the data bounds and turn it into a write block.
    /// Clearing (`value` of `None`) is limited to real rows and columns;
    /// writing may extend into the virtual rows and columns past the end.
    pub fn build_write_blocks(
        &self,
        store: &ColumnStore,
        selections: &[ResolvedRange],
        value: Option<&Value>,
    ) -> Vec<WriteBlock> {
        let (row_limit, column_limit) = match value {
            None => (store.row_count, store.visible_real_column_count()),
            Some(_) => (store.v_row_count, store.v_column_count),
        };
        if row_limit == 0 || column_limit == 0 {
            return Vec::new();
        }

        let mut blocks = Vec::new();
        for selection in selections {
            if selection.top > row_limit - 1 || selection.left() > column_limit - 1 {
                continue;
            }
            let bottom = selection.bottom.min(row_limit - 1);
            let right = selection.right().min(column_limit - 1);
            let row_count = bottom - selection.top + 1;
            let column_count = right - selection.left() + 1;

            let values = match value {
                None => Vec::new(),
                Some(v) => vec![vec![v.clone(); row_count]; column_count],
            };
            blocks.push(WriteBlock {
                row_start: selection.top,
                row_count,
                column_start: selection.left(),
                column_count,
                clear: value.is_none(),
                values,
            });
        }
        blocks
    }

    /// Select every real cell
    pub fn select_all(&mut self, store: &ColumnStore) {
        let right = store.visible_real_column_count().saturating_sub(1);
        let bottom = store.visible_row_count().saturating_sub(1);
        self.set_selections(store, Range::display(0, bottom, 0, right), Some(Vec::new()), false, false);
    }

    /// Re-derive the selection after the store changed underneath it
    pub fn refresh_selection(&mut self, store: &ColumnStore) {
        if let Some(columns) = store.editing_columns(!self.hidden_included) {
            if !columns.is_empty() {
                let ids: Vec<ColumnId> = columns.iter().map(|c| c.id).collect();
                let row_no = self.current.row_no;
                self.create_selections_from_columns(store, row_no, &ids, false, false);
                return;
            }
        }

        let kind = self.space();
        let primary = self.current.to_range(kind);
        let subs = self.sub_selections.iter().map(|s| s.to_range(kind)).collect();
        self.set_selections(store, primary, Some(subs), true, false);
    }

    pub fn cell_in_selection(&self, row: usize, column: usize) -> bool {
        let kind = self.space();
        std::iter::once(&self.current)
            .chain(&self.sub_selections)
            .any(|r| r.contains_cell(row, column, kind))
    }

    /// Clicking the header of `column` hits a range spanning every row
    pub fn is_full_column_selection_click(&self, store: &ColumnStore, column: usize) -> bool {
        let last_row = store.visible_row_count().saturating_sub(1);
        std::iter::once(&self.current)
            .chain(&self.sub_selections)
            .any(|r| self.span(r).contains(column) && r.top == 0 && r.bottom == last_row)
    }

    /// Clicking the label of `row` hits a range spanning every column
    pub fn is_full_row_selection_click(&self, store: &ColumnStore, row: usize) -> bool {
        let last_column = store.column_count.saturating_sub(1);
        std::iter::once(&self.current)
            .chain(&self.sub_selections)
            .any(|r| {
                let span = self.span(r);
                row >= r.top && row <= r.bottom && span.start == 0 && span.end == last_column
            })
    }
}
