//! The materialised window of the data set
//!
//! Only the rectangle described by [`Viewport`] is held client side. Moving
//! the window keeps whatever the old and new rectangles share and reports the
//! newly exposed strips so the caller can fetch exactly those. Fetch results
//! are checked against the window on arrival, so a result for a window that
//! has since moved away is dropped instead of being written out of place.

use tracing::{debug, trace};

use crate::data::cells::{BlockExtent, CellArea, CellValue, FetchResult};
use crate::data::column_store::ColumnStore;
use crate::data::schema_diff::ColumnChange;

/// Window bounds, inclusive. Signed so that an empty window can be written as
/// `right = left - 1` or `bottom = top - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::empty()
    }
}

impl Viewport {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0, -1, -1)
    }

    pub fn column_count(&self) -> usize {
        (self.right - self.left + 1).max(0) as usize
    }

    pub fn row_count(&self) -> usize {
        (self.bottom - self.top + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.column_count() == 0 || self.row_count() == 0
    }

    pub fn contains(&self, row: usize, column: usize) -> bool {
        let (row, column) = (row as i64, column as i64);
        row >= self.top && row <= self.bottom && column >= self.left && column <= self.right
    }

    /// The window as a fetchable area, `None` when empty or negative
    pub fn area(&self) -> Option<CellArea> {
        to_area(self.left, self.top, self.right, self.bottom)
    }
}

impl From<CellArea> for Viewport {
    fn from(area: CellArea) -> Self {
        Self::new(
            area.left as i64,
            area.top as i64,
            area.right as i64,
            area.bottom as i64,
        )
    }
}

fn to_area(left: i64, top: i64, right: i64, bottom: i64) -> Option<CellArea> {
    if left < 0 || top < 0 || right < left || bottom < top {
        return None;
    }
    Some(CellArea::new(
        left as usize,
        top as usize,
        right as usize,
        bottom as usize,
    ))
}

/// A cache cell position relative to the window's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIndex {
    pub col_index: usize,
    pub row_index: usize,
}

/// Overlap of a fetched block with the window, in block-local and
/// window-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Union {
    pub block_row_start: usize,
    pub view_row_start: usize,
    pub row_count: usize,
    pub block_column_start: usize,
    pub view_column_start: usize,
    pub column_count: usize,
}

/// Overlap of `[start, start + count)` with `[view_start, view_end]` as
/// `(block offset, view offset, length)`
fn axis_union(start: i64, count: i64, view_start: i64, view_end: i64) -> Option<(usize, usize, usize)> {
    if count <= 0 || view_end < view_start {
        return None;
    }
    let end = start + count - 1;
    let lo = start.max(view_start);
    let hi = end.min(view_end);
    if lo > hi {
        return None;
    }
    Some(((lo - start) as usize, (lo - view_start) as usize, (hi - lo + 1) as usize))
}

#[derive(Debug, Clone, Default)]
pub struct ViewportCache {
    viewport: Viewport,
    /// Column-major cells of the window; `None` until fetched
    cells: Vec<Vec<Option<CellValue>>>,
    filtered: Vec<Option<bool>>,
    row_nums: Vec<Option<u64>>,
}

impl ViewportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Discard everything and allocate an empty window. Returns the area to
    /// fetch, if the window is not empty.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Option<CellArea> {
        let columns = viewport.column_count();
        let rows = viewport.row_count();

        self.cells = vec![vec![None; rows]; columns];
        self.filtered = vec![None; rows];
        self.row_nums = vec![None; rows];
        self.viewport = viewport;

        debug!(target: "viewport", "Viewport reset to {:?} ({}x{})", viewport, columns, rows);
        viewport.area()
    }

    /// Grow (positive) or shrink (negative) each edge outward by its delta.
    /// The left and top edges stop at 0. Cells shared by the old and new
    /// window are kept. Returns the newly exposed strips: full-height strips
    /// for new columns, and strips of the kept columns for new rows.
    pub fn reshape(&mut self, left: i64, top: i64, right: i64, bottom: i64) -> Vec<CellArea> {
        let old = self.viewport;
        let new = Viewport::new(
            (old.left - left).max(0),
            (old.top - top).max(0),
            old.right + right,
            old.bottom + bottom,
        );

        let columns = new.column_count();
        let rows = new.row_count();
        let mut cells = vec![vec![None; rows]; columns];
        let mut filtered = vec![None; rows];
        let mut row_nums = vec![None; rows];

        let shared_columns = axis_union(old.left, old.column_count() as i64, new.left, new.right);
        let shared_rows = axis_union(old.top, old.row_count() as i64, new.top, new.bottom);

        if let Some((old_row, new_row, row_count)) = shared_rows {
            for r in 0..row_count {
                filtered[new_row + r] = self.filtered[old_row + r];
                row_nums[new_row + r] = self.row_nums[old_row + r];
            }
            if let Some((old_col, new_col, column_count)) = shared_columns {
                for c in 0..column_count {
                    let source = &mut self.cells[old_col + c];
                    let target = &mut cells[new_col + c];
                    for r in 0..row_count {
                        target[new_row + r] = source[old_row + r].take();
                    }
                }
            }
        }

        self.cells = cells;
        self.filtered = filtered;
        self.row_nums = row_nums;
        self.viewport = new;

        let requests = Self::exposed_strips(&old, &new);
        trace!(target: "viewport", "Reshaped {:?} -> {:?}, {} strips to fetch", old, new, requests.len());
        requests
    }

    /// The parts of `new` outside `old`, without overlaps
    fn exposed_strips(old: &Viewport, new: &Viewport) -> Vec<CellArea> {
        let inner_left = old.left.max(new.left);
        let inner_right = old.right.min(new.right);

        let strips = [
            // columns left of the old window
            (new.left, new.top, new.right.min(old.left - 1), new.bottom),
            // columns right of the old window
            (new.left.max(old.right + 1), new.top, new.right, new.bottom),
            // rows above the old window, kept columns only
            (inner_left, new.top, inner_right, new.bottom.min(old.top - 1)),
            // rows below the old window, kept columns only
            (inner_left, new.top.max(old.bottom + 1), inner_right, new.bottom),
        ];

        if old.row_count() == 0 {
            // no kept rows means the kept columns are entirely new as well
            return to_area(inner_left, new.top, inner_right, new.bottom)
                .into_iter()
                .chain(strips[..2].iter().filter_map(|&(l, t, r, b)| to_area(l, t, r, b)))
                .collect();
        }

        strips
            .iter()
            .filter_map(|&(l, t, r, b)| to_area(l, t, r, b))
            .collect()
    }

    /// Where `block` lands in the window, `None` if it misses entirely.
    /// Blocks without columns (filter flags, row numbers) are matched on rows
    /// only.
    pub fn viewport_union(&self, block: &impl BlockExtent) -> Option<Union> {
        let view = &self.viewport;
        let (block_row_start, view_row_start, row_count) =
            axis_union(block.row_start() as i64, block.row_count() as i64, view.top, view.bottom)?;

        let mut union = Union {
            block_row_start,
            view_row_start,
            row_count,
            ..Default::default()
        };

        if let Some((column_start, column_count)) = block.columns() {
            let (block_column_start, view_column_start, column_count) =
                axis_union(column_start as i64, column_count as i64, view.left, view.right)?;
            union.block_column_start = block_column_start;
            union.view_column_start = view_column_start;
            union.column_count = column_count;
        }

        Some(union)
    }

    /// Write a fetch result into the window. Returns the touched cells and the
    /// rows whose labels changed; blocks outside the window touch nothing.
    pub fn set_cells(&mut self, result: &FetchResult) -> (Vec<CellIndex>, Vec<usize>) {
        let mut changed = Vec::new();

        for block in &result.data {
            let Some(union) = self.viewport_union(block) else {
                trace!(target: "viewport", "Dropping block outside the window at row {}", block.row_start);
                continue;
            };
            for c in 0..union.column_count {
                let col_index = union.view_column_start + c;
                let Some(source) = block.values.get(union.block_column_start + c) else {
                    continue;
                };
                for r in 0..union.row_count {
                    let row_index = union.view_row_start + r;
                    if let Some(value) = source.get(union.block_row_start + r) {
                        self.cells[col_index][row_index] = Some(value.clone());
                        changed.push(CellIndex { col_index, row_index });
                    }
                }
            }
        }

        for block in &result.filter_data {
            if let Some(union) = self.viewport_union(block) {
                for r in 0..union.row_count {
                    if let Some(&value) = block.values.get(union.block_row_start + r) {
                        self.filtered[union.view_row_start + r] = Some(value);
                    }
                }
            }
        }

        let mut labels = Vec::new();
        for block in &result.row_nums {
            if let Some(union) = self.viewport_union(block) {
                for r in 0..union.row_count {
                    if let Some(&value) = block.values.get(union.block_row_start + r) {
                        let index = union.view_row_start + r;
                        self.row_nums[index] = Some(value);
                        labels.push(index);
                    }
                }
            }
        }

        (changed, labels)
    }

    /// Keep the window aligned after columns were removed, hidden, created or
    /// shown. Removals shift by their old display index, highest first;
    /// insertions by their new display index, lowest first. Returns the
    /// columns inserted inside the window, which need fetching.
    pub fn apply_column_changes(&mut self, changes: &[ColumnChange], store: &ColumnStore) -> Vec<CellArea> {
        let current_d_index = |change: &ColumnChange| {
            store.get_column_by_id(change.id()).and_then(|c| c.d_index)
        };

        let mut removals: Vec<usize> = Vec::new();
        let mut insertions: Vec<usize> = Vec::new();

        for change in changes {
            match change {
                ColumnChange::Deleted { previous } => removals.extend(previous.d_index),
                ColumnChange::Created { .. } => insertions.extend(current_d_index(change)),
                ColumnChange::Modified(m) if m.flags.hidden => {
                    if m.current.hidden {
                        removals.extend(m.previous.d_index);
                    } else {
                        insertions.extend(current_d_index(change));
                    }
                }
                _ => {}
            }
        }

        removals.sort_unstable_by(|a, b| b.cmp(a));
        insertions.sort_unstable();

        for d_index in removals {
            self.remove_display_column(d_index as i64);
        }

        let mut requests = Vec::new();
        for d_index in insertions {
            if let Some(area) = self.insert_display_column(d_index as i64) {
                requests.push(area);
            }
        }

        if self.viewport.left < 0 {
            let shift = -self.viewport.left;
            self.viewport.left += shift;
            self.viewport.right += shift;
        }

        debug!(target: "viewport", "Window after column changes: {:?}", self.viewport);
        requests
    }

    fn remove_display_column(&mut self, d_index: i64) {
        let view = &mut self.viewport;
        if d_index > view.right {
            return;
        }
        if d_index < view.left {
            view.left -= 1;
            view.right -= 1;
            return;
        }
        let offset = (d_index - view.left) as usize;
        if offset < self.cells.len() {
            self.cells.remove(offset);
        }
        view.right -= 1;
    }

    fn insert_display_column(&mut self, d_index: i64) -> Option<CellArea> {
        let view = &mut self.viewport;
        if d_index > view.right {
            return None;
        }
        if d_index < view.left {
            view.left += 1;
            view.right += 1;
            return None;
        }
        let offset = (d_index - view.left) as usize;
        let rows = view.row_count();
        self.cells.insert(offset.min(self.cells.len()), vec![None; rows]);
        view.right += 1;
        to_area(d_index, view.top, d_index, view.bottom)
    }

    /// Cached cell at absolute `row`, `column`
    pub fn value_at(&self, row: usize, column: usize) -> Option<&CellValue> {
        if !self.viewport.contains(row, column) {
            return None;
        }
        let c = (column as i64 - self.viewport.left) as usize;
        let r = (row as i64 - self.viewport.top) as usize;
        self.cells.get(c)?.get(r)?.as_ref()
    }

    pub fn is_filtered(&self, row: usize) -> Option<bool> {
        let r = self.row_offset(row)?;
        self.filtered.get(r).copied().flatten()
    }

    pub fn row_label(&self, row: usize) -> Option<u64> {
        let r = self.row_offset(row)?;
        self.row_nums.get(r).copied().flatten()
    }

    fn row_offset(&self, row: usize) -> Option<usize> {
        let row = row as i64;
        if row < self.viewport.top || row > self.viewport.bottom {
            return None;
        }
        Some((row - self.viewport.top) as usize)
    }

    /// Column and row counts of the cached arrays
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cells.len(), self.filtered.len())
    }
}
