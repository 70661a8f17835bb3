use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

use crate::data::column::{Column, ColumnId, ColumnType, Transform, TransformId};
use crate::data::error::DataSetError;
use crate::data::schema::{DataSetInfo, DataSetSchema, RowRange};

/// Authoritative owner of the ordered column list, the transforms and the
/// data set counts
///
/// Columns are addressed three ways: by id (hash lookup), by real index
/// (position in the vector) and by display index (forward scan from the
/// display index, which can never be past the column's real position).
#[derive(Debug, Clone, Default)]
pub struct ColumnStore {
    columns: Vec<Column>,
    by_id: HashMap<ColumnId, usize>,
    transforms: Vec<Transform>,

    /// Real rows, filtered rows included
    pub row_count: usize,
    /// Rows including the virtual rows past the end of the data
    pub v_row_count: usize,
    /// Real columns, excluding the virtual columns past the end
    pub column_count: usize,
    /// Visible columns, virtual ones included
    pub v_column_count: usize,
    /// All columns, virtual ones included
    pub t_column_count: usize,
    pub row_count_ex_filtered: usize,
    pub deleted_row_count: usize,
    pub added_row_count: usize,
    pub edited_cell_count: usize,
    pub filters_visible: bool,
    pub removed_row_ranges: Vec<RowRange>,

    pub edited: bool,
    pub changes_count: usize,
    pub changes_position: usize,

    /// Columns currently open in the variable editor
    pub editing_var: Option<Vec<ColumnId>>,
}

impl ColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with the contents of a freshly opened data set
    pub fn setup(&mut self, info: &DataSetInfo) {
        let schema = &info.schema;

        self.columns = schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.to_column(i))
            .collect();
        self.rebuild_id_index();
        self.update_display_indices();

        self.transforms = schema.transforms.iter().map(|t| t.to_transform()).collect();

        self.column_count = schema.column_count;
        self.v_column_count = schema.v_column_count;
        self.t_column_count = schema.t_column_count;
        self.filters_visible = schema.filters_visible;
        self.copy_row_counts(schema);

        self.edited = info.edited;
        self.changes_count = info.changes_count;
        self.changes_position = info.changes_position;
        self.editing_var = None;

        debug!(
            target: "dataset",
            "Store set up with {} columns ({} visible), {} rows",
            self.columns.len(),
            self.v_column_count,
            self.row_count
        );
    }

    /// Row counts are reported in full with every schema
    pub fn copy_row_counts(&mut self, schema: &DataSetSchema) {
        self.row_count = schema.row_count;
        self.v_row_count = schema.v_row_count;
        self.deleted_row_count = schema.deleted_row_count;
        self.added_row_count = schema.added_row_count;
        self.edited_cell_count = schema.edited_cell_count;
        self.row_count_ex_filtered = schema.row_count_ex_filtered;
        self.removed_row_ranges = schema.removed_row_ranges.clone();
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column at real index `index`
    pub fn get_column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn get_column_by_id(&self, id: ColumnId) -> Option<&Column> {
        self.by_id.get(&id).and_then(|&i| self.columns.get(i))
    }

    pub fn get_column_by_id_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        match self.by_id.get(&id) {
            Some(&i) => self.columns.get_mut(i),
            None => None,
        }
    }

    pub fn contains(&self, id: ColumnId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Column at display index `d_index`
    pub fn get_column_by_display(&self, d_index: usize) -> Option<&Column> {
        self.columns
            .iter()
            .skip(d_index)
            .find(|c| c.d_index == Some(d_index))
    }

    /// Column at `index` in whichever space `display` selects
    pub fn get_column_in(&self, index: usize, display: bool) -> Option<&Column> {
        if display {
            self.get_column_by_display(index)
        } else {
            self.get_column(index)
        }
    }

    /// The first virtual column past the end of the data
    pub fn first_empty_column(&self) -> Option<&Column> {
        self.get_column(self.column_count)
    }

    pub fn index_to_display_index(&self, index: usize) -> Option<usize> {
        self.columns.get(index).and_then(|c| c.d_index)
    }

    pub fn index_from_display_index(&self, d_index: usize) -> Result<usize> {
        match self.get_column_by_display(d_index) {
            Some(column) => Ok(column.index),
            None => Err(DataSetError::invalid(format!(
                "Column display index {} out of range",
                d_index
            ))
            .into()),
        }
    }

    /// Assign sequential display indices to visible columns in real order
    pub fn update_display_indices(&mut self) {
        let mut d_index = 0;
        for column in &mut self.columns {
            if column.hidden {
                column.d_index = None;
            } else {
                column.d_index = Some(d_index);
                d_index += 1;
            }
        }
    }

    /// Number of visible columns, counted from the columns themselves
    pub fn visible_column_count(&self) -> usize {
        self.columns.iter().filter(|c| !c.hidden).count()
    }

    /// Number of leading filter columns, optionally only the active ones
    pub fn filter_count(&self, only_active: bool) -> usize {
        self.columns
            .iter()
            .take_while(|c| c.column_type == ColumnType::Filter)
            .filter(|c| !only_active || c.active)
            .count()
    }

    /// Visible columns that hold real data
    pub fn visible_real_column_count(&self) -> usize {
        let virtual_count = self.t_column_count.saturating_sub(self.column_count);
        self.v_column_count.saturating_sub(virtual_count)
    }

    /// Rows the grid shows, depending on whether filtered rows are displayed
    pub fn visible_row_count(&self) -> usize {
        if self.filters_visible {
            self.row_count
        } else {
            self.row_count_ex_filtered
        }
    }

    /// Insert `column` at its `index`, clamped to the end of the list, and
    /// renumber everything after it. Returns the position used.
    pub fn insert_column(&mut self, mut column: Column) -> usize {
        let index = column.index.min(self.columns.len());
        column.index = index;
        self.columns.insert(index, column);
        self.renumber_from(index);
        index
    }

    /// Remove the column with `id`, renumbering the trailing columns
    pub fn remove_column(&mut self, id: ColumnId) -> Option<Column> {
        let index = self.by_id.remove(&id)?;
        let column = self.columns.remove(index);
        self.renumber_from(index);
        Some(column)
    }

    fn renumber_from(&mut self, start: usize) {
        for (i, column) in self.columns.iter_mut().enumerate().skip(start) {
            column.index = i;
            self.by_id.insert(column.id, i);
        }
    }

    fn rebuild_id_index(&mut self) {
        self.by_id = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
    }

    /// Editing columns, skipping hidden ones when `display_only` is set
    pub fn editing_columns(&self, display_only: bool) -> Option<Vec<&Column>> {
        let ids = self.editing_var.as_ref()?;
        Some(
            ids.iter()
                .filter_map(|&id| self.get_column_by_id(id))
                .filter(|c| !(display_only && c.hidden))
                .collect(),
        )
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn get_transform_by_id(&self, id: TransformId) -> Option<&Transform> {
        self.transforms.iter().find(|t| t.id == id)
    }

    pub fn get_transform_by_id_mut(&mut self, id: TransformId) -> Option<&mut Transform> {
        self.transforms.iter_mut().find(|t| t.id == id)
    }

    pub fn push_transform(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    pub fn remove_transform(&mut self, id: TransformId) -> Option<Transform> {
        let pos = self.transforms.iter().position(|t| t.id == id)?;
        Some(self.transforms.remove(pos))
    }

    /// True when ids, real indices and display indices are all consistent
    pub fn indices_consistent(&self) -> bool {
        let mut next_display = 0;
        for (i, column) in self.columns.iter().enumerate() {
            if column.index != i || self.by_id.get(&column.id) != Some(&i) {
                return false;
            }
            match (column.hidden, column.d_index) {
                (true, None) => {}
                (false, Some(d)) if d == next_display => next_display += 1,
                _ => return false,
            }
        }
        self.by_id.len() == self.columns.len()
    }
}
