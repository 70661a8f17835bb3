//! Turns a data source response into typed change records
//!
//! The engine applies the schema delta carried by a [`DataSetResponse`] to the
//! [`ColumnStore`] and reports exactly what changed, so consumers never have to
//! compare old and new state themselves.

use tracing::{debug, trace, warn};

use crate::data::cells::FetchResult;
use crate::data::column::{
    Column, ColumnId, ColumnType, DataType, MeasureType, TransformId, VariableLevel,
};
use crate::data::column_store::ColumnStore;
use crate::data::schema::{
    ColumnAction, ColumnSchema, DataSetResponse, RowDataAction, TransformAction, TransformSchema,
};
use crate::state::events::DataSetEvent;

/// Tracked properties of a column at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSnapshot {
    pub id: ColumnId,
    pub name: String,
    pub index: usize,
    pub d_index: Option<usize>,
    pub column_type: ColumnType,
    pub data_type: DataType,
    pub measure_type: MeasureType,
    pub hidden: bool,
    pub active: bool,
    pub description: String,
    pub formula: String,
    pub formula_message: String,
    pub transform: Option<TransformId>,
    pub parent_id: Option<ColumnId>,
    pub dps: u32,
}

impl ColumnSnapshot {
    pub fn of(column: &Column) -> Self {
        Self {
            id: column.id,
            name: column.name.clone(),
            index: column.index,
            d_index: column.d_index,
            column_type: column.column_type,
            data_type: column.data_type,
            measure_type: column.measure_type,
            hidden: column.hidden,
            active: column.active,
            description: column.description.clone(),
            formula: column.formula.clone(),
            formula_message: column.formula_message.clone(),
            transform: column.transform,
            parent_id: column.parent_id,
            dps: column.dps,
        }
    }
}

/// Which tracked properties of a modified column changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnChangeFlags {
    pub name: bool,
    pub description: bool,
    pub column_type: bool,
    pub data_type: bool,
    pub measure_type: bool,
    pub hidden: bool,
    pub active: bool,
    pub transform: bool,
    pub parent_id: bool,
    pub formula: bool,
    pub formula_message: bool,
    pub dps: bool,
    /// Level set or order changed, or a level was renamed
    pub levels: bool,
    pub missing_values: bool,
    /// Cell data of the column changed
    pub data: bool,
}

impl ColumnChangeFlags {
    fn between(previous: &ColumnSnapshot, current: &ColumnSnapshot) -> Self {
        Self {
            name: previous.name != current.name,
            description: previous.description != current.description,
            column_type: previous.column_type != current.column_type,
            data_type: previous.data_type != current.data_type,
            measure_type: previous.measure_type != current.measure_type,
            hidden: previous.hidden != current.hidden,
            active: previous.active != current.active,
            transform: previous.transform != current.transform,
            parent_id: previous.parent_id != current.parent_id,
            formula: previous.formula != current.formula,
            formula_message: previous.formula_message != current.formula_message,
            dps: previous.dps != current.dps,
            levels: false,
            missing_values: false,
            data: false,
        }
    }

    pub fn any(&self) -> bool {
        *self != Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelNameChange {
    pub old_label: String,
    pub new_label: String,
}

/// Outcome of comparing a column's levels before and after a change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelChanges {
    pub renamed: Vec<LevelNameChange>,
    /// The level count changed or a level moved
    pub order_changed: bool,
}

impl LevelChanges {
    /// Renames are matched by import value; order is compared positionally
    pub fn between(old: Option<&[VariableLevel]>, new: Option<&[VariableLevel]>) -> Self {
        let (old, new) = match (old, new) {
            (Some(old), Some(new)) => (old, new),
            _ => return Self::default(),
        };

        let mut order_changed = old.len() != new.len();
        let mut renamed = Vec::new();

        for (i, level) in new.iter().enumerate() {
            if !order_changed {
                order_changed = old[i].import_value != level.import_value;
            }
            if let Some(prev) = old.iter().find(|l| l.import_value == level.import_value) {
                if prev.label != level.label {
                    renamed.push(LevelNameChange {
                        old_label: prev.label.clone(),
                        new_label: level.label.clone(),
                    });
                }
            }
        }

        Self {
            renamed,
            order_changed,
        }
    }

    pub fn changed(&self) -> bool {
        self.order_changed || !self.renamed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnModified {
    pub previous: ColumnSnapshot,
    pub current: ColumnSnapshot,
    pub flags: ColumnChangeFlags,
    pub level_name_changes: Vec<LevelNameChange>,
}

/// One change record per affected column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    Created {
        column: ColumnSnapshot,
        data_changed: bool,
    },
    Deleted {
        previous: ColumnSnapshot,
    },
    Modified(ColumnModified),
    /// Only the cell data of the column changed
    DataChanged {
        column: ColumnSnapshot,
    },
}

impl ColumnChange {
    pub fn id(&self) -> ColumnId {
        match self {
            ColumnChange::Created { column, .. } => column.id,
            ColumnChange::Deleted { previous } => previous.id,
            ColumnChange::Modified(m) => m.current.id,
            ColumnChange::DataChanged { column } => column.id,
        }
    }

    /// Real index after the change, or the last known index for deletions
    pub fn index(&self) -> usize {
        match self {
            ColumnChange::Created { column, .. } => column.index,
            ColumnChange::Deleted { previous } => previous.index,
            ColumnChange::Modified(m) => m.current.index,
            ColumnChange::DataChanged { column } => column.index,
        }
    }

    /// Display index before the change; `None` for creations
    pub fn previous_d_index(&self) -> Option<usize> {
        match self {
            ColumnChange::Created { .. } => None,
            ColumnChange::Deleted { previous } => previous.d_index,
            ColumnChange::Modified(m) => m.previous.d_index,
            ColumnChange::DataChanged { column } => column.d_index,
        }
    }

    /// Column type before the change
    pub fn previous_column_type(&self) -> ColumnType {
        match self {
            ColumnChange::Created { .. } => ColumnType::None,
            ColumnChange::Deleted { previous } => previous.column_type,
            ColumnChange::Modified(m) => m.previous.column_type,
            ColumnChange::DataChanged { column } => column.column_type,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ColumnChange::Created { column, .. } => &column.name,
            ColumnChange::Deleted { previous } => &previous.name,
            ColumnChange::Modified(m) => &m.current.name,
            ColumnChange::DataChanged { column } => &column.name,
        }
    }

    pub fn data_changed(&self) -> bool {
        match self {
            ColumnChange::Created { data_changed, .. } => *data_changed,
            ColumnChange::Deleted { .. } => false,
            ColumnChange::Modified(m) => m.flags.data,
            ColumnChange::DataChanged { .. } => true,
        }
    }

    fn mark_data_changed(&mut self) {
        match self {
            ColumnChange::Created { data_changed, .. } => *data_changed = true,
            ColumnChange::Modified(m) => m.flags.data = true,
            ColumnChange::Deleted { .. } | ColumnChange::DataChanged { .. } => {}
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ColumnChange::Created { .. })
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ColumnChange::Deleted { .. })
    }

    pub fn as_modified(&self) -> Option<&ColumnModified> {
        match self {
            ColumnChange::Modified(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformChangeFlags {
    pub name: bool,
    pub formula_message: bool,
    pub measure_type: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformChange {
    Created {
        id: TransformId,
        name: String,
    },
    Updated {
        id: TransformId,
        name: String,
        old_name: String,
        flags: TransformChangeFlags,
    },
    Deleted {
        id: TransformId,
        name: String,
    },
}

impl TransformChange {
    pub fn id(&self) -> TransformId {
        match self {
            TransformChange::Created { id, .. }
            | TransformChange::Updated { id, .. }
            | TransformChange::Deleted { id, .. } => *id,
        }
    }
}

/// Where a column sits (or sat) in both coordinate spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPlacement {
    pub id: ColumnId,
    pub index: usize,
    pub d_index: Option<usize>,
}

/// A contiguous run of columns whose `active` flag changed to `value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRange {
    pub start: usize,
    pub end: usize,
    pub d_start: Option<usize>,
    pub d_end: Option<usize>,
    pub value: bool,
}

/// Rows inserted or removed by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub row_start: usize,
    pub count: usize,
}

/// Tallies of one pass, used to resize the column counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
    pub created: usize,
    pub deleted: usize,
    pub visible_created: usize,
    pub visible_deleted: usize,
    /// Columns that became hidden
    pub hidden: usize,
    /// Columns that became visible
    pub visible: usize,
}

impl DiffCounts {
    pub fn structural(&self) -> bool {
        self.created > 0 || self.deleted > 0 || self.hidden > 0 || self.visible > 0
    }
}

/// Everything one response changed
#[derive(Debug, Clone, Default)]
pub struct ProcessedResponse {
    pub column_changes: Vec<ColumnChange>,
    pub transform_changes: Vec<TransformChange>,
    pub rows_deleted: Vec<RowSpan>,
    pub rows_inserted: Vec<RowSpan>,
    /// Columns created by this response, with their new placements
    pub inserted: Vec<ColumnPlacement>,
    /// Cells written by the request, when the response carried data
    pub data_write: Option<FetchResult>,
    pub counts: DiffCounts,
    /// Grouped notifications in delivery order
    pub events: Vec<DataSetEvent>,
    /// The whole view needs redrawing
    pub refresh: bool,
}

impl ProcessedResponse {
    pub fn has_schema_changes(&self) -> bool {
        !self.column_changes.is_empty() || !self.transform_changes.is_empty()
    }
}

/// Applies schema deltas to a [`ColumnStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDiffEngine;

impl SchemaDiffEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, store: &mut ColumnStore, response: &DataSetResponse) -> ProcessedResponse {
        store.changes_count = response.changes_count;
        store.changes_position = response.changes_position;

        let mut out = ProcessedResponse::default();
        self.process_row_data(response, &mut out);

        if let Some(schema) = &response.schema {
            store.filters_visible = schema.filters_visible;

            let mut entries: Vec<&ColumnSchema> = schema.columns.iter().collect();
            entries.sort_by_key(|e| (e.action != ColumnAction::Remove, e.index.unwrap_or(0)));

            for entry in entries {
                if entry.action == ColumnAction::Remove {
                    self.remove_column(store, entry, &mut out);
                } else if store.contains(entry.column_id()) {
                    self.modify_column(store, entry, &mut out);
                } else {
                    self.create_column(store, entry, &mut out);
                }
            }

            let counts = out.counts;
            if counts.created > 0 || counts.deleted > 0 {
                store.column_count = (store.column_count + counts.created).saturating_sub(counts.deleted);
                store.t_column_count =
                    (store.t_column_count + counts.created).saturating_sub(counts.deleted);
            }
            if counts.structural() {
                store.v_column_count = (store.v_column_count + counts.visible_created + counts.visible)
                    .saturating_sub(counts.visible_deleted + counts.hidden);
            }

            store.copy_row_counts(schema);

            if counts.structural() {
                store.update_display_indices();
            }

            self.process_transforms(store, &schema.transforms, &mut out);
        }

        if response.has_data() {
            store.edited = true;
            out.data_write = Some(FetchResult::from_response(response));
        }

        self.build_events(store, response, &mut out);

        debug!(
            target: "schema_diff",
            "Processed response: {} column changes, {} transform changes, {:?}",
            out.column_changes.len(),
            out.transform_changes.len(),
            out.counts
        );

        out
    }

    fn process_row_data(&self, response: &DataSetResponse, out: &mut ProcessedResponse) {
        for row in &response.rows {
            let span = RowSpan {
                row_start: row.row_start,
                count: row.row_count,
            };
            match row.action {
                RowDataAction::Remove => out.rows_deleted.push(span),
                RowDataAction::Insert => out.rows_inserted.push(span),
                RowDataAction::Modify => {}
            }
        }
    }

    fn remove_column(&self, store: &mut ColumnStore, entry: &ColumnSchema, out: &mut ProcessedResponse) {
        let Some(column) = store.remove_column(entry.column_id()) else {
            debug!(target: "schema_diff", "Ignoring removal of unknown column {}", entry.id);
            return;
        };

        trace!(target: "schema_diff", "Column {} '{}' removed at {}", column.id, column.name, column.index);
        out.counts.deleted += 1;
        if !column.hidden {
            out.counts.visible_deleted += 1;
        }
        out.column_changes.push(ColumnChange::Deleted {
            previous: ColumnSnapshot::of(&column),
        });
    }

    fn modify_column(&self, store: &mut ColumnStore, entry: &ColumnSchema, out: &mut ProcessedResponse) {
        let Some(column) = store.get_column_by_id_mut(entry.column_id()) else {
            return;
        };

        let previous = ColumnSnapshot::of(column);
        let old_levels = column.levels.clone();
        let old_missing = column.missing_values.clone();

        entry.apply_to(column);

        let current = ColumnSnapshot::of(column);
        let levels = LevelChanges::between(old_levels.as_deref(), column.levels.as_deref());

        let mut flags = ColumnChangeFlags::between(&previous, &current);
        flags.levels = levels.changed();
        flags.missing_values = old_missing != column.missing_values;
        flags.data = entry.data_changed;

        if flags.hidden {
            if current.hidden {
                out.counts.hidden += 1;
            } else {
                out.counts.visible += 1;
            }
        }

        if !flags.any() {
            trace!(target: "schema_diff", "Column {} reported without changes", current.id);
        }

        out.column_changes.push(ColumnChange::Modified(ColumnModified {
            previous,
            current,
            flags,
            level_name_changes: levels.renamed,
        }));
    }

    fn create_column(&self, store: &mut ColumnStore, entry: &ColumnSchema, out: &mut ProcessedResponse) {
        let requested = entry.index.unwrap_or(store.len());
        if requested > store.len() {
            warn!(
                target: "schema_diff",
                "Column {} inserted past the end ({} > {}), appending",
                entry.id,
                requested,
                store.len()
            );
        }

        let column = entry.to_column(requested);
        let hidden = column.hidden;
        let index = store.insert_column(column);

        out.counts.created += 1;
        if !hidden {
            out.counts.visible_created += 1;
        }

        if let Some(column) = store.get_column(index) {
            out.column_changes.push(ColumnChange::Created {
                column: ColumnSnapshot::of(column),
                data_changed: entry.data_changed,
            });
        }
    }

    fn process_transforms(
        &self,
        store: &mut ColumnStore,
        entries: &[TransformSchema],
        out: &mut ProcessedResponse,
    ) {
        for entry in entries {
            let id = entry.transform_id();

            if entry.action == TransformAction::Remove {
                match store.remove_transform(id) {
                    Some(removed) => out.transform_changes.push(TransformChange::Deleted {
                        id,
                        name: removed.name,
                    }),
                    None => debug!(target: "schema_diff", "Ignoring removal of unknown transform {}", id),
                }
                continue;
            }

            match store.get_transform_by_id_mut(id) {
                Some(transform) => {
                    let old_name = transform.name.clone();
                    let old_message = transform.formula_message.clone();
                    let old_measure = transform.measure_type;
                    entry.apply_to(transform);
                    out.transform_changes.push(TransformChange::Updated {
                        id,
                        name: transform.name.clone(),
                        flags: TransformChangeFlags {
                            name: old_name != transform.name,
                            formula_message: old_message != transform.formula_message,
                            measure_type: old_measure != transform.measure_type,
                        },
                        old_name,
                    });
                }
                None => {
                    let transform = entry.to_transform();
                    out.transform_changes.push(TransformChange::Created {
                        id,
                        name: transform.name.clone(),
                    });
                    store.push_transform(transform);
                }
            }
        }
    }

    fn build_events(&self, store: &ColumnStore, response: &DataSetResponse, out: &mut ProcessedResponse) {
        let counts = out.counts;

        if counts.deleted > 0 {
            let columns = out
                .column_changes
                .iter()
                .filter_map(|change| match change {
                    ColumnChange::Deleted { previous } => Some(ColumnPlacement {
                        id: previous.id,
                        index: previous.index,
                        d_index: previous.d_index,
                    }),
                    _ => None,
                })
                .collect();
            out.events.push(DataSetEvent::ColumnsDeleted { columns });
        }

        if counts.hidden > 0 {
            let columns = Self::hidden_changes(&out.column_changes, true)
                .map(|m| ColumnPlacement {
                    id: m.current.id,
                    index: m.current.index,
                    d_index: m.previous.d_index,
                })
                .collect();
            out.events.push(DataSetEvent::ColumnsHidden { columns });
            out.refresh = true;
        }

        if counts.visible > 0 {
            let columns = Self::hidden_changes(&out.column_changes, false)
                .map(|m| Self::placement_now(store, m.current.id, m.current.index))
                .collect();
            out.events.push(DataSetEvent::ColumnsVisible { columns });
            out.refresh = true;
        }

        if counts.created > 0 {
            let inserted: Vec<ColumnPlacement> = out
                .column_changes
                .iter()
                .filter_map(|change| match change {
                    ColumnChange::Created { column, .. } => {
                        Some(Self::placement_now(store, column.id, column.index))
                    }
                    _ => None,
                })
                .collect();
            out.events.push(DataSetEvent::ColumnsInserted {
                columns: inserted.clone(),
            });
            out.inserted = inserted;
        }

        let mut active_ranges = clump_active_changes(&out.column_changes, true);
        active_ranges.extend(clump_active_changes(&out.column_changes, false));
        for range in active_ranges {
            out.events.push(DataSetEvent::ColumnsActiveChanged(range));
        }

        self.merge_data_changes(store, response, out);

        if !out.column_changes.is_empty() {
            out.events.push(DataSetEvent::ColumnsChanged {
                changes: out.column_changes.clone(),
            });
        }

        if !out.transform_changes.is_empty() {
            for change in &out.transform_changes {
                match change {
                    TransformChange::Deleted { id, .. } => {
                        out.events.push(DataSetEvent::TransformRemoved { id: *id })
                    }
                    TransformChange::Created { id, .. } => {
                        out.events.push(DataSetEvent::TransformAdded { id: *id })
                    }
                    TransformChange::Updated { .. } => {}
                }
            }
            out.events.push(DataSetEvent::TransformsChanged {
                changes: out.transform_changes.clone(),
            });
        }

        for span in &out.rows_deleted {
            out.events.push(DataSetEvent::RowsDeleted(*span));
            out.refresh = true;
        }
        for span in &out.rows_inserted {
            out.events.push(DataSetEvent::RowsInserted(*span));
            out.refresh = true;
        }

        if response.filters_changed {
            out.refresh = true;
        }
    }

    /// Flag every column touched by a written cell block, matching by id
    fn merge_data_changes(&self, store: &ColumnStore, response: &DataSetResponse, out: &mut ProcessedResponse) {
        for block in &response.data {
            for c in 0..block.column_count {
                let Some(column) = store.get_column_by_display(block.column_start + c) else {
                    continue;
                };
                match out.column_changes.iter_mut().find(|ch| ch.id() == column.id) {
                    Some(change) => change.mark_data_changed(),
                    None => out.column_changes.push(ColumnChange::DataChanged {
                        column: ColumnSnapshot::of(column),
                    }),
                }
            }
        }
    }

    fn hidden_changes(
        changes: &[ColumnChange],
        now_hidden: bool,
    ) -> impl Iterator<Item = &ColumnModified> {
        changes
            .iter()
            .filter_map(ColumnChange::as_modified)
            .filter(move |m| m.flags.hidden && m.current.hidden == now_hidden)
    }

    fn placement_now(store: &ColumnStore, id: ColumnId, fallback_index: usize) -> ColumnPlacement {
        match store.get_column_by_id(id) {
            Some(column) => ColumnPlacement {
                id,
                index: column.index,
                d_index: column.d_index,
            },
            None => ColumnPlacement {
                id,
                index: fallback_index,
                d_index: None,
            },
        }
    }
}

/// Group the columns whose `active` flag changed to `value` into runs of
/// adjacent real indices
pub fn clump_active_changes(changes: &[ColumnChange], value: bool) -> Vec<ActiveRange> {
    let mut ranges: Vec<ActiveRange> = Vec::new();

    for modified in changes.iter().filter_map(ColumnChange::as_modified) {
        if !modified.flags.active || modified.current.active != value {
            continue;
        }

        let index = modified.current.index;
        let d_index = modified.previous.d_index;
        match ranges.last_mut() {
            Some(last) if index == last.end + 1 => {
                last.end = index;
                last.d_end = d_index;
            }
            Some(last) if index <= last.end => {}
            _ => ranges.push(ActiveRange {
                start: index,
                end: index,
                d_start: d_index,
                d_end: d_index,
                value,
            }),
        }
    }

    ranges
}
