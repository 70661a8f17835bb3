//! The data set controller
//!
//! `DataSet` owns the column store, the selection, the viewport cache and the
//! event dispatcher, and talks to the data source on their behalf. Every
//! mutating operation sends one request, then feeds the response through
//! [`DataSet::apply_response`]: the diff engine updates the store, the
//! viewport is realigned, the selection is re-derived and the grouped events
//! go out in one batch.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::cells::{CellArea, FetchResult, Value, WriteBlock};
use crate::data::column::{ColumnId, ColumnType, DataType, MeasureType, Transform, TransformId};
use crate::data::column_store::ColumnStore;
use crate::data::data_source::DataSource;
use crate::data::error::DataSetError;
use crate::data::schema::{
    ColumnAction, ColumnSchema, DataSetInfo, DataSetRequest, DataSetResponse, RowData,
    RowDataAction, TransformAction, TransformSchema,
};
use crate::data::schema_diff::{ColumnChange, ColumnPlacement, ProcessedResponse, RowSpan, SchemaDiffEngine};
use crate::state::{DataSetEvent, DataSetSubscriber, EventDispatcher};
use crate::ui::selection::{Selection, SelectionObserver};
use crate::ui::viewport_cache::{CellIndex, Viewport, ViewportCache};

pub struct DataSet {
    store: ColumnStore,
    selection: Selection,
    viewport: ViewportCache,
    dispatcher: EventDispatcher,
    engine: SchemaDiffEngine,
    source: Arc<dyn DataSource>,
    config: Config,
    loaded: bool,
}

impl DataSet {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self::with_config(source, Config::default())
    }

    pub fn with_config(source: Arc<dyn DataSource>, config: Config) -> Self {
        info!(target: "dataset", "Creating data set over {}", source.name());
        Self {
            store: ColumnStore::new(),
            selection: Selection::new().with_hidden_included(config.selection.hidden_included),
            viewport: ViewportCache::new(),
            dispatcher: EventDispatcher::with_max_history(config.events.max_history),
            engine: SchemaDiffEngine::new(),
            source,
            config,
            loaded: false,
        }
    }

    pub fn store(&self) -> &ColumnStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Direct selection edits; the store is passed back in for legitimising
    pub fn selection_mut(&mut self) -> (&mut Selection, &ColumnStore) {
        (&mut self.selection, &self.store)
    }

    pub fn viewport(&self) -> &ViewportCache {
        &self.viewport
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn DataSetSubscriber>) {
        self.dispatcher.subscribe(subscriber);
    }

    /// Columns shown in the variable editor; the selection follows them
    pub fn set_editing_columns(&mut self, ids: Option<Vec<ColumnId>>) {
        self.store.editing_var = ids;
        self.selection.refresh_selection(&self.store);
    }

    pub fn register_selection_observer(&mut self, observer: Box<dyn SelectionObserver>) {
        self.selection.register_observer(observer);
    }

    /// Populate the store from a freshly opened data set
    pub fn setup(&mut self, info: &DataSetInfo) -> Result<()> {
        if !info.has_data_set {
            self.loaded = false;
            return Err(DataSetError::NotLoaded.into());
        }

        self.store.setup(info);
        self.loaded = true;
        self.selection.set_selection(&self.store, 0, 0, true);
        self.dispatcher.dispatch(DataSetEvent::DataSetLoaded);

        info!(
            target: "dataset",
            "Data set loaded: {} columns, {} rows",
            self.store.column_count,
            self.store.row_count
        );
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(DataSetError::NotLoaded.into())
        }
    }

    // Viewport

    /// Replace the window and read it in full
    pub async fn set_viewport(&mut self, viewport: Viewport) -> Result<Vec<CellIndex>> {
        let area = self.viewport.set_viewport(viewport);
        self.dispatcher.dispatch(DataSetEvent::ViewportChanged);
        self.dispatcher.dispatch(DataSetEvent::ViewportReset);

        match area {
            Some(area) => self.read_cells(area).await,
            None => Ok(Vec::new()),
        }
    }

    /// Show `area` with the configured overscan around it, clamped to the
    /// data set
    pub async fn set_visible_area(&mut self, area: CellArea) -> Result<Vec<CellIndex>> {
        let rows = self.config.viewport.overscan_rows;
        let columns = self.config.viewport.overscan_columns;
        let last_row = self.store.v_row_count as i64 - 1;
        let last_column = self.store.v_column_count as i64 - 1;

        let viewport = Viewport::new(
            area.left.saturating_sub(columns) as i64,
            area.top.saturating_sub(rows) as i64,
            ((area.right + columns) as i64).min(last_column),
            ((area.bottom + rows) as i64).min(last_row),
        );
        self.set_viewport(viewport).await
    }

    /// Move the window edges and read only what became visible
    pub async fn reshape(&mut self, left: i64, top: i64, right: i64, bottom: i64) -> Result<Vec<CellIndex>> {
        let requests = self.viewport.reshape(left, top, right, bottom);
        self.dispatcher.dispatch(DataSetEvent::ViewportChanged);

        let mut touched = Vec::new();
        for area in requests {
            touched.extend(self.read_cells(area).await?);
        }
        Ok(touched)
    }

    /// Read the whole window again
    pub async fn refresh_viewport(&mut self) -> Result<Vec<CellIndex>> {
        match self.viewport.viewport().area() {
            Some(area) => self.read_cells(area).await,
            None => Ok(Vec::new()),
        }
    }

    async fn read_cells(&mut self, area: CellArea) -> Result<Vec<CellIndex>> {
        debug!(target: "dataset", "Requesting cells {:?}", area);
        let result = self.source.request_cells(area).await?;
        Ok(self.set_cells(&result))
    }

    /// Patch a fetch result into the window; blocks for a window that has
    /// since moved away are dropped
    pub fn set_cells(&mut self, result: &FetchResult) -> Vec<CellIndex> {
        let (cells, rows) = self.viewport.set_cells(result);
        if !rows.is_empty() {
            self.dispatcher.dispatch(DataSetEvent::RowLabelsChanged { rows });
        }
        self.dispatcher.dispatch(DataSetEvent::CellsChanged {
            cells: cells.clone(),
        });
        cells
    }

    // Requests

    async fn send(&mut self, request: DataSetRequest) -> Result<ProcessedResponse> {
        self.ensure_loaded()?;
        debug!(target: "dataset", "Sending {:?}", request);
        let response = self.source.send(request).await?;
        self.apply_response(&response).await
    }

    /// Apply a response to every component, then read back whatever part of
    /// the window it invalidated
    pub async fn apply_response(&mut self, response: &DataSetResponse) -> Result<ProcessedResponse> {
        let processed = self.engine.process(&mut self.store, response);
        let mut areas = self.viewport.apply_column_changes(&processed.column_changes, &self.store);
        self.selection.refresh_selection(&self.store);

        {
            let mut batch = self.dispatcher.begin_edit();
            batch.dispatch_all(processed.events.iter().cloned());

            if let Some(write) = &processed.data_write {
                let (cells, rows) = self.viewport.set_cells(write);
                if !rows.is_empty() {
                    batch.dispatch(DataSetEvent::RowLabelsChanged { rows });
                }
                batch.dispatch(DataSetEvent::CellsChanged { cells });
            }

            if processed.refresh {
                batch.dispatch(DataSetEvent::RefreshView);
            }
        }

        if processed.refresh {
            areas = self.viewport.viewport().area().into_iter().collect();
        } else {
            areas.extend(self.changed_column_areas(&processed.column_changes));
        }

        for area in areas {
            self.read_cells(area).await?;
        }

        Ok(processed)
    }

    /// Window strips of visible columns whose data or missing values changed
    fn changed_column_areas(&self, changes: &[ColumnChange]) -> Vec<CellArea> {
        let view = self.viewport.viewport();
        changes
            .iter()
            .filter(|change| {
                change.data_changed() || change.as_modified().is_some_and(|m| m.flags.missing_values)
            })
            .filter_map(|change| self.store.get_column_by_id(change.id()))
            .filter_map(|column| column.d_index)
            .filter_map(|d_index| {
                let d_index = d_index as i64;
                if d_index < view.left || d_index > view.right {
                    return None;
                }
                Viewport::new(d_index, view.top, d_index, view.bottom).area()
            })
            .collect()
    }

    pub async fn insert_rows(&mut self, ranges: &[RowSpan]) -> Result<ProcessedResponse> {
        info!(target: "dataset", "Inserting {} row ranges", ranges.len());
        let rows = Self::row_data(RowDataAction::Insert, ranges);
        self.send(DataSetRequest::InsertRows(rows)).await
    }

    pub async fn delete_rows(&mut self, ranges: &[RowSpan]) -> Result<ProcessedResponse> {
        info!(target: "dataset", "Deleting {} row ranges", ranges.len());
        let rows = Self::row_data(RowDataAction::Remove, ranges);
        self.send(DataSetRequest::DeleteRows(rows)).await
    }

    fn row_data(action: RowDataAction, ranges: &[RowSpan]) -> Vec<RowData> {
        ranges
            .iter()
            .map(|r| RowData::new(action, r.row_start, r.count))
            .collect()
    }

    /// Insert columns described by `columns`. Each entry needs an index and a
    /// column type; `display_index` says the index counts visible columns
    /// only. Returns where the new columns landed.
    pub async fn insert_columns(
        &mut self,
        columns: Vec<ColumnSchema>,
        display_index: bool,
    ) -> Result<Vec<ColumnPlacement>> {
        self.ensure_loaded()?;

        let mut entries = Vec::with_capacity(columns.len());
        for column in columns {
            entries.push(self.prepare_insert(column, display_index)?);
        }

        info!(target: "dataset", "Inserting {} columns", entries.len());
        let processed = self.send(DataSetRequest::InsertColumns(entries)).await?;

        if self.store.editing_var.is_some() {
            self.store.editing_var = Some(processed.inserted.iter().map(|p| p.id).collect());
            self.selection.refresh_selection(&self.store);
        }
        Ok(processed.inserted)
    }

    fn prepare_insert(&self, mut entry: ColumnSchema, display_index: bool) -> Result<ColumnSchema> {
        let index = entry
            .index
            .ok_or_else(|| DataSetError::invalid("Insert index is not defined"))?;
        let column_type = entry
            .column_type
            .ok_or_else(|| DataSetError::invalid("Column type not specified"))?;

        if display_index {
            entry.index = Some(self.store.index_from_display_index(index)?);
        }

        entry.action = ColumnAction::Insert;
        entry.auto_measure.get_or_insert(true);
        entry.filter_no.get_or_insert(-1);
        entry.active.get_or_insert(true);
        entry.transform.get_or_insert(0);
        entry.parent_id.get_or_insert(0);
        entry.trim_levels.get_or_insert(true);
        entry.missing_values.get_or_insert_with(Vec::new);

        let measure_type = *entry.measure_type.get_or_insert(match column_type {
            ColumnType::Computed => MeasureType::Continuous,
            _ => MeasureType::Nominal,
        });
        entry.data_type.get_or_insert(match measure_type {
            MeasureType::Id => DataType::Text,
            _ => DataType::Integer,
        });

        Ok(entry)
    }

    /// Delete columns, then move the variable editor on to a sensible
    /// neighbour if it was showing only deleted columns
    pub async fn delete_columns(&mut self, ids: &[ColumnId]) -> Result<ProcessedResponse> {
        info!(target: "dataset", "Deleting {} columns", ids.len());
        let processed = self.send(DataSetRequest::DeleteColumns(ids.to_vec())).await?;
        self.store.edited = true;

        if let Some(editing) = self.store.editing_var.clone() {
            self.store.editing_var = self.editing_after_delete(editing, &processed.column_changes);
            self.selection.refresh_selection(&self.store);
        }
        Ok(processed)
    }

    fn editing_after_delete(&self, mut editing: Vec<ColumnId>, changes: &[ColumnChange]) -> Option<Vec<ColumnId>> {
        let mut first: Option<(Option<usize>, ColumnType)> = None;
        for change in changes {
            if let ColumnChange::Deleted { previous } = change {
                first.get_or_insert((previous.d_index, previous.column_type));
                editing.retain(|&id| id != previous.id);
            }
        }

        if !editing.is_empty() {
            return Some(editing);
        }

        let (Some(first_d_index), first_type) = first? else {
            return None;
        };
        let last = self.store.visible_real_column_count().checked_sub(1)?;
        let column = self.store.get_column_by_display(first_d_index.min(last))?;

        // stay within the same kind of column where the deleted run started
        let previous = column
            .d_index
            .and_then(|d| d.checked_sub(1))
            .and_then(|d| self.store.get_column_by_display(d));
        match previous {
            Some(before) if column.column_type != first_type && before.column_type == first_type => {
                Some(vec![before.id])
            }
            _ => Some(vec![column.id]),
        }
    }

    /// Change column properties. Entries only need the fields being changed;
    /// everything else is filled in from the stored column.
    pub async fn change_columns(&mut self, changes: Vec<ColumnSchema>) -> Result<ProcessedResponse> {
        self.ensure_loaded()?;

        let mut entries = Vec::with_capacity(changes.len());
        for change in changes {
            let column = self
                .store
                .get_column_by_id(change.column_id())
                .ok_or_else(|| DataSetError::invalid(format!("Unknown column {}", change.id)))?;

            let mut merged = column.clone();
            change.apply_to(&mut merged);

            let mut entry = ColumnSchema::from_column(ColumnAction::Modify, &merged);
            let send_levels = change.levels.is_some() && merged.measure_type != MeasureType::Continuous;
            if !send_levels {
                entry.levels = None;
                entry.has_levels = None;
            }
            entries.push(entry);
        }

        info!(target: "dataset", "Changing {} columns", entries.len());
        self.send(DataSetRequest::ChangeColumns(entries)).await
    }

    pub async fn change_column(&mut self, change: ColumnSchema) -> Result<ProcessedResponse> {
        self.change_columns(vec![change]).await
    }

    /// Create or update transforms. Unknown ids are created (and get their id
    /// from the data source); known ones are updated with the unspecified
    /// fields kept.
    pub async fn set_transforms(&mut self, transforms: Vec<TransformSchema>) -> Result<ProcessedResponse> {
        let entries = transforms
            .into_iter()
            .map(|values| match self.store.get_transform_by_id(values.transform_id()) {
                Some(existing) => {
                    let mut merged = existing.clone();
                    values.apply_to(&mut merged);
                    Self::transform_entry(TransformAction::Update, merged.id, &merged)
                }
                None => {
                    let mut created = Transform::new(TransformId(0), "");
                    values.apply_to(&mut created);
                    Self::transform_entry(TransformAction::Create, TransformId(0), &created)
                }
            })
            .collect();

        self.send(DataSetRequest::SetTransforms(entries)).await
    }

    fn transform_entry(action: TransformAction, id: TransformId, transform: &Transform) -> TransformSchema {
        TransformSchema {
            action,
            id: id.0,
            name: Some(transform.name.clone()),
            description: Some(transform.description.clone()),
            suffix: Some(transform.suffix.clone()),
            formula: Some(transform.formula.clone()),
            formula_message: None,
            colour_index: Some(transform.colour_index),
            measure_type: Some(transform.measure_type),
        }
    }

    pub async fn remove_transforms(&mut self, ids: &[TransformId]) -> Result<ProcessedResponse> {
        self.send(DataSetRequest::RemoveTransforms(ids.to_vec())).await
    }

    /// Write cell blocks. Returns the cells the data source reports as
    /// written.
    pub async fn change_cells(&mut self, blocks: Vec<WriteBlock>) -> Result<Option<FetchResult>> {
        if blocks.is_empty() {
            debug!(target: "dataset", "No cells to change");
            return Ok(None);
        }
        let processed = self.send(DataSetRequest::ChangeCells(blocks)).await?;
        self.store.edited = true;
        Ok(processed.data_write)
    }

    /// Write `value` into every selected cell
    pub async fn apply_values_to_selection(&mut self, value: Value) -> Result<Option<FetchResult>> {
        let ranges = self.selection.all_ranges();
        let blocks = self
            .selection
            .build_write_blocks(&self.store, &ranges, Some(&value));
        self.change_cells(blocks).await
    }

    /// Clear every selected cell that holds real data
    pub async fn delete_cell_contents(&mut self) -> Result<Option<FetchResult>> {
        let ranges = self.selection.all_ranges();
        let blocks = self.selection.build_write_blocks(&self.store, &ranges, None);
        self.change_cells(blocks).await
    }

    pub async fn undo(&mut self) -> Result<ProcessedResponse> {
        info!(target: "dataset", "Undo");
        let processed = self.send(DataSetRequest::Undo).await?;
        self.select_history_change(&processed);
        Ok(processed)
    }

    pub async fn redo(&mut self) -> Result<ProcessedResponse> {
        info!(target: "dataset", "Redo");
        let processed = self.send(DataSetRequest::Redo).await?;
        self.select_history_change(&processed);
        Ok(processed)
    }

    fn select_history_change(&mut self, processed: &ProcessedResponse) {
        if !self.selection.undo_redo_data_to_selection(&self.store, processed) {
            warn!(target: "dataset", "Nothing to select after undo/redo");
        }
    }

    pub async fn toggle_filter_visibility(&mut self) -> Result<ProcessedResponse> {
        let visible = !self.store.filters_visible;
        info!(target: "dataset", "Setting filters visible: {}", visible);
        self.send(DataSetRequest::SetFiltersVisible(visible)).await
    }
}
