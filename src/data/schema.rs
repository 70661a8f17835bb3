//! Shapes of the requests sent to, and responses received from, the data source
//!
//! Optional fields on a column or transform entry mean "unchanged": the stored
//! value is kept. Wire sentinels (`0` for no transform/parent, `-1` for no
//! filter group) are translated when an entry is read into a [`Column`].

use serde::{Deserialize, Serialize};

use crate::data::cells::{CellBlock, WriteBlock};
use crate::data::column::{
    Column, ColumnId, ColumnType, DataType, EditedCellRange, MeasureType, Transform, TransformId,
    VariableLevel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAction {
    #[default]
    Modify,
    Remove,
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformAction {
    #[default]
    Create,
    Update,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowDataAction {
    #[default]
    Modify,
    Remove,
    Insert,
}

/// One column entry of a schema delta
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSchema {
    pub action: ColumnAction,
    pub id: u32,
    pub index: Option<usize>,
    pub name: Option<String>,
    pub column_type: Option<ColumnType>,
    pub data_type: Option<DataType>,
    pub measure_type: Option<MeasureType>,
    pub auto_measure: Option<bool>,
    pub width: Option<u32>,
    pub has_levels: Option<bool>,
    pub levels: Option<Vec<VariableLevel>>,
    pub dps: Option<u32>,
    pub import_name: Option<String>,
    pub formula: Option<String>,
    pub formula_message: Option<String>,
    pub description: Option<String>,
    pub hidden: Option<bool>,
    pub active: Option<bool>,
    pub filter_no: Option<i32>,
    pub trim_levels: Option<bool>,
    pub transform: Option<u32>,
    pub parent_id: Option<u32>,
    pub missing_values: Option<Vec<String>>,
    pub edited_cell_ranges: Option<Vec<EditedCellRange>>,
    pub output_analysis_id: Option<u32>,
    /// The column's cell data changed along with this entry
    pub data_changed: bool,
}

impl ColumnSchema {
    pub fn new(action: ColumnAction, id: u32) -> Self {
        Self {
            action,
            id,
            ..Default::default()
        }
    }

    pub fn column_id(&self) -> ColumnId {
        ColumnId(self.id)
    }

    /// Full entry describing `column` as it currently is
    pub fn from_column(action: ColumnAction, column: &Column) -> Self {
        Self {
            action,
            id: column.id.0,
            index: Some(column.index),
            name: Some(column.name.clone()),
            column_type: Some(column.column_type),
            data_type: Some(column.data_type),
            measure_type: Some(column.measure_type),
            auto_measure: Some(column.auto_measure),
            width: Some(column.width),
            has_levels: Some(column.levels.is_some()),
            levels: column.levels.clone(),
            dps: Some(column.dps),
            import_name: Some(column.import_name.clone()),
            formula: Some(column.formula.clone()),
            formula_message: Some(column.formula_message.clone()),
            description: Some(column.description.clone()),
            hidden: Some(column.hidden),
            active: Some(column.active),
            filter_no: Some(column.filter_no.map(|n| n as i32).unwrap_or(-1)),
            trim_levels: Some(column.trim_levels),
            transform: Some(column.transform.map(|t| t.0).unwrap_or(0)),
            parent_id: Some(column.parent_id.map(|p| p.0).unwrap_or(0)),
            missing_values: Some(column.missing_values.clone()),
            edited_cell_ranges: Some(column.edited_cell_ranges.clone()),
            output_analysis_id: column.output_analysis_id,
            data_changed: false,
        }
    }

    /// Read this entry into `column`, keeping the stored value of every field
    /// the entry leaves out
    pub fn apply_to(&self, column: &mut Column) {
        if let Some(name) = &self.name {
            column.name = name.clone();
        }
        if let Some(column_type) = self.column_type {
            column.column_type = column_type;
        }
        if let Some(data_type) = self.data_type {
            column.data_type = data_type;
        }
        if let Some(measure_type) = self.measure_type {
            column.measure_type = measure_type;
        }
        if let Some(auto_measure) = self.auto_measure {
            column.auto_measure = auto_measure;
        }
        if let Some(width) = self.width {
            column.width = width;
        }
        if let Some(dps) = self.dps {
            column.dps = dps;
        }
        if let Some(import_name) = &self.import_name {
            column.import_name = import_name.clone();
        }
        if let Some(formula) = &self.formula {
            column.formula = formula.clone();
        }
        if let Some(message) = &self.formula_message {
            column.formula_message = message.clone();
        }
        if let Some(description) = &self.description {
            column.description = description.clone();
        }
        if let Some(hidden) = self.hidden {
            column.hidden = hidden;
        }
        if let Some(active) = self.active {
            column.active = active;
        }
        if let Some(filter_no) = self.filter_no {
            column.filter_no = u32::try_from(filter_no).ok();
        }
        if let Some(trim_levels) = self.trim_levels {
            column.trim_levels = trim_levels;
        }
        if let Some(transform) = self.transform {
            column.transform = (transform != 0).then_some(TransformId(transform));
        }
        if let Some(parent_id) = self.parent_id {
            column.parent_id = (parent_id != 0).then_some(ColumnId(parent_id));
        }
        if let Some(missing_values) = &self.missing_values {
            column.missing_values = missing_values.clone();
        }
        if let Some(ranges) = &self.edited_cell_ranges {
            column.edited_cell_ranges = ranges.clone();
        }
        if self.output_analysis_id.is_some() {
            column.output_analysis_id = self.output_analysis_id;
        }

        if self.has_levels == Some(false) {
            column.levels = None;
        } else if let Some(levels) = &self.levels {
            column.levels = Some(self.normalise_levels(levels, column.data_type));
        }
    }

    /// Text levels are numbered by position; numeric levels use their value as
    /// the import value
    fn normalise_levels(&self, levels: &[VariableLevel], data_type: DataType) -> Vec<VariableLevel> {
        levels
            .iter()
            .enumerate()
            .map(|(i, level)| {
                if data_type == DataType::Text {
                    VariableLevel {
                        value: i as i64,
                        ..level.clone()
                    }
                } else {
                    VariableLevel {
                        import_value: level.value.to_string(),
                        ..level.clone()
                    }
                }
            })
            .collect()
    }

    /// Build a new column from this entry
    pub fn to_column(&self, index: usize) -> Column {
        let mut column = Column::new(self.column_id(), "", index);
        self.apply_to(&mut column);
        column
    }
}

/// One transform entry of a schema delta
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSchema {
    pub action: TransformAction,
    pub id: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub suffix: Option<String>,
    pub formula: Option<Vec<String>>,
    pub formula_message: Option<Vec<String>>,
    pub colour_index: Option<u32>,
    pub measure_type: Option<MeasureType>,
}

impl TransformSchema {
    pub fn transform_id(&self) -> TransformId {
        TransformId(self.id)
    }

    pub fn apply_to(&self, transform: &mut Transform) {
        if let Some(name) = &self.name {
            transform.name = name.clone();
        }
        if let Some(description) = &self.description {
            transform.description = description.clone();
        }
        if let Some(suffix) = &self.suffix {
            transform.suffix = suffix.clone();
        }
        if let Some(formula) = &self.formula {
            transform.formula = formula.clone();
        }
        if let Some(message) = &self.formula_message {
            transform.formula_message = message.clone();
        }
        if let Some(colour_index) = self.colour_index {
            transform.colour_index = colour_index;
        }
        if let Some(measure_type) = self.measure_type {
            transform.measure_type = measure_type;
        }
    }

    pub fn to_transform(&self) -> Transform {
        let mut transform = Transform::new(self.transform_id(), "");
        self.apply_to(&mut transform);
        transform
    }
}

/// Half-open run of removed rows reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowRange {
    pub index: usize,
    pub count: usize,
}

/// A schema snapshot or delta
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetSchema {
    pub columns: Vec<ColumnSchema>,
    pub transforms: Vec<TransformSchema>,
    pub row_count: usize,
    pub v_row_count: usize,
    pub column_count: usize,
    pub v_column_count: usize,
    pub t_column_count: usize,
    pub deleted_row_count: usize,
    pub added_row_count: usize,
    pub edited_cell_count: usize,
    pub row_count_ex_filtered: usize,
    pub filters_visible: bool,
    pub removed_row_ranges: Vec<RowRange>,
}

/// Row insert/remove, or per-row filter and label data for a run of rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowData {
    pub action: RowDataAction,
    pub row_start: usize,
    pub row_count: usize,
    pub filter_data: Vec<bool>,
    pub row_nums: Vec<u64>,
}

impl RowData {
    pub fn new(action: RowDataAction, row_start: usize, row_count: usize) -> Self {
        Self {
            action,
            row_start,
            row_count,
            ..Default::default()
        }
    }
}

/// Initial description of an opened data set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetInfo {
    pub has_data_set: bool,
    pub edited: bool,
    pub schema: DataSetSchema,
    pub changes_count: usize,
    pub changes_position: usize,
}

/// Operations the model asks the data source to perform
#[derive(Debug, Clone, PartialEq)]
pub enum DataSetRequest {
    InsertRows(Vec<RowData>),
    DeleteRows(Vec<RowData>),
    InsertColumns(Vec<ColumnSchema>),
    DeleteColumns(Vec<ColumnId>),
    ChangeColumns(Vec<ColumnSchema>),
    SetTransforms(Vec<TransformSchema>),
    RemoveTransforms(Vec<TransformId>),
    ChangeCells(Vec<WriteBlock>),
    SetFiltersVisible(bool),
    Undo,
    Redo,
}

/// What the data source reports back after a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetResponse {
    pub changes_count: usize,
    pub changes_position: usize,
    /// Present when the request touched the schema
    pub schema: Option<DataSetSchema>,
    pub rows: Vec<RowData>,
    /// Cell blocks written (or rewritten) by the request
    pub data: Vec<CellBlock>,
    pub filters_changed: bool,
}

impl DataSetResponse {
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_entry_inherits_fields() {
        let mut column = Column::new(ColumnId(3), "score", 0).with_type(ColumnType::Data);
        column.description = "test score".to_string();

        let mut entry = ColumnSchema::new(ColumnAction::Modify, 3);
        entry.name = Some("score2".to_string());
        entry.apply_to(&mut column);

        assert_eq!(column.name, "score2");
        assert_eq!(column.description, "test score");
        assert_eq!(column.column_type, ColumnType::Data);
    }

    #[test]
    fn test_wire_sentinels_translate() {
        let mut entry = ColumnSchema::new(ColumnAction::Insert, 8);
        entry.transform = Some(0);
        entry.parent_id = Some(5);
        entry.filter_no = Some(-1);
        let column = entry.to_column(2);
        assert_eq!(column.transform, None);
        assert_eq!(column.parent_id, Some(ColumnId(5)));
        assert_eq!(column.filter_no, None);

        let back = ColumnSchema::from_column(ColumnAction::Modify, &column);
        assert_eq!(back.transform, Some(0));
        assert_eq!(back.filter_no, Some(-1));
    }

    #[test]
    fn test_numeric_levels_use_value_as_import_value() {
        let mut entry = ColumnSchema::new(ColumnAction::Insert, 1);
        entry.data_type = Some(DataType::Integer);
        entry.levels = Some(vec![VariableLevel {
            label: "Low".to_string(),
            value: 7,
            import_value: String::new(),
            pinned: false,
        }]);
        let column = entry.to_column(0);
        assert_eq!(column.levels.unwrap()[0].import_value, "7");
    }

    #[test]
    fn test_response_deserializes_with_defaults() {
        let json = r#"{ "schema": { "columns": [ { "action": "remove", "id": 4 } ] } }"#;
        let response: DataSetResponse = serde_json::from_str(json).unwrap();
        let schema = response.schema.unwrap();
        assert_eq!(schema.columns[0].action, ColumnAction::Remove);
        assert_eq!(schema.columns[0].index, None);
        assert!(response.rows.is_empty());
    }
}
