use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a column. Ids are issued by the server and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a recode transform, independent of the column id space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransformId(pub u32);

impl fmt::Display for TransformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Virtual column past the end of the real data
    #[default]
    None,
    Data,
    Computed,
    Recoded,
    Filter,
    Output,
}

impl ColumnType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "New",
            Self::Data => "Data",
            Self::Computed => "Computed",
            Self::Recoded => "Transformed",
            Self::Filter => "Filter",
            Self::Output => "Output",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    None,
    Integer,
    Decimal,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureType {
    #[default]
    None,
    Nominal,
    Ordinal,
    Continuous,
    Id,
}

/// One categorical level of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableLevel {
    pub label: String,
    pub value: i64,
    pub import_value: String,
    #[serde(default)]
    pub pinned: bool,
}

/// Inclusive row interval of manually edited cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditedCellRange {
    pub start: usize,
    pub end: usize,
}

/// One variable of the data set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    /// Position among all columns, hidden ones included
    pub index: usize,
    /// Position among visible columns; `None` while hidden
    pub d_index: Option<usize>,
    pub column_type: ColumnType,
    pub data_type: DataType,
    pub measure_type: MeasureType,
    pub auto_measure: bool,
    pub width: u32,
    pub levels: Option<Vec<VariableLevel>>,
    pub dps: u32,
    pub import_name: String,
    pub formula: String,
    pub formula_message: String,
    pub description: String,
    pub hidden: bool,
    /// Only meaningful for filters
    pub active: bool,
    pub filter_no: Option<u32>,
    pub trim_levels: bool,
    pub transform: Option<TransformId>,
    pub parent_id: Option<ColumnId>,
    pub missing_values: Vec<String>,
    pub edited_cell_ranges: Vec<EditedCellRange>,
    pub output_analysis_id: Option<u32>,
}

impl Column {
    pub fn new(id: ColumnId, name: impl Into<String>, index: usize) -> Self {
        Self {
            id,
            name: name.into(),
            index,
            d_index: None,
            column_type: ColumnType::None,
            data_type: DataType::Integer,
            measure_type: MeasureType::Nominal,
            auto_measure: true,
            width: 100,
            levels: None,
            dps: 0,
            import_name: String::new(),
            formula: String::new(),
            formula_message: String::new(),
            description: String::new(),
            hidden: false,
            active: true,
            filter_no: None,
            trim_levels: true,
            transform: None,
            parent_id: None,
            missing_values: Vec::new(),
            edited_cell_ranges: Vec::new(),
            output_analysis_id: None,
        }
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn is_filter(&self) -> bool {
        self.column_type == ColumnType::Filter
    }

    pub fn is_virtual(&self) -> bool {
        self.column_type == ColumnType::None
    }
}

/// A named recode definition referenced by RECODED columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub id: TransformId,
    pub name: String,
    pub description: String,
    pub suffix: String,
    pub formula: Vec<String>,
    pub formula_message: Vec<String>,
    pub colour_index: u32,
    pub measure_type: MeasureType,
}

impl Transform {
    pub fn new(id: TransformId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            suffix: String::new(),
            formula: vec![String::new()],
            formula_message: Vec::new(),
            colour_index: 0,
            measure_type: MeasureType::None,
        }
    }
}
