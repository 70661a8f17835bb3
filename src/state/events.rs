//! Data set events

use crate::data::column::TransformId;
use crate::data::schema_diff::{
    ActiveRange, ColumnChange, ColumnPlacement, RowSpan, TransformChange,
};
use crate::ui::viewport_cache::CellIndex;

/// Notifications emitted after the model changed
#[derive(Debug, Clone, PartialEq)]
pub enum DataSetEvent {
    /// A data set was opened and the store populated
    DataSetLoaded,

    /// Columns removed, with the placements they had before removal
    ColumnsDeleted { columns: Vec<ColumnPlacement> },

    /// Columns that became hidden, with their previous display index
    ColumnsHidden { columns: Vec<ColumnPlacement> },

    /// Columns that became visible, with their new display index
    ColumnsVisible { columns: Vec<ColumnPlacement> },

    /// Columns created, with their new placements
    ColumnsInserted { columns: Vec<ColumnPlacement> },

    /// A run of adjacent filters switched on or off
    ColumnsActiveChanged(ActiveRange),

    /// Every per-column change record of one response
    ColumnsChanged { changes: Vec<ColumnChange> },

    TransformRemoved { id: TransformId },

    TransformAdded { id: TransformId },

    TransformsChanged { changes: Vec<TransformChange> },

    RowsDeleted(RowSpan),

    RowsInserted(RowSpan),

    /// Cache cells that received new values
    CellsChanged { cells: Vec<CellIndex> },

    /// Cache rows whose labels were updated
    RowLabelsChanged { rows: Vec<usize> },

    /// The viewport moved or changed size
    ViewportChanged,

    /// The viewport was discarded and reallocated
    ViewportReset,

    /// The whole view needs redrawing
    RefreshView,
}

impl DataSetEvent {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            DataSetEvent::DataSetLoaded => "dataSetLoaded",
            DataSetEvent::ColumnsDeleted { .. } => "columnsDeleted",
            DataSetEvent::ColumnsHidden { .. } => "columnsHidden",
            DataSetEvent::ColumnsVisible { .. } => "columnsVisible",
            DataSetEvent::ColumnsInserted { .. } => "columnsInserted",
            DataSetEvent::ColumnsActiveChanged(_) => "columnsActiveChanged",
            DataSetEvent::ColumnsChanged { .. } => "columnsChanged",
            DataSetEvent::TransformRemoved { .. } => "transformRemoved",
            DataSetEvent::TransformAdded { .. } => "transformAdded",
            DataSetEvent::TransformsChanged { .. } => "transformsChanged",
            DataSetEvent::RowsDeleted(_) => "rowsDeleted",
            DataSetEvent::RowsInserted(_) => "rowsInserted",
            DataSetEvent::CellsChanged { .. } => "cellsChanged",
            DataSetEvent::RowLabelsChanged { .. } => "rhChanged",
            DataSetEvent::ViewportChanged => "viewportChanged",
            DataSetEvent::ViewportReset => "viewportReset",
            DataSetEvent::RefreshView => "refreshView",
        }
    }
}
