use anyhow::Result;
use async_trait::async_trait;

use crate::data::cells::{CellArea, FetchResult};
use crate::data::schema::{DataSetRequest, DataSetResponse};

/// Transport to the process that owns the data
///
/// Implementations decide how requests travel; the model only relies on each
/// call eventually resolving. Responses may arrive after the state they were
/// requested for has moved on, and callers re-validate them on arrival.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Read the cells, filter flags and row labels of `area`
    async fn request_cells(&self, area: CellArea) -> Result<FetchResult>;

    /// Perform a schema, row, cell or history operation
    async fn send(&self, request: DataSetRequest) -> Result<DataSetResponse>;

    /// Name used in log output
    fn name(&self) -> &str {
        "data-source"
    }
}
