#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dataset_view::data::cells::{CellArea, CellBlock, CellValue, FetchResult, RowBlock, Value};
use dataset_view::data::column::ColumnType;
use dataset_view::data::data_source::DataSource;
use dataset_view::data::schema::{
    ColumnAction, ColumnSchema, DataSetInfo, DataSetRequest, DataSetResponse, DataSetSchema,
};
use dataset_view::state::{DataSetEvent, DataSetSubscriber};

/// Value served for every cell: column * 1000 + row
pub fn cell_value(column: usize, row: usize) -> Value {
    Value::Integer((column * 1000 + row) as i32)
}

pub fn filled(area: CellArea) -> FetchResult {
    FetchResult {
        data: vec![CellBlock::from_fn(area, |c, r| CellValue::new(cell_value(c, r)))],
        filter_data: vec![RowBlock {
            row_start: area.top,
            row_count: area.row_count(),
            values: vec![false; area.row_count()],
        }],
        row_nums: vec![RowBlock {
            row_start: area.top,
            row_count: area.row_count(),
            values: (area.top..=area.bottom).map(|r| r as u64).collect(),
        }],
    }
}

/// Data source answering cell reads from `cell_value` and every other
/// request from a queue of scripted responses
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<DataSetResponse>>,
    pub requests: Mutex<Vec<DataSetRequest>>,
    pub cell_requests: Mutex<Vec<CellArea>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_response(&self, response: DataSetResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn last_request(&self) -> Option<DataSetRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_cell_request(&self) -> Option<CellArea> {
        self.cell_requests.lock().unwrap().last().copied()
    }

    pub fn clear_cell_requests(&self) {
        self.cell_requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn request_cells(&self, area: CellArea) -> Result<FetchResult> {
        self.cell_requests.lock().unwrap().push(area);
        Ok(filled(area))
    }

    async fn send(&self, request: DataSetRequest) -> Result<DataSetResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted response left"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Records the kind of every event it receives
pub struct EventLog {
    pub seen: Arc<Mutex<Vec<&'static str>>>,
    pub events: Arc<Mutex<Vec<DataSetEvent>>>,
}

impl EventLog {
    pub fn new() -> (Self, Arc<Mutex<Vec<&'static str>>>, Arc<Mutex<Vec<DataSetEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                seen: seen.clone(),
                events: events.clone(),
            },
            seen,
            events,
        )
    }
}

impl DataSetSubscriber for EventLog {
    fn on_data_set_event(&mut self, event: &DataSetEvent) {
        self.seen.lock().unwrap().push(event.kind());
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &str {
        "EventLog"
    }
}

pub fn column(id: u32, name: &str, column_type: ColumnType, hidden: bool) -> ColumnSchema {
    let mut entry = ColumnSchema::new(ColumnAction::Insert, id);
    entry.name = Some(name.to_string());
    entry.column_type = Some(column_type);
    entry.hidden = Some(hidden);
    entry
}

/// Schema delta carrying the row counts every response reports
pub fn schema(rows: usize, columns: Vec<ColumnSchema>) -> DataSetSchema {
    DataSetSchema {
        columns,
        row_count: rows,
        v_row_count: rows,
        row_count_ex_filtered: rows,
        ..Default::default()
    }
}

pub fn info(rows: usize, columns: Vec<ColumnSchema>) -> DataSetInfo {
    let total = columns.len();
    let visible = columns.iter().filter(|c| c.hidden != Some(true)).count();
    let mut schema = schema(rows, columns);
    schema.column_count = total;
    schema.t_column_count = total;
    schema.v_column_count = visible;
    DataSetInfo {
        has_data_set: true,
        schema,
        ..Default::default()
    }
}

pub fn schema_response(rows: usize, columns: Vec<ColumnSchema>) -> DataSetResponse {
    DataSetResponse {
        schema: Some(schema(rows, columns)),
        ..Default::default()
    }
}
