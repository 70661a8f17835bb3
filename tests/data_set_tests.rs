mod common;

use common::{cell_value, column, info, schema_response, EventLog, ScriptedSource};
use dataset_view::data::cells::{CellArea, CellBlock, CellValue, Value};
use dataset_view::data::column::{ColumnId, ColumnType, TransformId};
use dataset_view::data::schema::{
    ColumnAction, ColumnSchema, DataSetRequest, DataSetResponse, RowData, RowDataAction,
    TransformAction, TransformSchema,
};
use dataset_view::data::schema_diff::RowSpan;
use dataset_view::state::DataSetEvent;
use dataset_view::ui::viewport_cache::Viewport;
use dataset_view::{DataSet, DataSetError};

fn abc() -> Vec<ColumnSchema> {
    vec![
        column(1, "A", ColumnType::Data, false),
        column(2, "B", ColumnType::Data, false),
        column(3, "C", ColumnType::Data, false),
    ]
}

fn names(data_set: &DataSet) -> Vec<String> {
    data_set.store().columns().iter().map(|c| c.name.clone()).collect()
}

fn position(seen: &[&'static str], kind: &str) -> usize {
    seen.iter()
        .position(|k| *k == kind)
        .unwrap_or_else(|| panic!("no {} event in {:?}", kind, seen))
}

#[tokio::test]
async fn test_delete_then_undo_restores_column() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(10, abc())).unwrap();
    let (log, seen, _) = EventLog::new();
    data_set.subscribe(Box::new(log));
    data_set.set_viewport(Viewport::new(0, 0, 2, 9)).await.unwrap();

    source.push_response(schema_response(10, vec![ColumnSchema::new(ColumnAction::Remove, 2)]));
    data_set.delete_columns(&[ColumnId(2)]).await.unwrap();

    assert_eq!(names(&data_set), vec!["A", "C"]);
    let c = data_set.store().get_column_by_id(ColumnId(3)).unwrap();
    assert_eq!((c.index, c.d_index), (1, Some(1)));
    assert!(data_set.store().indices_consistent());
    assert!(data_set.store().edited);
    assert_eq!(data_set.viewport().viewport(), Viewport::new(0, 0, 1, 9));
    assert_eq!(data_set.viewport().value_at(0, 1).map(|c| &c.value), Some(&cell_value(2, 0)));

    let mut restored = column(2, "B", ColumnType::Data, false);
    restored.index = Some(1);
    source.push_response(schema_response(10, vec![restored]));
    let processed = data_set.undo().await.unwrap();

    assert_eq!(source.last_request(), Some(DataSetRequest::Undo));
    assert_eq!(names(&data_set), vec!["A", "B", "C"]);
    assert!(data_set.store().indices_consistent());
    assert_eq!(data_set.store().column_count, 3);
    assert_eq!(processed.inserted[0].id, ColumnId(2));
    assert_eq!(processed.inserted[0].d_index, Some(1));

    // the restored column was fetched, its neighbours kept their cells
    assert_eq!(data_set.viewport().viewport(), Viewport::new(0, 0, 2, 9));
    assert_eq!(data_set.viewport().value_at(0, 1).map(|c| &c.value), Some(&cell_value(1, 0)));
    assert_eq!(data_set.viewport().value_at(0, 2).map(|c| &c.value), Some(&cell_value(2, 0)));

    let current = data_set.selection().current();
    assert_eq!((current.left(), current.right()), (1, 1));
    assert_eq!((current.top, current.bottom), (0, 9));

    let seen = seen.lock().unwrap();
    assert!(position(&seen, "columnsDeleted") < position(&seen, "columnsInserted"));
}

#[tokio::test]
async fn test_hide_then_show_filter_column() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    let columns = vec![
        column(9, "F", ColumnType::Filter, false),
        column(1, "A", ColumnType::Data, false),
        column(2, "B", ColumnType::Data, false),
    ];
    data_set.setup(&info(5, columns)).unwrap();
    let (log, seen, events) = EventLog::new();
    data_set.subscribe(Box::new(log));
    data_set.set_viewport(Viewport::new(0, 0, 2, 4)).await.unwrap();

    let hide = ColumnSchema {
        id: 9,
        hidden: Some(true),
        ..Default::default()
    };
    source.push_response(schema_response(5, vec![hide.clone()]));
    data_set.change_columns(vec![hide]).await.unwrap();

    match source.last_request() {
        Some(DataSetRequest::ChangeColumns(entries)) => {
            assert_eq!(entries[0].action, ColumnAction::Modify);
            assert_eq!(entries[0].hidden, Some(true));
            assert_eq!(entries[0].name.as_deref(), Some("F"));
            assert_eq!(entries[0].column_type, Some(ColumnType::Filter));
            assert_eq!(entries[0].levels, None);
        }
        other => panic!("unexpected request {:?}", other),
    }

    let store = data_set.store();
    assert_eq!(store.get_column_by_id(ColumnId(9)).unwrap().d_index, None);
    assert_eq!(store.get_column_by_id(ColumnId(1)).unwrap().d_index, Some(0));
    assert_eq!(store.get_column_by_id(ColumnId(2)).unwrap().d_index, Some(1));
    assert_eq!(store.v_column_count, 2);
    assert!(store.indices_consistent());
    assert_eq!(data_set.viewport().viewport(), Viewport::new(0, 0, 1, 4));
    assert_eq!(source.last_cell_request(), Some(CellArea::new(0, 0, 1, 4)));

    let show = ColumnSchema {
        id: 9,
        hidden: Some(false),
        ..Default::default()
    };
    source.push_response(schema_response(5, vec![show.clone()]));
    data_set.change_columns(vec![show]).await.unwrap();

    let store = data_set.store();
    assert_eq!(store.get_column_by_id(ColumnId(9)).unwrap().d_index, Some(0));
    assert_eq!(store.get_column_by_id(ColumnId(2)).unwrap().d_index, Some(2));
    assert_eq!(store.v_column_count, 3);
    assert!(store.indices_consistent());
    assert_eq!(data_set.viewport().viewport(), Viewport::new(0, 0, 2, 4));

    let seen = seen.lock().unwrap();
    let hidden_at = position(&seen, "columnsHidden");
    let visible_at = position(&seen, "columnsVisible");
    assert!(hidden_at < position(&seen, "refreshView"));
    assert!(hidden_at < visible_at);

    let events = events.lock().unwrap();
    let placements: Vec<Option<usize>> = events
        .iter()
        .filter_map(|e| match e {
            DataSetEvent::ColumnsHidden { columns } | DataSetEvent::ColumnsVisible { columns } => {
                Some(columns[0].d_index)
            }
            _ => None,
        })
        .collect();
    assert_eq!(placements, vec![Some(0), Some(0)]);
}

#[tokio::test]
async fn test_scrolling_one_row_fetches_one_row() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(100, abc())).unwrap();
    data_set.set_viewport(Viewport::new(0, 0, 2, 9)).await.unwrap();
    source.clear_cell_requests();

    let touched = data_set.reshape(0, 0, 0, 1).await.unwrap();
    let request = source.last_cell_request().unwrap();
    assert_eq!(request, CellArea::new(0, 10, 2, 10));
    assert_eq!(request.row_count(), 1);
    assert_eq!(touched.len(), 3);
    assert_eq!(data_set.viewport().value_at(10, 2).map(|c| &c.value), Some(&cell_value(2, 10)));

    data_set.reshape(0, -1, 0, 0).await.unwrap();
    assert_eq!(source.cell_requests.lock().unwrap().len(), 1);
    assert_eq!(data_set.viewport().viewport(), Viewport::new(0, 1, 2, 10));
}

#[tokio::test]
async fn test_scrolling_up_past_the_first_row_fetches_row_zero() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(10, abc())).unwrap();
    data_set.set_viewport(Viewport::new(0, 1, 2, 5)).await.unwrap();

    data_set.reshape(0, 3, 0, 0).await.unwrap();
    assert_eq!(data_set.viewport().viewport(), Viewport::new(0, 0, 2, 5));
    assert_eq!(source.last_cell_request(), Some(CellArea::new(0, 0, 2, 0)));
    assert_eq!(data_set.viewport().value_at(0, 1).map(|c| &c.value), Some(&cell_value(1, 0)));
}

#[tokio::test]
async fn test_visible_area_adds_overscan_within_bounds() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(30, abc())).unwrap();

    data_set.set_visible_area(CellArea::new(1, 5, 1, 12)).await.unwrap();
    // default overscan is 20 rows and 4 columns
    assert_eq!(data_set.viewport().viewport(), Viewport::new(0, 0, 2, 29));
    assert_eq!(source.last_cell_request(), Some(CellArea::new(0, 0, 2, 29)));
}

#[tokio::test]
async fn test_apply_values_to_selection_writes_blocks() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(5, abc())).unwrap();
    let (log, seen, _) = EventLog::new();
    data_set.subscribe(Box::new(log));
    data_set.set_viewport(Viewport::new(0, 0, 2, 4)).await.unwrap();
    {
        let (selection, store) = data_set.selection_mut();
        selection.set_selection(store, 2, 1, true);
    }

    let written = CellBlock::from_fn(CellArea::new(1, 2, 1, 2), |_, _| CellValue::new(Value::Integer(5)));
    source.push_response(DataSetResponse {
        data: vec![written.clone()],
        ..Default::default()
    });
    let result = data_set
        .apply_values_to_selection(Value::Integer(5))
        .await
        .unwrap()
        .unwrap();

    match source.last_request() {
        Some(DataSetRequest::ChangeCells(blocks)) => {
            assert_eq!(blocks.len(), 1);
            assert_eq!((blocks[0].row_start, blocks[0].column_start), (2, 1));
            assert_eq!(blocks[0].values, vec![vec![Value::Integer(5)]]);
            assert!(!blocks[0].clear);
        }
        other => panic!("unexpected request {:?}", other),
    }
    assert_eq!(result.data, vec![written]);
    assert!(data_set.store().edited);
    // the changed column is read back
    assert_eq!(source.last_cell_request(), Some(CellArea::new(1, 0, 1, 4)));
    assert!(seen.lock().unwrap().contains(&"cellsChanged"));
}

#[tokio::test]
async fn test_delete_cell_contents_sends_clear_blocks() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(5, abc())).unwrap();
    {
        let (selection, store) = data_set.selection_mut();
        selection.select_all(store);
    }

    source.push_response(DataSetResponse::default());
    data_set.delete_cell_contents().await.unwrap();

    match source.last_request() {
        Some(DataSetRequest::ChangeCells(blocks)) => {
            assert!(blocks[0].clear);
            assert_eq!((blocks[0].row_count, blocks[0].column_count), (5, 3));
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_insert_sends_nothing() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(5, abc())).unwrap();

    let entry = ColumnSchema {
        index: Some(0),
        ..Default::default()
    };
    let err = data_set.insert_columns(vec![entry], false).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DataSetError>(),
        Some(DataSetError::InvalidOperation(_))
    ));
    assert_eq!(source.request_count(), 0);
}

#[tokio::test]
async fn test_operations_need_a_data_set() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    let err = data_set
        .insert_rows(&[RowSpan { row_start: 0, count: 1 }])
        .await
        .unwrap_err();
    assert_eq!(err.downcast_ref::<DataSetError>(), Some(&DataSetError::NotLoaded));
    assert_eq!(source.request_count(), 0);
}

#[tokio::test]
async fn test_transport_errors_propagate() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(5, abc())).unwrap();

    let err = data_set.toggle_filter_visibility().await.unwrap_err();
    assert!(err.to_string().contains("no scripted response"));
    assert!(!data_set.store().filters_visible);
}

#[tokio::test]
async fn test_insert_columns_at_display_index() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    let columns = vec![
        column(9, "F", ColumnType::Filter, true),
        column(1, "A", ColumnType::Data, false),
        column(2, "B", ColumnType::Data, false),
    ];
    data_set.setup(&info(5, columns)).unwrap();
    data_set.set_editing_columns(Some(vec![ColumnId(1)]));

    let mut created = column(7, "N", ColumnType::Computed, false);
    created.index = Some(2);
    source.push_response(schema_response(5, vec![created]));

    let entry = ColumnSchema {
        index: Some(1),
        column_type: Some(ColumnType::Computed),
        ..Default::default()
    };
    let placements = data_set.insert_columns(vec![entry], true).await.unwrap();

    match source.last_request() {
        Some(DataSetRequest::InsertColumns(entries)) => {
            // display 1 is B, real index 2
            assert_eq!(entries[0].index, Some(2));
            assert_eq!(entries[0].action, ColumnAction::Insert);
        }
        other => panic!("unexpected request {:?}", other),
    }
    assert_eq!(placements.len(), 1);
    assert_eq!((placements[0].index, placements[0].d_index), (2, Some(1)));
    assert_eq!(data_set.store().editing_var, Some(vec![ColumnId(7)]));
    assert_eq!(data_set.selection().current().left(), 1);
}

#[tokio::test]
async fn test_delete_moves_editing_to_neighbour() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(5, abc())).unwrap();
    data_set.set_editing_columns(Some(vec![ColumnId(2)]));

    source.push_response(schema_response(5, vec![ColumnSchema::new(ColumnAction::Remove, 2)]));
    data_set.delete_columns(&[ColumnId(2)]).await.unwrap();

    assert_eq!(data_set.store().editing_var, Some(vec![ColumnId(3)]));
    assert_eq!(data_set.selection().current().left(), 1);
}

#[tokio::test]
async fn test_row_insert_then_undo_selects_rows() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(10, abc())).unwrap();
    let (log, seen, _) = EventLog::new();
    data_set.subscribe(Box::new(log));
    data_set.set_viewport(Viewport::new(0, 0, 2, 9)).await.unwrap();

    let mut inserted = schema_response(13, Vec::new());
    inserted.rows = vec![RowData::new(RowDataAction::Insert, 2, 3)];
    source.push_response(inserted);
    source.clear_cell_requests();
    data_set
        .insert_rows(&[RowSpan { row_start: 2, count: 3 }])
        .await
        .unwrap();

    assert_eq!(
        source.last_request(),
        Some(DataSetRequest::InsertRows(vec![RowData::new(RowDataAction::Insert, 2, 3)]))
    );
    assert_eq!(data_set.store().row_count, 13);
    // a row change redraws the whole window
    assert_eq!(source.last_cell_request(), Some(CellArea::new(0, 0, 2, 9)));
    {
        let seen = seen.lock().unwrap();
        assert!(position(&seen, "rowsInserted") < position(&seen, "refreshView"));
    }

    let mut removed = schema_response(10, Vec::new());
    removed.rows = vec![RowData::new(RowDataAction::Remove, 2, 3)];
    source.push_response(removed);
    data_set.undo().await.unwrap();

    let current = data_set.selection().current();
    assert_eq!((current.top, current.bottom), (2, 4));
    assert_eq!((current.left(), current.right()), (0, 2));
}

#[tokio::test]
async fn test_toggle_filter_visibility() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(5, abc())).unwrap();

    let mut response = schema_response(5, Vec::new());
    if let Some(schema) = response.schema.as_mut() {
        schema.filters_visible = true;
    }
    source.push_response(response);
    data_set.toggle_filter_visibility().await.unwrap();

    assert_eq!(source.last_request(), Some(DataSetRequest::SetFiltersVisible(true)));
    assert!(data_set.store().filters_visible);
}

#[tokio::test]
async fn test_transforms_are_created_and_removed() {
    let source = ScriptedSource::new();
    let mut data_set = DataSet::new(source.clone());
    data_set.setup(&info(5, abc())).unwrap();
    let (log, seen, _) = EventLog::new();
    data_set.subscribe(Box::new(log));

    let mut created = schema_response(5, Vec::new());
    if let Some(schema) = created.schema.as_mut() {
        schema.transforms = vec![TransformSchema {
            action: TransformAction::Create,
            id: 4,
            name: Some("Recode".to_string()),
            ..Default::default()
        }];
    }
    source.push_response(created);
    data_set
        .set_transforms(vec![TransformSchema {
            id: 99,
            name: Some("Recode".to_string()),
            ..Default::default()
        }])
        .await
        .unwrap();

    match source.last_request() {
        Some(DataSetRequest::SetTransforms(entries)) => {
            assert_eq!(entries[0].action, TransformAction::Create);
            assert_eq!(entries[0].id, 0);
            assert_eq!(entries[0].formula, Some(vec![String::new()]));
        }
        other => panic!("unexpected request {:?}", other),
    }
    assert_eq!(
        data_set.store().get_transform_by_id(TransformId(4)).map(|t| t.name.as_str()),
        Some("Recode")
    );

    let mut removed = schema_response(5, Vec::new());
    if let Some(schema) = removed.schema.as_mut() {
        schema.transforms = vec![TransformSchema {
            action: TransformAction::Remove,
            id: 4,
            ..Default::default()
        }];
    }
    source.push_response(removed);
    data_set.remove_transforms(&[TransformId(4)]).await.unwrap();

    assert!(data_set.store().transforms().is_empty());
    let seen = seen.lock().unwrap();
    assert!(position(&seen, "transformAdded") < position(&seen, "transformRemoved"));
}
