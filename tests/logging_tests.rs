mod common;

use common::{column, info, EventLog, ScriptedSource};
use dataset_view::data::column::ColumnType;
use dataset_view::utils::logging::{get_log_buffer, init_tracing};
use dataset_view::DataSet;

#[test]
fn test_model_logs_reach_the_ring_buffer() {
    let buffer = init_tracing("debug");
    assert!(get_log_buffer().is_some());

    let mut data_set = DataSet::new(ScriptedSource::new());
    let columns = vec![column(1, "A", ColumnType::Data, false)];
    data_set.setup(&info(3, columns)).unwrap();
    let (log, _, _) = EventLog::new();
    data_set.subscribe(Box::new(log));

    let entries = buffer.get_recent(200);
    let loaded = entries
        .iter()
        .find(|e| e.message.contains("Data set loaded"))
        .unwrap_or_else(|| panic!("no load entry in {:?}", entries));
    assert_eq!(loaded.target, "dataset");
    assert_eq!(loaded.level, "INFO");

    let subscribed = entries
        .iter()
        .find(|e| e.message.contains("Adding subscriber"))
        .unwrap_or_else(|| panic!("no subscriber entry in {:?}", entries));
    assert_eq!(subscribed.target, "events");
    assert_eq!(subscribed.message, "EventDispatcher: Adding subscriber: EventLog");
}
