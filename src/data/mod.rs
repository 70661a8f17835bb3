//! Data layer: the column store, the wire shapes exchanged with the data
//! source, the schema diff engine and the controller tying them together

pub mod cells;
pub mod column;
pub mod column_store;
pub mod data_set;
pub mod data_source;
pub mod error;
pub mod schema;
pub mod schema_diff;
