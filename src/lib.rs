//! Client-side model behind a spreadsheet data editor
//!
//! The crate keeps a windowed view of a large data set consistent while the
//! schema changes underneath it. Columns are addressed in two coordinate
//! spaces: the real space holds every column, the display space only the
//! visible ones.

pub mod config;
pub mod data;
pub mod state;
pub mod ui;
pub mod utils;

pub use config::Config;
pub use data::column_store::ColumnStore;
pub use data::data_set::DataSet;
pub use data::data_source::DataSource;
pub use data::error::DataSetError;
pub use data::schema_diff::SchemaDiffEngine;
pub use ui::selection::Selection;
pub use ui::viewport_cache::ViewportCache;
