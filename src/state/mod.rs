//! Event plumbing between the data set model and the views that observe it

pub mod dispatcher;
pub mod events;

pub use dispatcher::{DataSetSubscriber, EditBatch, EventDispatcher};
pub use events::DataSetEvent;
