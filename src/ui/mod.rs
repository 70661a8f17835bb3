//! View-side model: range algebra, the selection and the viewport cache

pub mod range;
pub mod selection;
pub mod viewport_cache;
