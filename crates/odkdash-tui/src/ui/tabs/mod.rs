pub mod charts;
pub mod data;
pub mod summary;
