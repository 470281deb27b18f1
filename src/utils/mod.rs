pub mod extractor;
pub mod models;
pub mod pagination;
pub mod tracing;
