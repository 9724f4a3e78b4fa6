pub mod catalog_pipeline;
pub mod mastering;
