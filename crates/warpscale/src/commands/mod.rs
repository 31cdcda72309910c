pub mod analyze;
pub mod ingest;
pub mod optimize;
pub mod predict;
pub mod resource;
pub mod run;
