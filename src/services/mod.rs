pub mod bulk_load;
pub mod pipeline;
pub mod remote_sync;

pub use bulk_load::{LoadConfig, LoadReport, PostgresImporter, DEFAULT_HEADER_LINES};
pub use pipeline::{run_pipeline, BulkImporter, PipelineReport, RemoteSyncer};
pub use remote_sync::{PlcSyncer, SyncConfig, SyncReport};
