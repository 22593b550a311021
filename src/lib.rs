pub mod database;
pub mod ftp;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use database::{create_connection_pool, DbConfig, DbPool};
pub use ftp::FtpConfig;
pub use services::{
    run_pipeline, BulkImporter, LoadConfig, LoadReport, PipelineReport, PlcSyncer,
    PostgresImporter, RemoteSyncer, SyncConfig, SyncReport, DEFAULT_HEADER_LINES,
};
pub use utils::{StagingArea, TEMP_SUFFIX};

// Application configuration, assembled once at startup and never mutated
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub load: LoadConfig,
    pub log_level: String,
}
