use crate::database::{create_connection_pool, DbConfig, DbPool};
use crate::models::is_csv_name;
use crate::services::pipeline::BulkImporter;
use crate::utils::StagingArea;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fixed-format header block emitted by MELSEC iQ-F data logging. Kept
/// configurable since other log formats may differ.
pub const DEFAULT_HEADER_LINES: usize = 3;

/// Configuration for the staging-to-database load stage
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub staging_dir: PathBuf,
    pub db: DbConfig,
    pub schema: String,
    pub table: String,
    /// Number of leading lines to skip in each CSV file
    pub header_lines: usize,
}

impl LoadConfig {
    /// Schema-qualified, quoted target identifier, e.g. `"0001"."0001"`
    pub fn qualified_table(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }

    fn copy_statement(&self) -> String {
        format!(
            "COPY {} FROM STDIN WITH (FORMAT csv, DELIMITER ',')",
            self.qualified_table()
        )
    }
}

/// Report structure for the load stage
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub found: usize,
    pub attempted: usize,
    pub imported: usize,
}

impl LoadReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn import_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.imported as f64 / self.attempted as f64
        }
    }
}

/// Load stage implementation against PostgreSQL
pub struct PostgresImporter {
    config: LoadConfig,
}

impl PostgresImporter {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BulkImporter for PostgresImporter {
    async fn import(&self) -> Result<LoadReport> {
        load_staged_files(&self.config).await
    }
}

/// One pass over the staging directory with a single pool for the run.
///
/// Each CSV file is copied into the target table inside its own
/// transaction and deleted from staging only after the commit, so a file
/// left behind by any failure is safe to retry verbatim on the next run.
async fn load_staged_files(config: &LoadConfig) -> Result<LoadReport> {
    let staging = StagingArea::new(&config.staging_dir);
    let entries = staging.list_entries()?;

    let mut report = LoadReport {
        found: entries.len(),
        ..LoadReport::empty()
    };

    let pool = create_connection_pool(&config.db).await?;
    info!(
        "Loading staged files into {} ({} entries in staging)",
        config.qualified_table(),
        report.found
    );

    for path in &entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !is_csv_name(name) {
            continue;
        }
        report.attempted += 1;

        match import_one(&pool, config, path).await {
            Ok(rows) => {
                report.imported += 1;
                match fs::remove_file(path) {
                    Ok(()) => debug!(
                        "{:?} imported to database ({} rows) and deleted from staging",
                        path, rows
                    ),
                    Err(e) => warn!(
                        "{:?} imported to database, but not deleted from staging: {}",
                        path, e
                    ),
                }
            }
            Err(e) => warn!("Failed to import {:?}: {:#}", path, e),
        }
    }

    pool.close().await;
    Ok(report)
}

/// Copy one staged file into the target table inside a transaction.
/// An error anywhere before the commit rolls the transaction back and
/// leaves the file untouched.
async fn import_one(pool: &DbPool, config: &LoadConfig, path: &Path) -> Result<u64> {
    let data =
        fs::read(path).with_context(|| format!("Failed to read staged file: {:?}", path))?;
    let payload = strip_header_lines(&data, config.header_lines).with_context(|| {
        format!(
            "{:?} has fewer than {} lines; not a complete log file",
            path, config.header_lines
        )
    })?;

    let mut tx = pool.begin().await?;

    let mut copy = tx
        .copy_in_raw(&config.copy_statement())
        .await
        .with_context(|| format!("COPY into {} rejected", config.qualified_table()))?;
    copy.send(payload)
        .await
        .with_context(|| format!("Failed to stream {:?} into the database", path))?;
    let rows = copy
        .finish()
        .await
        .with_context(|| format!("Failed to finish COPY for {:?}", path))?;

    tx.commit().await?;
    Ok(rows)
}

/// Drop exactly the first `header_lines` lines of `data`. A file with fewer
/// lines than the header block is not a complete log file and yields `None`
/// so the caller can leave it in place instead of committing nothing.
/// Pure function
fn strip_header_lines(data: &[u8], header_lines: usize) -> Option<&[u8]> {
    let mut offset = 0;
    for _ in 0..header_lines {
        if offset >= data.len() {
            return None;
        }
        match data[offset..].iter().position(|&b| b == b'\n') {
            Some(newline) => offset += newline + 1,
            // final line without a trailing newline still counts
            None => offset = data.len(),
        }
    }
    Some(&data[offset..])
}
