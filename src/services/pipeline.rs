use crate::services::{LoadReport, SyncReport};
use anyhow::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Capability to bring remote log files into the local staging area.
#[async_trait]
pub trait RemoteSyncer: Send + Sync {
    async fn sync(&self) -> Result<SyncReport>;
}

/// Capability to move staged files into the database.
#[async_trait]
pub trait BulkImporter: Send + Sync {
    async fn import(&self) -> Result<LoadReport>;
}

/// Aggregated result of one pipeline run. A `None` stage report means that
/// stage failed at the connection level; its counters are unavailable.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub sync: Option<SyncReport>,
    pub load: Option<LoadReport>,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn completed_stages(&self) -> usize {
        self.sync.is_some() as usize + self.load.is_some() as usize
    }
}

/// Run the sync stage then the load stage sequentially.
///
/// A stage-level failure (unreachable PLC, unreachable database) is logged
/// and recorded without preventing the other stage from attempting its work.
pub async fn run_pipeline(
    syncer: &dyn RemoteSyncer,
    importer: &dyn BulkImporter,
) -> PipelineReport {
    let started = Instant::now();

    info!("Begin import from PLC to staging directory");
    let sync = match syncer.sync().await {
        Ok(report) => Some(report),
        Err(e) => {
            error!("Remote sync stage failed: {:#}", e);
            None
        }
    };

    info!("Begin import from staging directory to database");
    let load = match importer.import().await {
        Ok(report) => Some(report),
        Err(e) => {
            error!("Bulk load stage failed: {:#}", e);
            None
        }
    };

    PipelineReport {
        sync,
        load,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubSyncer {
        fail: bool,
    }

    #[async_trait]
    impl RemoteSyncer for StubSyncer {
        async fn sync(&self) -> Result<SyncReport> {
            if self.fail {
                anyhow::bail!("PLC unreachable");
            }
            Ok(SyncReport {
                found: 3,
                downloaded: 2,
                deleted_remote: 2,
            })
        }
    }

    struct StubImporter {
        fail: bool,
        called: AtomicBool,
    }

    #[async_trait]
    impl BulkImporter for StubImporter {
        async fn import(&self) -> Result<LoadReport> {
            self.called.store(true, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("database unreachable");
            }
            Ok(LoadReport {
                found: 5,
                attempted: 5,
                imported: 4,
            })
        }
    }

    #[tokio::test]
    async fn test_failed_sync_does_not_prevent_load() {
        let syncer = StubSyncer { fail: true };
        let importer = StubImporter {
            fail: false,
            called: AtomicBool::new(false),
        };

        let report = run_pipeline(&syncer, &importer).await;

        assert!(importer.called.load(Ordering::SeqCst));
        assert!(report.sync.is_none());
        assert_eq!(report.completed_stages(), 1);
        assert_eq!(report.load.unwrap().imported, 4);
    }

    #[tokio::test]
    async fn test_both_stage_reports_are_carried() {
        let syncer = StubSyncer { fail: false };
        let importer = StubImporter {
            fail: false,
            called: AtomicBool::new(false),
        };

        let report = run_pipeline(&syncer, &importer).await;

        let sync = report.sync.unwrap();
        assert_eq!((sync.found, sync.downloaded, sync.deleted_remote), (3, 2, 2));
        let load = report.load.unwrap();
        assert_eq!((load.found, load.attempted, load.imported), (5, 5, 4));
    }

    #[tokio::test]
    async fn test_failed_load_still_reports_sync() {
        let syncer = StubSyncer { fail: false };
        let importer = StubImporter {
            fail: true,
            called: AtomicBool::new(false),
        };

        let report = run_pipeline(&syncer, &importer).await;

        assert!(report.sync.is_some());
        assert!(report.load.is_none());
    }
}
