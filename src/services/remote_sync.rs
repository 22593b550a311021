use crate::ftp::{FtpConfig, PlcFtpClient};
use crate::models::{is_csv_name, is_dated_subfolder, local_file_name};
use crate::services::pipeline::RemoteSyncer;
use crate::utils::StagingArea;
use anyhow::Result;
use async_trait::async_trait;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Configuration for the PLC-to-staging sync stage
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub staging_dir: PathBuf,
    pub ftp: FtpConfig,
    /// Remote path under which the PLC writes its dated subfolders,
    /// e.g. `LOGGING/LOG01/`
    pub log_root: String,
}

/// Report structure for the sync stage
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub found: usize,
    pub downloaded: usize,
    pub deleted_remote: usize,
}

impl SyncReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn download_rate(&self) -> f64 {
        if self.found == 0 {
            0.0
        } else {
            self.downloaded as f64 / self.found as f64
        }
    }
}

/// Outcome of one per-file transfer attempt. Failures are values, not
/// propagated errors: a bad file never aborts the folder or the run.
#[derive(Debug)]
pub enum TransferOutcome {
    /// Downloaded, renamed to its final name, and deleted from the PLC
    Complete,
    /// Materialized locally, but the remote delete was rejected; the file
    /// will be seen again (and re-downloaded) on the next run
    DeleteFailed(anyhow::Error),
    /// Download or local materialization failed; the remote file is intact
    DownloadFailed(anyhow::Error),
}

/// Sync stage implementation against a MELSEC iQ-F class controller
pub struct PlcSyncer {
    config: SyncConfig,
}

impl PlcSyncer {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RemoteSyncer for PlcSyncer {
    async fn sync(&self) -> Result<SyncReport> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || sync_blocking(&config))
            .await
            .map_err(|e| anyhow::anyhow!("Remote sync task panicked: {}", e))?
    }
}

/// Full sync pass over one FTP session.
///
/// Connection, authentication, and listing failures propagate as stage
/// failures; everything per-file is recovered and counted.
fn sync_blocking(config: &SyncConfig) -> Result<SyncReport> {
    let staging = StagingArea::new(&config.staging_dir);
    staging.purge_stale_partials()?;

    let mut client = PlcFtpClient::connect(&config.ftp)?;

    let listing = client.list_names(&config.log_root)?;
    let folders: Vec<String> = listing
        .into_iter()
        .filter(|entry| is_dated_subfolder(&config.log_root, entry))
        .collect();
    info!(
        "Found {} dated subfolders under {}",
        folders.len(),
        config.log_root
    );

    let mut outcomes = Vec::new();
    for folder in &folders {
        let entries = client.list_names(folder)?;

        for remote_path in entries.iter().filter(|entry| is_csv_name(entry.as_str())) {
            let outcome = transfer_one(&mut client, &staging, folder, remote_path);
            match &outcome {
                TransferOutcome::Complete => {}
                TransferOutcome::DeleteFailed(e) => {
                    warn!("{} downloaded, but not deleted from PLC: {:#}", remote_path, e);
                }
                TransferOutcome::DownloadFailed(e) => {
                    warn!("Failed to download {}: {:#}", remote_path, e);
                }
            }
            outcomes.push(outcome);
        }
    }

    client.quit();
    Ok(summarize_outcomes(&outcomes))
}

/// The per-file remote operations the transfer loop needs. Splitting these
/// off the session type lets the loop be exercised without a live device.
trait RemoteSource {
    fn retrieve(&mut self, path: &str) -> Result<Cursor<Vec<u8>>>;
    fn delete(&mut self, path: &str) -> Result<()>;
}

impl RemoteSource for PlcFtpClient {
    fn retrieve(&mut self, path: &str) -> Result<Cursor<Vec<u8>>> {
        PlcFtpClient::retrieve(self, path)
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        PlcFtpClient::delete(self, path)
    }
}

/// Transfer one remote file: download into the staging area via the
/// temp-then-rename protocol, then delete the remote copy. The remote file
/// is only deleted once the local file exists under its final name.
fn transfer_one<S: RemoteSource>(
    client: &mut S,
    staging: &StagingArea,
    folder: &str,
    remote_path: &str,
) -> TransferOutcome {
    let local_name = local_file_name(folder, remote_path);

    let mut source = match client.retrieve(remote_path) {
        Ok(cursor) => cursor,
        Err(e) => return TransferOutcome::DownloadFailed(e),
    };

    if let Err(e) = staging.write_via_temp_then_rename(&local_name, &mut source) {
        return TransferOutcome::DownloadFailed(e);
    }
    debug!("{} downloaded to staging directory", remote_path);

    match client.delete(remote_path) {
        Ok(()) => {
            debug!("{} deleted from PLC", remote_path);
            TransferOutcome::Complete
        }
        Err(e) => TransferOutcome::DeleteFailed(e),
    }
}

/// Fold per-file outcomes into the stage counters
/// Pure function
fn summarize_outcomes(outcomes: &[TransferOutcome]) -> SyncReport {
    outcomes.iter().fold(SyncReport::empty(), |mut report, outcome| {
        report.found += 1;
        match outcome {
            TransferOutcome::Complete => {
                report.downloaded += 1;
                report.deleted_remote += 1;
            }
            TransferOutcome::DeleteFailed(_) => report.downloaded += 1,
            TransferOutcome::DownloadFailed(_) => {}
        }
        report
    })
}
