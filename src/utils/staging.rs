use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix marking an in-progress download. It is only ever removed by the
/// atomic rename that finalizes the file.
pub const TEMP_SUFFIX: &str = ".TMP";

/// Local directory holding files between remote download and database commit.
///
/// A file exists here in one of two states: partial (written under
/// `name + ".TMP"`) or final (its true name, reached only via rename after
/// the full byte stream was received).
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove partial files left behind by an interrupted run.
    ///
    /// Final-named files are never touched. Returns the number of entries
    /// removed; each removal is logged as a warning.
    pub fn purge_stale_partials(&self) -> Result<usize> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read staging directory: {:?}", self.dir))?;

        let mut removed = 0;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to read staging entry in {:?}", self.dir))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            if is_partial_name(name) {
                let path = entry.path();
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove stale partial: {:?}", path))?;
                warn!("Removed stale partial file {:?}", path);
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Stream `source` into a temp-named file, then atomically rename it to
    /// `final_name`.
    ///
    /// If writing fails partway the partial file is left in place (the next
    /// `purge_stale_partials` pass removes it) and no rename occurs, so the
    /// final name only ever refers to a completely written file.
    pub fn write_via_temp_then_rename<R: Read>(
        &self,
        final_name: &str,
        source: &mut R,
    ) -> Result<PathBuf> {
        let final_path = self.dir.join(final_name);
        let temp_path = self.dir.join(format!("{final_name}{TEMP_SUFFIX}"));

        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
        io::copy(source, &mut file)
            .with_context(|| format!("Failed to write temp file: {:?}", temp_path))?;
        file.flush()
            .with_context(|| format!("Failed to flush temp file: {:?}", temp_path))?;
        drop(file);

        fs::rename(&temp_path, &final_path).with_context(|| {
            format!("Failed to rename {:?} to {:?}", temp_path, final_path)
        })?;

        debug!("Materialized staged file {:?}", final_path);
        Ok(final_path)
    }

    /// List every entry in the staging directory.
    pub fn list_entries(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read staging directory: {:?}", self.dir))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        paths.sort();

        Ok(paths)
    }
}

/// Check if an entry name carries the temp suffix (case-insensitive)
/// Pure function
fn is_partial_name(name: &str) -> bool {
    name.to_ascii_lowercase()
        .ends_with(&TEMP_SUFFIX.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that yields a few bytes, then fails like a dropped link.
    struct InterruptedReader {
        emitted: bool,
    }

    impl Read for InterruptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.emitted {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "link dropped"))
            } else {
                self.emitted = true;
                buf[..5].copy_from_slice(b"1,2,3");
                Ok(5)
            }
        }
    }

    #[test]
    fn test_is_partial_name() {
        assert!(is_partial_name("LOG_0001.CSV.TMP"));
        assert!(is_partial_name("log_0001.csv.tmp"));
        assert!(!is_partial_name("LOG_0001.CSV"));
    }

    #[test]
    fn test_purge_removes_only_partials() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.CSV"), "data").unwrap();
        fs::write(dir.path().join("B.CSV.TMP"), "part").unwrap();
        fs::write(dir.path().join("c.csv.tmp"), "part").unwrap();

        let staging = StagingArea::new(dir.path());
        let removed = staging.purge_stale_partials().unwrap();

        assert_eq!(removed, 2);
        assert!(dir.path().join("A.CSV").exists());
        assert!(!dir.path().join("B.CSV.TMP").exists());
        assert!(!dir.path().join("c.csv.tmp").exists());
    }

    #[test]
    fn test_write_via_temp_then_rename_success() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());

        let mut source = Cursor::new(b"h1\nh2\nh3\n1,2\n".to_vec());
        let path = staging
            .write_via_temp_then_rename("LOG_0001.CSV", &mut source)
            .unwrap();

        assert_eq!(path, dir.path().join("LOG_0001.CSV"));
        assert_eq!(fs::read(&path).unwrap(), b"h1\nh2\nh3\n1,2\n");
        assert!(!dir.path().join("LOG_0001.CSV.TMP").exists());
    }

    #[test]
    fn test_interrupted_write_leaves_no_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());

        let mut source = InterruptedReader { emitted: false };
        let result = staging.write_via_temp_then_rename("LOG_0001.CSV", &mut source);

        assert!(result.is_err());
        assert!(!dir.path().join("LOG_0001.CSV").exists());
        assert!(dir.path().join("LOG_0001.CSV.TMP").exists());

        // the partial is reclaimed by the next purge
        let removed = staging.purge_stale_partials().unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("LOG_0001.CSV.TMP").exists());
    }

    #[test]
    fn test_list_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.CSV"), "data").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let staging = StagingArea::new(dir.path());
        assert_eq!(staging.list_entries().unwrap().len(), 2);
    }
}
