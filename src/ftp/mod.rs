use anyhow::{Context, Result};
use std::io::Cursor;
use std::net::ToSocketAddrs;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpStream, Mode};
use tracing::{debug, warn};

/// Default connect/read timeout in seconds. Short so an unreachable device
/// fails fast; raise it on very slow links.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Configuration for the FTP connection to the PLC
#[derive(Debug, Clone)]
pub struct FtpConfig {
    /// PLC hostname or address
    pub host: String,

    /// FTP server port (usually 21)
    pub port: u16,

    /// FTP username (factory default for MELSEC iQ-F is "FXCPU")
    pub username: String,

    /// FTP password (factory default for MELSEC iQ-F is "FXCPU")
    pub password: String,

    /// Connect and read timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 21,
            username: "FXCPU".to_string(),
            password: "FXCPU".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// One authenticated FTP session against the PLC.
///
/// Transfer mode is fixed to active: the MELSEC device class rejects
/// passive mode negotiation. Binary transfer type is set at login.
pub struct PlcFtpClient {
    stream: FtpStream,
}

impl PlcFtpClient {
    /// Connect, enforce active mode, authenticate, and switch to binary
    /// transfers. Any failure here is a stage-level failure for the caller.
    pub fn connect(config: &FtpConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .with_context(|| {
                format!("Failed to resolve FTP host: {}:{}", config.host, config.port)
            })?
            .next()
            .with_context(|| format!("No address found for FTP host: {}", config.host))?;

        debug!("Connecting to PLC at {}", addr);
        let mut stream = FtpStream::connect_timeout(addr, timeout).with_context(|| {
            format!("Failed to connect to PLC at {}:{}", config.host, config.port)
        })?;

        stream
            .get_ref()
            .set_read_timeout(Some(timeout))
            .context("Failed to set FTP read timeout")?;

        // MELSEC iQ-F controllers reject passive mode negotiation
        stream.set_mode(Mode::Active);

        debug!("Logging in as: {}", config.username);
        stream
            .login(&config.username, &config.password)
            .context("FTP login failed")?;

        stream
            .transfer_type(FileType::Binary)
            .context("Failed to set binary transfer type")?;

        Ok(Self { stream })
    }

    /// NLST listing of a remote path; entries come back as full paths.
    pub fn list_names(&mut self, path: &str) -> Result<Vec<String>> {
        self.stream
            .nlst(Some(path))
            .with_context(|| format!("Failed to list remote path: {}", path))
    }

    /// Retrieve the full contents of a remote file.
    pub fn retrieve(&mut self, path: &str) -> Result<Cursor<Vec<u8>>> {
        self.stream
            .retr_as_buffer(path)
            .with_context(|| format!("Failed to retrieve remote file: {}", path))
    }

    /// Delete a remote file.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        self.stream
            .rm(path)
            .with_context(|| format!("Failed to delete remote file: {}", path))
    }

    /// End the session. A failed QUIT is only worth a warning.
    pub fn quit(mut self) {
        if let Err(e) = self.stream.quit() {
            warn!("Failed to quit FTP session gracefully: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ftp_config_default() {
        let config = FtpConfig::default();
        assert_eq!(config.port, 21);
        assert_eq!(config.username, "FXCPU");
        assert_eq!(config.timeout_secs, 3);
    }
}
