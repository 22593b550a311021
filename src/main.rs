use anyhow::Result;
use clap::{Arg, Command};
use plc_log_ingest::{
    run_pipeline, AppConfig, DbConfig, FtpConfig, LoadConfig, PipelineReport, PlcSyncer,
    PostgresImporter, SyncConfig,
};
use std::env;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("PLC Log Ingest")
        .version("1.0")
        .about("Moves PLC CSV log files from an FTP server into a PostgreSQL table")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Set the log level (trace, debug, info, warn, error)")
                .default_value("info"),
        )
        .arg(
            Arg::new("header-lines")
                .long("header-lines")
                .value_name("LINES")
                .help("Number of header lines to skip in each CSV file")
                .default_value("3"),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .value_name("SECONDS")
                .help("FTP connect/read timeout; raise this on slow links")
                .default_value("3"),
        )
        .get_matches();

    // Initialize logging
    initialize_logging(matches.get_one::<String>("log-level").unwrap())?;

    // Load environment variables
    load_environment_variables()?;

    // Initialize configuration from environment and command line arguments
    let config = create_app_config(&matches)?;

    // Run the application
    run_application(config).await
}

/// Initialize structured logging with tracing
fn initialize_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("sqlx=warn".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

/// Load and validate environment variables
fn load_environment_variables() -> Result<()> {
    // Load .env file if it exists
    if dotenvy::dotenv().is_err() {
        info!("No .env file found, using system environment variables");
    }

    let required_vars = [
        "STAGING_DIR",
        "PLC_HOST",
        "PLC_LOG_ROOT",
        "PG_HOST",
        "PG_DATABASE",
        "PG_USERNAME",
        "PG_PASSWORD",
        "PG_SCHEMA",
        "PG_TABLE",
    ];

    for var in &required_vars {
        match env::var(var) {
            Ok(value) if !value.is_empty() => {}
            _ => {
                anyhow::bail!("Required environment variable {} is not set or empty", var);
            }
        }
    }

    Ok(())
}

/// Build the immutable application configuration from the environment and
/// CLI arguments
fn create_app_config(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let log_level = matches.get_one::<String>("log-level").unwrap().clone();

    let header_lines: usize = matches
        .get_one::<String>("header-lines")
        .unwrap()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid header-lines value"))?;

    let timeout_secs: u64 = matches
        .get_one::<String>("timeout-secs")
        .unwrap()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid timeout-secs value"))?;

    let staging_dir = PathBuf::from(env::var("STAGING_DIR")?);

    let ftp = FtpConfig {
        host: env::var("PLC_HOST")?,
        port: env_or("PLC_FTP_PORT", "21").parse()
            .map_err(|_| anyhow::anyhow!("Invalid PLC_FTP_PORT value"))?,
        username: env_or("PLC_FTP_USERNAME", "FXCPU"),
        password: env_or("PLC_FTP_PASSWORD", "FXCPU"),
        timeout_secs,
    };

    let db = DbConfig {
        host: env::var("PG_HOST")?,
        port: env_or("PG_PORT", "5432").parse()
            .map_err(|_| anyhow::anyhow!("Invalid PG_PORT value"))?,
        database: env::var("PG_DATABASE")?,
        username: env::var("PG_USERNAME")?,
        password: env::var("PG_PASSWORD")?,
    };

    Ok(AppConfig {
        sync: SyncConfig {
            staging_dir: staging_dir.clone(),
            ftp,
            log_root: env::var("PLC_LOG_ROOT")?,
        },
        load: LoadConfig {
            staging_dir,
            db,
            schema: env::var("PG_SCHEMA")?,
            table: env::var("PG_TABLE")?,
            header_lines,
        },
        log_level,
    })
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Main application logic
async fn run_application(config: AppConfig) -> Result<()> {
    info!("Starting PLC log ingest");

    let syncer = PlcSyncer::new(config.sync);
    let importer = PostgresImporter::new(config.load);

    let report = run_pipeline(&syncer, &importer).await;
    print_pipeline_report(&report);

    info!("Run completed");
    Ok(())
}

/// Print the aggregated pipeline report
fn print_pipeline_report(report: &PipelineReport) {
    info!("=== REMOTE SYNC REPORT ===");
    match &report.sync {
        Some(sync) => {
            info!("Files found on PLC: {}", sync.found);
            info!("Files downloaded to staging: {}", sync.downloaded);
            info!("Files deleted from PLC: {}", sync.deleted_remote);
        }
        None => error!("Remote sync stage did not complete"),
    }

    info!("=== BULK LOAD REPORT ===");
    match &report.load {
        Some(load) => {
            info!("Files found in staging: {}", load.found);
            info!("Files attempted: {}", load.attempted);
            info!("Files imported and removed: {}", load.imported);
        }
        None => error!("Bulk load stage did not complete"),
    }

    info!("=== FINAL SUMMARY ===");
    info!("Stages completed: {}/2", report.completed_stages());
    info!("Time spent: {:.3} s", report.elapsed.as_secs_f64());
}
