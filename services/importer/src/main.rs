//! Observation importer service.
//!
//! Runs one ingestion job per invocation:
//! - `download`: fetch a (site, variable) range from an exchange endpoint
//! - `import-file`: map columns of a delimited file onto series
//!
//! Both paths persist through the PostgreSQL repository.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use hydro_common::{OverwritePolicy, ProgressSink, Site, Theme, Variable};
use ingestion::{
    ColumnMapping, DownloadRequest, FileImportSettings, IngestionConfig, IngestionPipeline,
    JobOutcome, JobStatus, WatchProgress,
};
use storage::PgSeriesRepository;

#[derive(Parser, Debug)]
#[command(name = "importer")]
#[command(about = "Observation series importer")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download observations from an exchange service endpoint
    Download {
        /// Service endpoint URL
        #[arg(long)]
        endpoint: String,

        /// Site code to request
        #[arg(long)]
        site: String,

        /// Variable code to request
        #[arg(long)]
        variable: String,

        /// Range start (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,

        /// Range end (YYYY-MM-DD)
        #[arg(long)]
        end_date: NaiveDate,

        /// Theme the saved series attach to
        #[arg(long)]
        theme: Option<String>,

        /// Policy when the series already exists (skip/fill/overwrite/copy)
        #[arg(long)]
        policy: Option<String>,
    },

    /// Import series from a delimited file
    ImportFile {
        /// File to import
        path: PathBuf,

        /// Column holding observation timestamps
        #[arg(long, default_value = "DateTime")]
        datetime_column: String,

        /// Column mapping as COLUMN:SITE_CODE:VARIABLE_CODE (repeatable)
        #[arg(long = "map", required = true)]
        mappings: Vec<String>,

        /// Treat the first line as data, not a header
        #[arg(long)]
        no_header: bool,

        /// Policy for pairs that already have a stored series
        #[arg(long, default_value = "overwrite")]
        policy: String,

        /// Theme name; defaults to the file stem
        #[arg(long)]
        theme: Option<String>,
    },
}

fn parse_mapping(raw: &str) -> Result<ColumnMapping> {
    let parts: Vec<&str> = raw.split(':').collect();
    let &[column, site_code, variable_code] = parts.as_slice() else {
        bail!("mapping '{}' must be COLUMN:SITE_CODE:VARIABLE_CODE", raw);
    };
    Ok(ColumnMapping::new(
        column,
        Site::new(site_code, site_code),
        Variable::new(variable_code, variable_code),
    ))
}

/// Forward file-parse progress into the log.
fn spawn_progress_logger() -> Arc<dyn ProgressSink> {
    let (sink, mut rx) = WatchProgress::channel();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let update = rx.borrow_and_update().clone();
            info!(percent = update.percent, "{}", update.message);
        }
    });
    Arc::new(sink)
}

fn report_outcome(outcome: JobOutcome) -> Result<()> {
    for report in &outcome.reports {
        info!(
            site = %report.site_code,
            variable = %report.variable_code,
            values = report.values_saved,
            "Series saved"
        );
    }

    match outcome.status {
        JobStatus::Completed => {
            info!(values = outcome.total_values_saved(), "Import complete");
            Ok(())
        }
        JobStatus::NoData => {
            info!("No data series in the requested range");
            Ok(())
        }
        JobStatus::Cancelled => bail!("import was cancelled"),
        JobStatus::Failed(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = IngestionConfig::from_env()?;

    info!("Connecting to database");
    let repo = PgSeriesRepository::connect(&config.database_url).await?;
    repo.migrate().await?;
    let repo = Arc::new(repo);

    let pipeline = IngestionPipeline::new(repo, config)?;

    match args.command {
        Command::Download {
            endpoint,
            site,
            variable,
            start_date,
            end_date,
            theme,
            policy,
        } => {
            let policy = policy
                .as_deref()
                .map(str::parse::<OverwritePolicy>)
                .transpose()?;

            let request = DownloadRequest {
                endpoint,
                site_code: site,
                variable_code: variable,
                start_date,
                end_date,
                theme: theme.map(Theme::new),
                policy,
            };

            let outcome = pipeline.run_download_job(request, None).await;
            report_outcome(outcome)
        }

        Command::ImportFile {
            path,
            datetime_column,
            mappings,
            no_header,
            policy,
            theme,
        } => {
            let mut settings = FileImportSettings::new(path, datetime_column);
            settings.has_header = !no_header;
            settings.default_policy = policy.parse()?;
            settings.theme = theme.map(Theme::new);
            for raw in &mappings {
                settings.mappings.push(parse_mapping(raw)?);
            }

            let progress = spawn_progress_logger();
            let outcome = pipeline.run_file_job(settings, Some(progress), None).await;
            report_outcome(outcome)
        }
    }
}
