//! Job orchestration for the two ingestion paths.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use hydro_common::{
    CancellationToken, HydroError, HydroResult, OverwritePolicy, ProgressSink, Series, Theme,
};
use storage::SeriesRepository;
use tabular_parser::TableParseOutcome;

use crate::cache::ClientCache;
use crate::config::IngestionConfig;
use crate::fetcher::ObservationFetcher;
use crate::file_import::{build_series, FileImportSettings};

/// Lifecycle states a job moves through. Purely observational; transitions
/// are logged, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Fetching,
    Parsing,
    Resolving,
    Persisting,
    Completed,
    NoData,
    Failed,
    Cancelled,
}

/// Terminal status of a job.
///
/// `NoData` is the expected empty-range outcome, kept apart from `Failed`
/// so callers do not retry or alert on it.
#[derive(Debug)]
pub enum JobStatus {
    Completed,
    NoData,
    Cancelled,
    Failed(HydroError),
}

/// Per-series accounting for a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSaveReport {
    pub site_code: String,
    pub variable_code: String,
    pub values_saved: usize,
}

/// What a job produced.
#[derive(Debug)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub reports: Vec<SeriesSaveReport>,
}

impl JobOutcome {
    fn finished(reports: Vec<SeriesSaveReport>) -> Self {
        Self {
            status: JobStatus::Completed,
            reports,
        }
    }

    fn terminal(status: JobStatus) -> Self {
        Self {
            status,
            reports: Vec::new(),
        }
    }

    pub fn total_values_saved(&self) -> usize {
        self.reports.iter().map(|r| r.values_saved).sum()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, JobStatus::Completed)
    }
}

/// One download job: a (site, variable) pair over a date range at one
/// service endpoint.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub endpoint: String,
    pub site_code: String,
    pub variable_code: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Theme the saved series attach to; defaults to `download`.
    pub theme: Option<Theme>,
    /// Policy for pairs that already have a stored series; defaults to
    /// the configured download policy.
    pub policy: Option<OverwritePolicy>,
}

/// Drives fetch, parse, resolve, and persist for both ingestion paths.
///
/// Jobs never panic the caller: every failure lands in
/// [`JobStatus::Failed`] with the error preserved.
pub struct IngestionPipeline {
    fetcher: ObservationFetcher,
    repo: Arc<dyn SeriesRepository>,
    config: IngestionConfig,
}

impl IngestionPipeline {
    pub fn new(repo: Arc<dyn SeriesRepository>, config: IngestionConfig) -> HydroResult<Self> {
        let cache = Arc::new(ClientCache::new(config.request_timeout())?);
        Ok(Self {
            fetcher: ObservationFetcher::new(cache),
            repo,
            config,
        })
    }

    /// Run one download job to completion.
    #[instrument(skip(self, cancel), fields(
        site = %request.site_code,
        variable = %request.variable_code,
        endpoint = %request.endpoint,
    ))]
    pub async fn run_download_job(
        &self,
        request: DownloadRequest,
        cancel: Option<&CancellationToken>,
    ) -> JobOutcome {
        match self.download_inner(&request, cancel).await {
            Ok(outcome) => outcome,
            Err(HydroError::Cancelled) => {
                info!(state = ?JobState::Cancelled, "Download job cancelled");
                JobOutcome::terminal(JobStatus::Cancelled)
            }
            Err(HydroError::NoSeries) => {
                info!(state = ?JobState::NoData, "No data series in requested range");
                JobOutcome::terminal(JobStatus::NoData)
            }
            Err(e) => {
                warn!(state = ?JobState::Failed, error = %e, "Download job failed");
                JobOutcome::terminal(JobStatus::Failed(e))
            }
        }
    }

    async fn download_inner(
        &self,
        request: &DownloadRequest,
        cancel: Option<&CancellationToken>,
    ) -> HydroResult<JobOutcome> {
        check_cancelled(cancel)?;

        info!(state = ?JobState::Fetching, "Fetching observation document");
        let document = self.fetch_with_retry(request, cancel).await?;

        check_cancelled(cancel)?;
        info!(state = ?JobState::Parsing, size = document.data.len(), "Parsing document");
        let series = waterml_parser::parse_document(&document.data, document.version)?;

        let theme = request
            .theme
            .clone()
            .unwrap_or_else(|| Theme::new("download"));

        let mut reports = Vec::with_capacity(series.len());
        for series in &series {
            check_cancelled(cancel)?;
            let policy = self
                .resolve_policy(series, request.policy.unwrap_or(self.config.download_policy))
                .await?;
            reports.push(self.persist_series(series, &theme, policy).await?);
        }

        info!(
            state = ?JobState::Completed,
            series = reports.len(),
            values = reports.iter().map(|r| r.values_saved).sum::<usize>(),
            "Download job complete"
        );
        Ok(JobOutcome::finished(reports))
    }

    /// Fetch with bounded exponential backoff. Only transport failures
    /// retry; anything else surfaces immediately.
    async fn fetch_with_retry(
        &self,
        request: &DownloadRequest,
        cancel: Option<&CancellationToken>,
    ) -> HydroResult<crate::fetcher::RawDocument> {
        let mut delay = self.config.retry_delay();
        let mut attempts_left = self.config.max_fetch_retries;

        loop {
            check_cancelled(cancel)?;
            match self
                .fetcher
                .fetch_raw_document(
                    &request.endpoint,
                    &request.site_code,
                    &request.variable_code,
                    request.start_date,
                    request.end_date,
                )
                .await
            {
                Ok(document) => return Ok(document),
                Err(e @ HydroError::Fetch { .. }) if attempts_left > 0 => {
                    warn!(error = %e, retry_in = ?delay, "Fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempts_left -= 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one file import job to completion.
    #[instrument(skip(self, settings, progress, cancel), fields(path = %settings.path.display()))]
    pub async fn run_file_job(
        &self,
        settings: FileImportSettings,
        progress: Option<Arc<dyn ProgressSink>>,
        cancel: Option<CancellationToken>,
    ) -> JobOutcome {
        match self.file_inner(settings, progress, cancel).await {
            Ok(outcome) => outcome,
            Err(HydroError::Cancelled) => {
                info!(state = ?JobState::Cancelled, "File import cancelled");
                JobOutcome::terminal(JobStatus::Cancelled)
            }
            Err(e) => {
                warn!(state = ?JobState::Failed, error = %e, "File import failed");
                JobOutcome::terminal(JobStatus::Failed(e))
            }
        }
    }

    async fn file_inner(
        &self,
        settings: FileImportSettings,
        progress: Option<Arc<dyn ProgressSink>>,
        cancel: Option<CancellationToken>,
    ) -> HydroResult<JobOutcome> {
        info!(state = ?JobState::Parsing, "Parsing import file");

        // File parsing is synchronous IO; keep it off the async workers.
        let path = settings.path.clone();
        let has_header = settings.has_header;
        let token = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            tabular_parser::parse_file(
                &path,
                has_header,
                progress.as_deref(),
                token.as_ref(),
            )
        })
        .await
        .map_err(|e| HydroError::parse("file parse task panicked", e))??;

        let table = match outcome {
            TableParseOutcome::Completed(table) => table,
            TableParseOutcome::Cancelled => return Err(HydroError::Cancelled),
        };

        info!(state = ?JobState::Resolving, rows = table.row_count(), "Mapping columns to series");
        let series = build_series(&table, &settings);
        let theme = settings.resolve_theme();

        let mut reports = Vec::with_capacity(series.len());
        for series in &series {
            check_cancelled(cancel.as_ref())?;
            let policy = self
                .resolve_policy(
                    series,
                    settings.policy_for(&series.site.code, &series.variable.code),
                )
                .await?;
            reports.push(self.persist_series(series, &theme, policy).await?);
        }

        info!(
            state = ?JobState::Completed,
            series = reports.len(),
            values = reports.iter().map(|r| r.values_saved).sum::<usize>(),
            "File import complete"
        );
        Ok(JobOutcome::finished(reports))
    }

    /// A policy choice applies only when the pair already has a stored
    /// series; a new pair is always written outright.
    async fn resolve_policy(
        &self,
        series: &Series,
        existing_policy: OverwritePolicy,
    ) -> HydroResult<OverwritePolicy> {
        let exists = self
            .repo
            .series_exists(&series.site.code, &series.variable.code)
            .await?;
        Ok(if exists {
            existing_policy
        } else {
            OverwritePolicy::Overwrite
        })
    }

    async fn persist_series(
        &self,
        series: &Series,
        theme: &Theme,
        policy: OverwritePolicy,
    ) -> HydroResult<SeriesSaveReport> {
        info!(
            state = ?JobState::Persisting,
            site = %series.site.code,
            variable = %series.variable.code,
            policy = %policy,
            values = series.value_count(),
            "Saving series"
        );

        if !self.repo.site_exists(&series.site.code).await? {
            self.repo.add_site(&series.site).await?;
        }
        if !self.repo.variable_exists(&series.variable.code).await? {
            self.repo.insert_variable(&series.variable).await?;
        }

        let saved = self.repo.save_series(series, theme, policy).await?;
        Ok(SeriesSaveReport {
            site_code: series.site.code.clone(),
            variable_code: series.variable.code.clone(),
            values_saved: saved.values_saved,
        })
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> HydroResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(HydroError::Cancelled),
        _ => Ok(()),
    }
}
