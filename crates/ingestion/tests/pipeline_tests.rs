//! End-to-end ingestion jobs against the in-memory repository.

use std::io::Write as _;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use hydro_common::{
    CancellationToken, HydroError, OverwritePolicy, ProgressSink, Site, Variable,
};
use ingestion::{
    ColumnMapping, DownloadRequest, FileImportSettings, IngestionConfig, IngestionPipeline,
    JobStatus,
};
use storage::{MemorySeriesRepository, SeriesRepository};

const DOCUMENT_V1_1: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<timeSeriesResponse>
  <timeSeries>
    <sourceInfo>
      <siteName>Rio Grande at Embudo</siteName>
      <siteCode network="NWISDV">08279500</siteCode>
      <geoLocation>
        <latitude>36.2059</latitude>
        <longitude>-105.9636</longitude>
      </geoLocation>
    </sourceInfo>
    <variable>
      <variableCode>00060</variableCode>
      <variableName>Discharge</variableName>
      <unit>
        <unitAbbreviation>cfs</unitAbbreviation>
      </unit>
    </variable>
    <values>
      <value dateTime="2024-03-01T00:00:00">1.5</value>
      <value dateTime="2024-03-01T01:00:00">2.5</value>
    </values>
  </timeSeries>
</timeSeriesResponse>"#;

const EMPTY_DOCUMENT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<timeSeriesResponse></timeSeriesResponse>"#;

/// Serve a version probe and observation document from one endpoint.
async fn spawn_service(version: &'static str, document: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                let body = if request.contains("GetVersion") {
                    version
                } else {
                    document
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

fn pipeline(repo: Arc<MemorySeriesRepository>) -> IngestionPipeline {
    IngestionPipeline::new(repo, IngestionConfig::default()).unwrap()
}

fn download_request(endpoint: String) -> DownloadRequest {
    DownloadRequest {
        endpoint,
        site_code: "08279500".to_string(),
        variable_code: "00060".to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        theme: None,
        policy: None,
    }
}

#[tokio::test]
async fn download_job_persists_fetched_series() {
    let endpoint = spawn_service("1.1", DOCUMENT_V1_1).await;
    let repo = Arc::new(MemorySeriesRepository::new());

    let outcome = pipeline(repo.clone())
        .run_download_job(download_request(endpoint), None)
        .await;

    assert!(outcome.is_completed());
    assert_eq!(outcome.total_values_saved(), 2);
    assert_eq!(outcome.reports[0].site_code, "08279500");

    let stored = repo.series_values("08279500", "00060");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].len(), 2);
    assert_eq!(stored[0][0].value, 1.5);
    assert!(repo.site_exists("08279500").await.unwrap());
    assert_eq!(repo.series_themes("08279500", "00060"), ["download"]);
}

#[tokio::test]
async fn empty_response_ends_as_no_data() {
    let endpoint = spawn_service("1.1", EMPTY_DOCUMENT).await;
    let repo = Arc::new(MemorySeriesRepository::new());

    let outcome = pipeline(repo.clone())
        .run_download_job(download_request(endpoint), None)
        .await;

    assert!(matches!(outcome.status, JobStatus::NoData));
    assert_eq!(repo.series_count(), 0);
}

#[tokio::test]
async fn unreachable_endpoint_fails_the_job() {
    // Nothing listens on this port.
    let repo = Arc::new(MemorySeriesRepository::new());
    let outcome = pipeline(repo)
        .run_download_job(download_request("http://127.0.0.1:1".to_string()), None)
        .await;

    assert!(matches!(
        outcome.status,
        JobStatus::Failed(HydroError::Fetch { .. })
    ));
}

#[tokio::test]
async fn cancelled_download_never_fetches() {
    let repo = Arc::new(MemorySeriesRepository::new());
    let token = CancellationToken::new();
    token.cancel();

    let outcome = pipeline(repo)
        .run_download_job(
            download_request("http://127.0.0.1:1".to_string()),
            Some(&token),
        )
        .await;

    assert!(matches!(outcome.status, JobStatus::Cancelled));
}

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("gauge_data")
        .suffix(".csv")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn import_settings(file: &tempfile::NamedTempFile) -> FileImportSettings {
    let mut settings = FileImportSettings::new(file.path(), "DateTime");
    settings.mappings.push(ColumnMapping::new(
        "flow",
        Site::new("S1", "Site One"),
        Variable::new("V1", "Discharge"),
    ));
    settings
}

#[tokio::test]
async fn file_job_imports_mapped_columns() {
    let file = write_csv(
        "DateTime,flow\n\
         2024-03-01 00:00:00,1.5\n\
         bad timestamp,9.9\n\
         2024-03-01 02:00:00,3.5\n",
    );
    let repo = Arc::new(MemorySeriesRepository::new());

    let outcome = pipeline(repo.clone())
        .run_file_job(import_settings(&file), None, None)
        .await;

    assert!(outcome.is_completed());
    assert_eq!(outcome.total_values_saved(), 2);

    let stored = repo.series_values("S1", "V1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].len(), 2);

    // Theme comes from the file stem.
    let themes = repo.series_themes("S1", "V1");
    assert_eq!(themes.len(), 1);
    assert!(themes[0].starts_with("gauge_data"));
}

#[tokio::test]
async fn file_job_honors_skip_for_existing_pairs() {
    let file = write_csv("DateTime,flow\n2024-03-01 00:00:00,9.0\n");
    let repo = Arc::new(MemorySeriesRepository::new());
    let pipeline = pipeline(repo.clone());

    // First import creates the pair even though the default policy is Skip:
    // policies only apply to pairs that already exist.
    let mut settings = import_settings(&file);
    settings.default_policy = OverwritePolicy::Skip;
    let first = pipeline.run_file_job(settings.clone(), None, None).await;
    assert_eq!(first.total_values_saved(), 1);

    let second = pipeline.run_file_job(settings, None, None).await;
    assert!(second.is_completed());
    assert_eq!(second.total_values_saved(), 0);
    assert_eq!(repo.series_values("S1", "V1").len(), 1);
}

/// Cancels a shared token once the file parse reports enough progress.
struct MidwayCancelSink {
    token: CancellationToken,
}

impl ProgressSink for MidwayCancelSink {
    fn report(&self, percent: u8, _message: &str) {
        if percent >= 50 {
            self.token.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_mid_file_persists_nothing() {
    let mut contents = String::from("DateTime,flow\n");
    for i in 0..400 {
        contents.push_str(&format!("2024-03-01 00:{:02}:00,{}.0\n", i % 60, i));
    }
    let file = write_csv(&contents);
    let repo = Arc::new(MemorySeriesRepository::new());

    let token = CancellationToken::new();
    let progress: Arc<dyn ProgressSink> = Arc::new(MidwayCancelSink {
        token: token.clone(),
    });

    let outcome = pipeline(repo.clone())
        .run_file_job(import_settings(&file), Some(progress), Some(token))
        .await;

    assert!(matches!(outcome.status, JobStatus::Cancelled));
    assert_eq!(repo.series_count(), 0);
    assert_eq!(repo.site_count(), 0);
}

#[tokio::test]
async fn pre_cancelled_file_job_imports_nothing() {
    let file = write_csv("DateTime,flow\n2024-03-01 00:00:00,1.0\n");
    let repo = Arc::new(MemorySeriesRepository::new());
    let token = CancellationToken::new();
    token.cancel();

    let outcome = pipeline(repo.clone())
        .run_file_job(import_settings(&file), None, Some(token))
        .await;

    assert!(matches!(outcome.status, JobStatus::Cancelled));
    assert_eq!(repo.series_count(), 0);
}
