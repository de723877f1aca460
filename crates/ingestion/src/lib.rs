//! Observation ingestion pipeline.
//!
//! Coordinates the two ingestion paths: network download
//! (fetch → parse → persist) and delimited-file import
//! (parse → map → persist). Both converge on the series repository.

pub mod cache;
pub mod client;
pub mod config;
pub mod fetcher;
pub mod file_import;
pub mod pipeline;
pub mod progress;

pub use cache::ClientCache;
pub use client::WaterOneFlowClient;
pub use config::IngestionConfig;
pub use fetcher::{ObservationFetcher, RawDocument};
pub use file_import::{ColumnMapping, FileImportSettings};
pub use pipeline::{DownloadRequest, IngestionPipeline, JobOutcome, JobState, JobStatus, SeriesSaveReport};
pub use progress::{ProgressUpdate, WatchProgress};
