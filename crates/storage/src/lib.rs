//! Persistence layer for observation series.
//!
//! The [`SeriesRepository`] trait is the single consistency boundary both
//! ingestion paths converge on. The PostgreSQL implementation is the
//! production store; the in-memory implementation mirrors its semantics
//! for tests and lightweight embedding.

pub mod memory;
pub mod policy;
pub mod postgres;
pub mod repository;

pub use memory::MemorySeriesRepository;
pub use postgres::PgSeriesRepository;
pub use repository::{SavedSeries, SeriesRepository};
