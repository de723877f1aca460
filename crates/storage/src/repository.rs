//! The repository trait both ingestion paths persist through.

use async_trait::async_trait;

use hydro_common::{HydroResult, OverwritePolicy, Series, Site, Theme, Variable};

/// Result of saving one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSeries {
    /// Stable identity of the series row written to, when one was written.
    /// `None` for a `Skip` save or an empty incoming series.
    pub series_id: Option<i64>,
    /// Number of data values actually persisted.
    pub values_saved: usize,
}

impl SavedSeries {
    pub fn skipped() -> Self {
        Self {
            series_id: None,
            values_saved: 0,
        }
    }
}

/// Persistence boundary for sites, variables, and series.
///
/// Implementations must serialize writes for the same (site, variable)
/// pair; writes for different pairs may proceed concurrently. Policy
/// application for one series is atomic: either the full policy-resolved
/// write lands or nothing does.
#[async_trait]
pub trait SeriesRepository: Send + Sync {
    /// Whether a site with this code exists. Codes are never duplicated;
    /// callers check before insert, and implementations keep the
    /// check-then-act idempotent under repetition.
    async fn site_exists(&self, code: &str) -> HydroResult<bool>;

    /// Insert a site, returning its identity. Inserting an existing code
    /// returns the existing identity unchanged.
    async fn add_site(&self, site: &Site) -> HydroResult<i64>;

    async fn variable_exists(&self, code: &str) -> HydroResult<bool>;

    /// Insert a variable, returning its identity. Same idempotence rule
    /// as [`SeriesRepository::add_site`].
    async fn insert_variable(&self, variable: &Variable) -> HydroResult<i64>;

    /// Whether any series exists for the (site, variable) pair.
    async fn series_exists(&self, site_code: &str, variable_code: &str) -> HydroResult<bool>;

    /// Persist a series under the given overwrite policy, attaching the
    /// theme. Saving a series with no values is a no-op returning a zero
    /// count; it never creates an empty series row.
    async fn save_series(
        &self,
        series: &Series,
        theme: &Theme,
        policy: OverwritePolicy,
    ) -> HydroResult<SavedSeries>;
}
