//! In-memory repository with the same policy semantics as the
//! PostgreSQL implementation. Backs unit tests and lightweight embedding.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use hydro_common::{DataValue, HydroResult, OverwritePolicy, Series, Site, Theme, Variable};

use crate::policy::{fill_values, normalize_values};
use crate::repository::{SavedSeries, SeriesRepository};

#[derive(Debug, Default)]
struct Store {
    sites: Vec<(i64, Site)>,
    variables: Vec<(i64, Variable)>,
    series: Vec<StoredSeries>,
    next_id: i64,
}

#[derive(Debug)]
struct StoredSeries {
    id: i64,
    site_code: String,
    variable_code: String,
    values: Vec<DataValue>,
    themes: Vec<String>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn primary_series_mut(
        &mut self,
        site_code: &str,
        variable_code: &str,
    ) -> Option<&mut StoredSeries> {
        self.series
            .iter_mut()
            .find(|s| s.site_code == site_code && s.variable_code == variable_code)
    }
}

/// Mutex-guarded in-memory store. The single lock trivially serializes
/// same-pair writes; it is held only for the duration of each operation.
#[derive(Debug, Default)]
pub struct MemorySeriesRepository {
    store: Mutex<Store>,
}

impl MemorySeriesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All persisted series for a pair, in creation order. Test helper.
    pub fn series_values(&self, site_code: &str, variable_code: &str) -> Vec<Vec<DataValue>> {
        let store = self.store.lock().unwrap();
        store
            .series
            .iter()
            .filter(|s| s.site_code == site_code && s.variable_code == variable_code)
            .map(|s| s.values.clone())
            .collect()
    }

    /// Themes attached to a series. Test helper.
    pub fn series_themes(&self, site_code: &str, variable_code: &str) -> Vec<String> {
        let store = self.store.lock().unwrap();
        store
            .series
            .iter()
            .filter(|s| s.site_code == site_code && s.variable_code == variable_code)
            .flat_map(|s| s.themes.iter().cloned())
            .collect()
    }

    pub fn series_count(&self) -> usize {
        self.store.lock().unwrap().series.len()
    }

    pub fn site_count(&self) -> usize {
        self.store.lock().unwrap().sites.len()
    }

    pub fn variable_count(&self) -> usize {
        self.store.lock().unwrap().variables.len()
    }
}

#[async_trait]
impl SeriesRepository for MemorySeriesRepository {
    async fn site_exists(&self, code: &str) -> HydroResult<bool> {
        let store = self.store.lock().unwrap();
        Ok(store.sites.iter().any(|(_, s)| s.code == code))
    }

    async fn add_site(&self, site: &Site) -> HydroResult<i64> {
        let mut store = self.store.lock().unwrap();
        if let Some((id, _)) = store.sites.iter().find(|(_, s)| s.code == site.code) {
            return Ok(*id);
        }
        let id = store.next_id();
        store.sites.push((id, site.clone()));
        Ok(id)
    }

    async fn variable_exists(&self, code: &str) -> HydroResult<bool> {
        let store = self.store.lock().unwrap();
        Ok(store.variables.iter().any(|(_, v)| v.code == code))
    }

    async fn insert_variable(&self, variable: &Variable) -> HydroResult<i64> {
        let mut store = self.store.lock().unwrap();
        if let Some((id, _)) = store
            .variables
            .iter()
            .find(|(_, v)| v.code == variable.code)
        {
            return Ok(*id);
        }
        let id = store.next_id();
        store.variables.push((id, variable.clone()));
        Ok(id)
    }

    async fn series_exists(&self, site_code: &str, variable_code: &str) -> HydroResult<bool> {
        let store = self.store.lock().unwrap();
        Ok(store
            .series
            .iter()
            .any(|s| s.site_code == site_code && s.variable_code == variable_code))
    }

    async fn save_series(
        &self,
        series: &Series,
        theme: &Theme,
        policy: OverwritePolicy,
    ) -> HydroResult<SavedSeries> {
        if series.values.is_empty() {
            return Ok(SavedSeries::skipped());
        }

        let mut store = self.store.lock().unwrap();

        // Resolve-or-create site and variable identities.
        if !store.sites.iter().any(|(_, s)| s.code == series.site.code) {
            let id = store.next_id();
            store.sites.push((id, series.site.clone()));
        }
        if !store
            .variables
            .iter()
            .any(|(_, v)| v.code == series.variable.code)
        {
            let id = store.next_id();
            store.variables.push((id, series.variable.clone()));
        }

        let incoming = normalize_values(&series.values);
        let site_code = series.site.code.clone();
        let variable_code = series.variable.code.clone();
        let theme_name = theme.name.clone();

        let has_existing = store
            .primary_series_mut(&site_code, &variable_code)
            .is_some();

        let saved = match (has_existing, policy) {
            (true, OverwritePolicy::Skip) => SavedSeries::skipped(),
            (true, OverwritePolicy::Fill) => {
                let existing = store
                    .primary_series_mut(&site_code, &variable_code)
                    .expect("existence checked above");
                let known: HashSet<_> = existing.values.iter().map(|v| v.timestamp).collect();
                let additions = fill_values(&known, &incoming);
                let count = additions.len();
                existing.values.extend(additions);
                existing.values.sort_by_key(|v| v.timestamp);
                if !existing.themes.contains(&theme_name) {
                    existing.themes.push(theme_name);
                }
                SavedSeries {
                    series_id: Some(existing.id),
                    values_saved: count,
                }
            }
            (true, OverwritePolicy::Overwrite) => {
                let existing = store
                    .primary_series_mut(&site_code, &variable_code)
                    .expect("existence checked above");
                let count = incoming.len();
                existing.values = incoming;
                if !existing.themes.contains(&theme_name) {
                    existing.themes.push(theme_name);
                }
                SavedSeries {
                    series_id: Some(existing.id),
                    values_saved: count,
                }
            }
            // No collision, or an explicit request for an independent copy:
            // a new series row either way.
            (false, _) | (true, OverwritePolicy::Copy) => {
                let id = store.next_id();
                let count = incoming.len();
                store.series.push(StoredSeries {
                    id,
                    site_code,
                    variable_code,
                    values: incoming,
                    themes: vec![theme_name],
                });
                SavedSeries {
                    series_id: Some(id),
                    values_saved: count,
                }
            }
        };

        debug!(
            site = %series.site.code,
            variable = %series.variable.code,
            policy = %policy,
            saved = saved.values_saved,
            "Saved series"
        );

        Ok(saved)
    }
}
