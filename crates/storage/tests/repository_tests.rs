//! Overwrite-policy semantics, exercised against the in-memory repository.

use chrono::{NaiveDate, NaiveDateTime};

use hydro_common::{DataValue, OverwritePolicy, Series, Site, Theme, Variable};
use storage::{MemorySeriesRepository, SeriesRepository};

fn ts(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn series_with(values: &[(f64, u32)]) -> Series {
    let mut series = Series::new(
        Site::new("08279500", "Rio Grande at Embudo"),
        Variable::new("00060", "Discharge"),
    );
    for (value, hour) in values {
        series.push_value(DataValue::new(*value, ts(*hour)));
    }
    series
}

fn theme() -> Theme {
    Theme::new("test-import")
}

/// Seed the store with {t1, t2}, then save {t2, t3} under `policy`.
async fn seeded_save(policy: OverwritePolicy) -> (MemorySeriesRepository, usize) {
    let repo = MemorySeriesRepository::new();
    repo.save_series(&series_with(&[(1.0, 1), (2.0, 2)]), &theme(), OverwritePolicy::Overwrite)
        .await
        .unwrap();

    let saved = repo
        .save_series(&series_with(&[(20.0, 2), (30.0, 3)]), &theme(), policy)
        .await
        .unwrap();
    (repo, saved.values_saved)
}

#[tokio::test]
async fn append_keeps_existing_values_at_shared_timestamps() {
    let (repo, saved) = seeded_save(OverwritePolicy::Fill).await;
    assert_eq!(saved, 1);

    let stored = repo.series_values("08279500", "00060");
    assert_eq!(stored.len(), 1);

    let values = &stored[0];
    assert_eq!(values.len(), 3);
    assert_eq!(values[0].timestamp, ts(1));
    // t2 keeps its original value.
    assert_eq!(values[1].value, 2.0);
    assert_eq!(values[2].value, 30.0);
}

#[tokio::test]
async fn overwrite_replaces_the_stored_body() {
    let (repo, saved) = seeded_save(OverwritePolicy::Overwrite).await;
    assert_eq!(saved, 2);

    let stored = repo.series_values("08279500", "00060");
    assert_eq!(stored.len(), 1);

    let timestamps: Vec<_> = stored[0].iter().map(|v| v.timestamp).collect();
    assert_eq!(timestamps, [ts(2), ts(3)]);
    assert_eq!(stored[0][0].value, 20.0);
}

#[tokio::test]
async fn skip_leaves_existing_series_untouched() {
    let (repo, saved) = seeded_save(OverwritePolicy::Skip).await;
    assert_eq!(saved, 0);

    let stored = repo.series_values("08279500", "00060");
    assert_eq!(stored.len(), 1);
    let timestamps: Vec<_> = stored[0].iter().map(|v| v.timestamp).collect();
    assert_eq!(timestamps, [ts(1), ts(2)]);
}

#[tokio::test]
async fn copy_persists_both_series() {
    let (repo, saved) = seeded_save(OverwritePolicy::Copy).await;
    assert_eq!(saved, 2);

    let stored = repo.series_values("08279500", "00060");
    assert_eq!(stored.len(), 2);

    let first: Vec<_> = stored[0].iter().map(|v| v.timestamp).collect();
    let second: Vec<_> = stored[1].iter().map(|v| v.timestamp).collect();
    assert_eq!(first, [ts(1), ts(2)]);
    assert_eq!(second, [ts(2), ts(3)]);
}

#[tokio::test]
async fn empty_series_save_is_a_no_op() {
    let repo = MemorySeriesRepository::new();
    let saved = repo
        .save_series(&series_with(&[]), &theme(), OverwritePolicy::Overwrite)
        .await
        .unwrap();

    assert_eq!(saved.values_saved, 0);
    assert_eq!(saved.series_id, None);
    assert_eq!(repo.series_count(), 0);
    assert_eq!(repo.site_count(), 0);
}

#[tokio::test]
async fn duplicate_incoming_timestamps_collapse_to_last_arrival() {
    let repo = MemorySeriesRepository::new();
    repo.save_series(
        &series_with(&[(1.0, 1), (99.0, 1), (2.0, 2)]),
        &theme(),
        OverwritePolicy::Overwrite,
    )
    .await
    .unwrap();

    let stored = repo.series_values("08279500", "00060");
    assert_eq!(stored[0].len(), 2);
    assert_eq!(stored[0][0].value, 99.0);
}

#[tokio::test]
async fn persisted_timestamps_are_non_decreasing() {
    let repo = MemorySeriesRepository::new();
    repo.save_series(
        &series_with(&[(3.0, 3), (1.0, 1), (2.0, 2)]),
        &theme(),
        OverwritePolicy::Overwrite,
    )
    .await
    .unwrap();

    let stored = repo.series_values("08279500", "00060");
    for pair in stored[0].windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test]
async fn concurrent_first_saves_land_in_one_series() {
    // Two writers race to create the pair's first series; the repository
    // must serialize them into a single primary row, not two.
    let repo = std::sync::Arc::new(MemorySeriesRepository::new());
    let a = repo.clone();
    let b = repo.clone();

    let (first, second) = tokio::join!(
        async move {
            a.save_series(
                &series_with(&[(1.0, 1), (2.0, 2)]),
                &theme(),
                OverwritePolicy::Overwrite,
            )
            .await
        },
        async move {
            b.save_series(
                &series_with(&[(2.0, 2), (3.0, 3)]),
                &theme(),
                OverwritePolicy::Overwrite,
            )
            .await
        },
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(repo.series_count(), 1);
    assert_eq!(repo.series_values("08279500", "00060").len(), 1);
}

#[tokio::test]
async fn site_and_variable_creation_is_idempotent() {
    let repo = MemorySeriesRepository::new();
    let site = Site::new("08279500", "Rio Grande at Embudo");
    let variable = Variable::new("00060", "Discharge");

    assert!(!repo.site_exists("08279500").await.unwrap());
    let first = repo.add_site(&site).await.unwrap();
    let second = repo.add_site(&site).await.unwrap();
    assert_eq!(first, second);
    assert!(repo.site_exists("08279500").await.unwrap());
    assert_eq!(repo.site_count(), 1);

    let first = repo.insert_variable(&variable).await.unwrap();
    let second = repo.insert_variable(&variable).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(repo.variable_count(), 1);
}

#[tokio::test]
async fn themes_attach_to_saved_series() {
    let repo = MemorySeriesRepository::new();
    repo.save_series(&series_with(&[(1.0, 1)]), &Theme::new("march-import"), OverwritePolicy::Overwrite)
        .await
        .unwrap();

    let themes = repo.series_themes("08279500", "00060");
    assert_eq!(themes, ["march-import"]);
}

#[tokio::test]
async fn series_exists_reflects_saves() {
    let repo = MemorySeriesRepository::new();
    assert!(!repo.series_exists("08279500", "00060").await.unwrap());

    repo.save_series(&series_with(&[(1.0, 1)]), &theme(), OverwritePolicy::Overwrite)
        .await
        .unwrap();

    assert!(repo.series_exists("08279500", "00060").await.unwrap());
}
