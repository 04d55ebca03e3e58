//! The redb store and the memory store must produce identical listings.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use halaqa_core::display::{Color, ThresholdBands};
use halaqa_core::filter::{FilterDef, FilterSpec, RelativeWindow};
use halaqa_core::metric::{MetricSpec, PeriodFields};
use halaqa_core::period::WindowSpec;
use halaqa_core::profile::ResourceProfile;
use halaqa_core::projection::{self, ListRequest};
use halaqa_core::store::{EntityStore, MemoryStore, RedbStore, SortKey};
use halaqa_core::{Entity, EntityId, RequestContext};

fn ctx() -> RequestContext {
    RequestContext::at(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap())
}

fn dataset() -> Vec<Entity> {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut rows = Vec::new();
    for k in 1..=12u64 {
        rows.push(
            Entity::new(EntityId(k), "kpi", start + Duration::days(k as i64))
                .with("name", format!("Indicator {k:02}"))
                .with("due", NaiveDate::from_ymd_opt(2026, 10, (k % 28 + 1) as u32).unwrap()),
        );
    }
    let mut next = 100;
    for k in 1..=12u64 {
        for month in 1..=3u32 {
            let period_start = NaiveDate::from_ymd_opt(2026, month, 1).unwrap();
            let period_end = NaiveDate::from_ymd_opt(2026, month, 28).unwrap();
            rows.push(
                Entity::new(EntityId(next), "kpi_value", start)
                    .with("kpi_id", EntityId(k))
                    .with("actual", (k * 10 + u64::from(month)) as f64)
                    .with("target", 100.0)
                    .with("period_start", period_start)
                    .with("period_end", period_end),
            );
            next += 1;
        }
    }
    rows
}

fn profile() -> ResourceProfile {
    ResourceProfile::new("kpi")
        .filter(FilterDef::Toggle {
            key: "this_month".into(),
            field: "due".into(),
            window: RelativeWindow::ThisMonth,
        })
        .filter(FilterDef::Search {
            key: "q".into(),
            fields: vec!["name".into()],
        })
        .metric(
            "achievement",
            MetricSpec::Achievement {
                child_kind: "kpi_value".into(),
                parent_field: "kpi_id".into(),
                actual_field: "actual".into(),
                target_field: "target".into(),
                period: PeriodFields::Range {
                    start: "period_start".into(),
                    end: "period_end".into(),
                },
                window: WindowSpec::CurrentYear,
            },
        )
        .banded(
            "achievement",
            ThresholdBands::new(Color::Danger)
                .band(70.0, Color::Warning)
                .band(100.0, Color::Success),
        )
}

#[test]
fn redb_and_memory_list_identically() {
    let memory = MemoryStore::from_entities(dataset()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut redb = RedbStore::create(dir.path().join("parity.redb")).unwrap();
    redb.insert_all(dataset()).unwrap();

    let requests = [
        ListRequest::new().page(1, 5),
        ListRequest::new().page(3, 5),
        ListRequest::new()
            .sorted(SortKey::asc("name"))
            .metric("achievement")
            .page(2, 4),
        ListRequest::new()
            .sorted(SortKey::desc("achievement"))
            .page(1, 6),
        ListRequest::new().filtered(
            FilterSpec::new()
                .with("this_month", true)
                .with("q", "indicator 1"),
        ),
    ];

    for request in &requests {
        let left = projection::list(&memory, &profile(), request, &ctx()).unwrap();
        let right = projection::list(&redb, &profile(), request, &ctx()).unwrap();
        assert_eq!(left, right, "request {request:?}");
    }
}

#[test]
fn achievement_listing_matches_expected_bands() {
    let memory = MemoryStore::from_entities(dataset()).unwrap();
    let request = ListRequest::new()
        .sorted(SortKey::asc("name"))
        .metric("achievement");
    let page = projection::list(&memory, &profile(), &request, &ctx()).unwrap();

    assert_eq!(page.total_count, 12);
    // Indicator 01: actuals 11, 12, 13 against 100 each.
    let first = &page.items[0];
    assert_eq!(first.derived_metrics.get("achievement").copied(), Some(12.0));
    assert_eq!(first.colors.get("achievement"), Some(&Color::Danger));
    // Indicator 10: actuals 101, 102, 103.
    let tenth = &page.items[9];
    assert_eq!(tenth.derived_metrics.get("achievement").copied(), Some(102.0));
    assert_eq!(tenth.colors.get("achievement"), Some(&Color::Success));
}
