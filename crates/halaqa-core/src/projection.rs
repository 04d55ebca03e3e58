//! # List Projection
//!
//! Filtered, sorted, paginated listing of one entity kind, with optional
//! derived metrics and display colours per row.
//!
//! The store sorts and slices. Sorting by a derived metric reorders the
//! materialized page only; it never evaluates metrics for rows outside it.

use crate::context::RequestContext;
use crate::display::{self, Color};
use crate::error::Result;
use crate::filter::{self, FilterSpec};
use crate::metric::{self, MetricSpec};
use crate::primitives::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::profile::ResourceProfile;
use crate::store::{Direction, EntityStore, Query, SortKey};
use crate::{Entity, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// =============================================================================
// REQUEST
// =============================================================================

/// One list call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(default)]
    pub filters: FilterSpec,
    /// Stored field or metric name. `None` uses the profile default.
    #[serde(default)]
    pub sort: Option<SortKey>,
    /// 1-based. 0 is read as 1.
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub per_page: Option<usize>,
    /// Metric names to evaluate for every row.
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl ListRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filtered(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn sorted(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.page = page;
        self.per_page = Some(per_page);
        self
    }

    #[must_use]
    pub fn metric(mut self, name: impl Into<String>) -> Self {
        self.metrics.push(name.into());
        self
    }
}

// =============================================================================
// PAGE
// =============================================================================

/// A listed entity with its derived values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub entity: Entity,
    #[serde(default)]
    pub derived_metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub colors: BTreeMap<String, Color>,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<Row>,
    pub total_count: usize,
    pub page: usize,
    pub per_page: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    /// Render as a plain-text table.
    ///
    /// `columns` are stored fields shown after the id; derived metrics follow,
    /// formatted according to the profile's metric kinds.
    #[must_use]
    pub fn to_text(&self, profile: &ResourceProfile, columns: &[String]) -> String {
        let metric_names: Vec<&String> = self
            .items
            .first()
            .map(|row| row.derived_metrics.keys().collect())
            .unwrap_or_default();

        let mut header = vec!["id".to_string()];
        header.extend(columns.iter().cloned());
        header.extend(metric_names.iter().map(|name| (*name).clone()));

        let mut lines = vec![header.join(" | ")];
        if self.items.is_empty() {
            lines.push("(no rows)".to_string());
        }
        for row in &self.items {
            let mut cells = vec![row.entity.id.to_string()];
            for column in columns {
                let value = row.entity.value(column).unwrap_or(FieldValue::Null);
                cells.push(display::render_value(&value));
            }
            for name in &metric_names {
                let value = row.derived_metrics.get(*name).copied().unwrap_or_default();
                let cell = match profile.metrics.get(*name) {
                    Some(spec) => display::render_metric(spec, value),
                    None => display::format_amount(value),
                };
                cells.push(cell);
            }
            lines.push(cells.join(" | "));
        }

        let mut footer = format!(
            "page {} ({} per page), {} total",
            self.page, self.per_page, self.total_count
        );
        if self.has_previous {
            footer.push_str(", has previous");
        }
        if self.has_next {
            footer.push_str(", has next");
        }
        lines.push(footer);

        let mut output = lines.join("\n");
        output.push('\n');
        output
    }
}

// =============================================================================
// LIST
// =============================================================================

/// Effective page size: request, then profile, then the default, clamped.
#[must_use]
pub fn effective_per_page(profile: &ResourceProfile, requested: Option<usize>) -> usize {
    requested
        .or(profile.per_page)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}

/// List one page of `profile.kind`.
///
/// Fails with `UnknownMetric` before touching the store when a requested (or
/// sorted-by) metric is not defined on the profile.
pub fn list<S: EntityStore + ?Sized>(
    store: &S,
    profile: &ResourceProfile,
    request: &ListRequest,
    ctx: &RequestContext,
) -> Result<Page> {
    let requested = request.sort.clone();
    let metric_sort = requested.filter(|sort| profile.metrics.contains_key(&sort.field));

    let mut wanted: Vec<(&str, &MetricSpec)> = Vec::with_capacity(request.metrics.len());
    for name in &request.metrics {
        wanted.push((name.as_str(), profile.metric_spec(name)?));
    }
    if let Some(sort) = &metric_sort {
        if !wanted.iter().any(|(name, _)| *name == sort.field) {
            wanted.push((sort.field.as_str(), profile.metric_spec(&sort.field)?));
        }
    }

    let store_sort = match &request.sort {
        Some(sort) if metric_sort.is_none() => sort.clone(),
        _ => profile
            .default_sort
            .clone()
            .unwrap_or_else(SortKey::newest_first),
    };

    let page = request.page.max(1);
    let per_page = effective_per_page(profile, request.per_page);
    let offset = (page - 1).saturating_mul(per_page);

    let predicate = filter::build(&profile.filters, &request.filters, ctx);
    let query = Query::all(profile.kind.clone(), predicate)
        .sorted(store_sort)
        .page(offset, per_page);
    let result = store.query(&query)?;

    debug!(
        kind = %profile.kind,
        page,
        per_page,
        total = result.total,
        returned = result.items.len(),
        "list"
    );

    let mut items = Vec::with_capacity(result.items.len());
    for entity in result.items {
        let mut derived_metrics = BTreeMap::new();
        for (name, spec) in &wanted {
            let value = metric::evaluate(store, &entity, spec, ctx)?;
            derived_metrics.insert((*name).to_string(), value);
        }
        let colors = row_colors(profile, &entity, &derived_metrics);
        items.push(Row {
            entity,
            derived_metrics,
            colors,
        });
    }

    if let Some(sort) = &metric_sort {
        items.sort_by(|a, b| {
            let left = a.derived_metrics.get(&sort.field).copied().unwrap_or_default();
            let right = b.derived_metrics.get(&sort.field).copied().unwrap_or_default();
            let ordering = match sort.direction {
                Direction::Asc => left.total_cmp(&right),
                Direction::Desc => right.total_cmp(&left),
            };
            ordering.then_with(|| a.entity.id.cmp(&b.entity.id))
        });
    }

    let shown = offset.saturating_add(items.len());
    Ok(Page {
        has_next: shown < result.total,
        has_previous: page > 1,
        total_count: result.total,
        page,
        per_page,
        items,
    })
}

fn row_colors(
    profile: &ResourceProfile,
    entity: &Entity,
    derived: &BTreeMap<String, f64>,
) -> BTreeMap<String, Color> {
    let mut colors = BTreeMap::new();
    if let Some(field) = &profile.status_field {
        if let Some(status) = entity.field(field).and_then(FieldValue::as_text) {
            colors.insert(field.clone(), profile.status_palette.color_for(status));
        }
    }
    for (name, value) in derived {
        if let Some(bands) = profile.bands.get(name) {
            colors.insert(name.clone(), bands.color_for(*value));
        }
    }
    colors
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{StatusPalette, ThresholdBands};
    use crate::filter::FilterDef;
    use crate::metric::MetricSpec;
    use crate::store::MemoryStore;
    use crate::{Error, EntityId};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0)
            .single()
            .unwrap_or_default()
    }

    fn ctx() -> RequestContext {
        RequestContext::at(base() + Duration::days(100))
    }

    fn tasks(n: u64) -> MemoryStore {
        let rows = (1..=n).map(|i| {
            let status = if i % 2 == 0 { "done" } else { "open" };
            Entity::new(EntityId(i), "task", base() + Duration::hours(i as i64))
                .with("title", format!("Task {i}"))
                .with("status", status)
        });
        MemoryStore::from_entities(rows).expect("seed store")
    }

    #[test]
    fn pages_through_twenty_five_rows() {
        let store = tasks(25);
        let profile = ResourceProfile::new("task");

        let first = list(&store, &profile, &ListRequest::new().page(1, 10), &ctx());
        let first = first.expect("first page");
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_count, 25);
        assert!(first.has_next);
        assert!(!first.has_previous);

        let third = list(&store, &profile, &ListRequest::new().page(3, 10), &ctx());
        let third = third.expect("third page");
        assert_eq!(third.items.len(), 5);
        assert!(!third.has_next);
        assert!(third.has_previous);
    }

    #[test]
    fn default_sort_is_newest_first() {
        let store = tasks(3);
        let page = list(&store, &ResourceProfile::new("task"), &ListRequest::new(), &ctx());
        let ids: Vec<u64> = page
            .map(|p| p.items.iter().map(|r| r.entity.id.0).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn profile_default_sort_applies() {
        let store = tasks(3);
        let profile = ResourceProfile::new("task").sorted_by(SortKey::asc("title"));
        let page = list(&store, &profile, &ListRequest::new(), &ctx());
        let ids: Vec<u64> = page
            .map(|p| p.items.iter().map(|r| r.entity.id.0).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn page_zero_and_oversized_pages_are_normalized() {
        let store = tasks(3);
        let profile = ResourceProfile::new("task");
        let page = list(&store, &profile, &ListRequest::new().page(0, 10_000), &ctx());
        assert_eq!(page.as_ref().map(|p| p.page).ok(), Some(1));
        assert_eq!(page.map(|p| p.per_page).ok(), Some(MAX_PAGE_SIZE));
        assert_eq!(effective_per_page(&profile.clone().per_page(0), None), 1);
        assert_eq!(effective_per_page(&profile, None), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn page_past_end_is_empty() {
        let store = tasks(3);
        let page = list(
            &store,
            &ResourceProfile::new("task"),
            &ListRequest::new().page(5, 10),
            &ctx(),
        );
        let page = page.expect("page past end");
        assert!(page.items.is_empty());
        assert!(!page.has_next);
        assert_eq!(page.total_count, 3);
    }

    #[test]
    fn unknown_metric_fails_whole_request() {
        let store = tasks(3);
        let page = list(
            &store,
            &ResourceProfile::new("task"),
            &ListRequest::new().metric("score"),
            &ctx(),
        );
        assert!(matches!(page, Err(Error::UnknownMetric(name)) if name == "score"));
    }

    fn circles_with_students() -> MemoryStore {
        let mut rows = Vec::new();
        for (id, name) in [(1, "Al-Fajr"), (2, "An-Nur"), (3, "Ar-Rahma")] {
            rows.push(Entity::new(EntityId(id), "circle", base()).with("name", name));
        }
        // circle 1: 1 student, circle 2: 3 students, circle 3: 2 students
        let mut next = 10;
        for (circle, count) in [(1, 1), (2, 3), (3, 2)] {
            for _ in 0..count {
                rows.push(
                    Entity::new(EntityId(next), "student", base())
                        .with("circle_id", EntityId(circle))
                        .with("is_active", true),
                );
                next += 1;
            }
        }
        MemoryStore::from_entities(rows).expect("seed store")
    }

    fn circle_profile() -> ResourceProfile {
        ResourceProfile::new("circle")
            .sorted_by(SortKey::asc("name"))
            .metric(
                "students",
                MetricSpec::RelatedCount {
                    child_kind: "student".to_string(),
                    parent_field: "circle_id".to_string(),
                    only: None,
                },
            )
            .banded(
                "students",
                ThresholdBands::new(Color::Danger).band(2.0, Color::Success),
            )
            .filter(FilterDef::Search {
                key: "q".to_string(),
                fields: vec!["name".to_string()],
            })
    }

    #[test]
    fn metrics_and_bands_annotate_rows() {
        let store = circles_with_students();
        let page = list(
            &store,
            &circle_profile(),
            &ListRequest::new().metric("students"),
            &ctx(),
        );
        let page = page.expect("circle listing");
        let counts: Vec<f64> = page
            .items
            .iter()
            .filter_map(|r| r.derived_metrics.get("students").copied())
            .collect();
        assert_eq!(counts, vec![1.0, 3.0, 2.0]);
        let colors: Vec<Option<Color>> = page
            .items
            .iter()
            .map(|r| r.colors.get("students").copied())
            .collect();
        assert_eq!(
            colors,
            vec![Some(Color::Danger), Some(Color::Success), Some(Color::Success)]
        );
    }

    #[test]
    fn sorting_by_metric_reorders_the_page() {
        let store = circles_with_students();
        let request = ListRequest::new().sorted(SortKey::desc("students"));
        let page = list(&store, &circle_profile(), &request, &ctx());
        let ids: Vec<u64> = page
            .map(|p| p.items.iter().map(|r| r.entity.id.0).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn sorting_by_metric_stays_page_local() {
        let store = circles_with_students();
        // store order by name: 1, 2 | 3. Circle 3 outranks circle 1 but sits
        // on page 2, so page 1 is only reordered within itself.
        let request = ListRequest::new()
            .sorted(SortKey::desc("students"))
            .page(1, 2);
        let page = list(&store, &circle_profile(), &request, &ctx());
        let ids: Vec<u64> = page
            .map(|p| p.items.iter().map(|r| r.entity.id.0).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn filters_reduce_total() {
        let store = circles_with_students();
        let request = ListRequest::new().filtered(FilterSpec::new().with("q", "nur"));
        let page = list(&store, &circle_profile(), &request, &ctx());
        assert_eq!(page.map(|p| p.total_count).ok(), Some(1));
    }

    #[test]
    fn status_palette_colours_rows() {
        let store = tasks(2);
        let profile = ResourceProfile::new("task").status(
            "status",
            StatusPalette::new(Color::Gray).with("done", Color::Success),
        );
        let page = list(&store, &profile, &ListRequest::new(), &ctx());
        let colors: Vec<Option<Color>> = page
            .map(|p| p.items.iter().map(|r| r.colors.get("status").copied()).collect())
            .unwrap_or_default();
        assert_eq!(colors, vec![Some(Color::Success), Some(Color::Gray)]);
    }

    #[test]
    fn page_serializes_camel_case() {
        let store = tasks(1);
        let page = list(&store, &ResourceProfile::new("task"), &ListRequest::new(), &ctx());
        let json = page
            .ok()
            .and_then(|p| serde_json::to_string(&p).ok())
            .unwrap_or_default();
        assert!(json.contains("\"totalCount\":1"));
        assert!(json.contains("\"hasNext\":false"));
        assert!(json.contains("\"derivedMetrics\""));
    }

    #[test]
    fn text_rendering_formats_metrics() {
        let store = circles_with_students();
        let profile = circle_profile();
        let page = list(&store, &profile, &ListRequest::new().metric("students"), &ctx());
        let text = page
            .map(|p| p.to_text(&profile, &["name".to_string()]))
            .unwrap_or_default();
        assert!(text.starts_with("id | name | students"));
        assert!(text.contains("2 | An-Nur | 3"));
        assert!(text.contains("3 total"));
    }
}
