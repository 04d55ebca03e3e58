//! # Resource Profiles
//!
//! Per-entity-type listing configuration: accepted filters, named metrics,
//! default ordering, page size, status palette, threshold bands and the
//! navigation badge filter.
//!
//! Profiles are plain data loaded by the app layer. Thresholds and palettes
//! are never shared between entity types.

use crate::display::{StatusPalette, ThresholdBands};
use crate::error::{Error, Result};
use crate::filter::{FilterDef, FilterSpec};
use crate::metric::MetricSpec;
use crate::store::SortKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Listing configuration for one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub kind: String,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricSpec>,
    /// Ordering when the request names none. Falls back to newest first.
    #[serde(default)]
    pub default_sort: Option<SortKey>,
    #[serde(default)]
    pub per_page: Option<usize>,
    /// Field whose value is looked up in `status_palette`.
    #[serde(default)]
    pub status_field: Option<String>,
    #[serde(default)]
    pub status_palette: StatusPalette,
    /// Colour bands keyed by metric name.
    #[serde(default)]
    pub bands: BTreeMap<String, ThresholdBands>,
    /// Filter applied when counting the navigation badge.
    #[serde(default)]
    pub badge: FilterSpec,
}

impl ResourceProfile {
    /// Profile with no filters, metrics or colours.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
            metrics: BTreeMap::new(),
            default_sort: None,
            per_page: None,
            status_field: None,
            status_palette: StatusPalette::default(),
            bands: BTreeMap::new(),
            badge: FilterSpec::default(),
        }
    }

    #[must_use]
    pub fn filter(mut self, def: FilterDef) -> Self {
        self.filters.push(def);
        self
    }

    #[must_use]
    pub fn metric(mut self, name: impl Into<String>, spec: MetricSpec) -> Self {
        self.metrics.insert(name.into(), spec);
        self
    }

    #[must_use]
    pub fn sorted_by(mut self, sort: SortKey) -> Self {
        self.default_sort = Some(sort);
        self
    }

    #[must_use]
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    #[must_use]
    pub fn status(mut self, field: impl Into<String>, palette: StatusPalette) -> Self {
        self.status_field = Some(field.into());
        self.status_palette = palette;
        self
    }

    #[must_use]
    pub fn banded(mut self, metric: impl Into<String>, bands: ThresholdBands) -> Self {
        self.bands.insert(metric.into(), bands);
        self
    }

    #[must_use]
    pub fn badge(mut self, filters: FilterSpec) -> Self {
        self.badge = filters;
        self
    }

    /// Metric spec by name.
    pub fn metric_spec(&self, name: &str) -> Result<&MetricSpec> {
        self.metrics
            .get(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))
    }
}

/// Profiles keyed by entity kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ResourceProfile>,
}

impl ProfileRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile, replacing any previous one for the same kind.
    pub fn register(&mut self, profile: ResourceProfile) {
        self.profiles.insert(profile.kind.clone(), profile);
    }

    pub fn get(&self, kind: &str) -> Result<&ResourceProfile> {
        self.profiles
            .get(kind)
            .ok_or_else(|| Error::UnknownProfile(kind.to_string()))
    }

    /// Registered profile, or a bare one for unconfigured kinds.
    #[must_use]
    pub fn get_or_bare(&self, kind: &str) -> ResourceProfile {
        self.profiles
            .get(kind)
            .cloned()
            .unwrap_or_else(|| ResourceProfile::new(kind))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<ResourceProfile> for ProfileRegistry {
    fn from_iter<I: IntoIterator<Item = ResourceProfile>>(iter: I) -> Self {
        let mut registry = Self::new();
        for profile in iter {
            registry.register(profile);
        }
        registry
    }
}
