//! # Display Module
//!
//! Presentation mappings for listed rows:
//! - Status value -> colour lookup tables
//! - Threshold bands for percentage metrics
//! - Fixed-precision formatting
//!
//! Colours are data, configured per resource. Nothing here feeds back into
//! stored or derived values.

use crate::FieldValue;
use crate::filter::DATE_FORMAT;
use crate::metric::MetricSpec;
use crate::primitives::{AMOUNT_DECIMALS, PERCENT_DECIMALS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Badge / cell colour understood by the admin UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    #[default]
    Gray,
    Info,
    Primary,
    Success,
    Warning,
    Danger,
}

// =============================================================================
// STATUS PALETTE
// =============================================================================

/// Lookup table from a status string to its colour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPalette {
    #[serde(default)]
    pub colors: BTreeMap<String, Color>,
    /// Colour for statuses missing from the table.
    #[serde(default)]
    pub fallback: Color,
}

impl StatusPalette {
    #[must_use]
    pub fn new(fallback: Color) -> Self {
        Self {
            colors: BTreeMap::new(),
            fallback,
        }
    }

    #[must_use]
    pub fn with(mut self, status: impl Into<String>, color: Color) -> Self {
        self.colors.insert(status.into(), color);
        self
    }

    #[must_use]
    pub fn color_for(&self, status: &str) -> Color {
        self.colors.get(status).copied().unwrap_or(self.fallback)
    }
}

// =============================================================================
// THRESHOLD BANDS
// =============================================================================

/// A lower bound and the colour applied at or above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub color: Color,
}

/// Ordered percentage bands. The highest band whose `min` is reached wins;
/// below every band the `floor` colour applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBands {
    #[serde(default)]
    pub bands: Vec<Band>,
    #[serde(default)]
    pub floor: Color,
}

impl ThresholdBands {
    #[must_use]
    pub fn new(floor: Color) -> Self {
        Self {
            bands: Vec::new(),
            floor,
        }
    }

    #[must_use]
    pub fn band(mut self, min: f64, color: Color) -> Self {
        self.bands.push(Band { min, color });
        self
    }

    #[must_use]
    pub fn color_for(&self, value: f64) -> Color {
        self.bands
            .iter()
            .filter(|band| value >= band.min)
            .max_by(|a, b| a.min.total_cmp(&b.min))
            .map(|band| band.color)
            .unwrap_or(self.floor)
    }
}

// =============================================================================
// FORMATTING
// =============================================================================

/// Render a percentage with one decimal, e.g. `"80.0%"`.
#[must_use]
pub fn format_percent(value: f64) -> String {
    format!("{:.*}%", PERCENT_DECIMALS, value)
}

/// Render an amount with two decimals.
#[must_use]
pub fn format_amount(value: f64) -> String {
    format!("{:.*}", AMOUNT_DECIMALS, value)
}

/// Render a derived metric the way its kind is read: percentages, amounts
/// or whole counts.
#[must_use]
pub fn render_metric(spec: &MetricSpec, value: f64) -> String {
    match spec {
        MetricSpec::Achievement { .. } => format_percent(value),
        MetricSpec::Remaining { .. } | MetricSpec::RelatedSum { .. } => format_amount(value),
        MetricSpec::RelatedCount { .. } => format!("{value:.0}"),
    }
}

/// Render a stored field value for a text cell.
#[must_use]
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        FieldValue::Timestamp(t) => t.format("%Y-%m-%d %H:%M").to_string(),
        FieldValue::Bool(true) => "yes".to_string(),
        FieldValue::Bool(false) => "no".to_string(),
        FieldValue::Ref(id) => format!("#{id}"),
        FieldValue::Null => "-".to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_falls_back_for_unknown_status() {
        let palette = StatusPalette::new(Color::Gray)
            .with("completed", Color::Success)
            .with("overdue", Color::Danger);
        assert_eq!(palette.color_for("completed"), Color::Success);
        assert_eq!(palette.color_for("archived"), Color::Gray);
    }

    #[test]
    fn bands_pick_highest_reached_threshold() {
        let bands = ThresholdBands::new(Color::Danger)
            .band(100.0, Color::Success)
            .band(70.0, Color::Warning);
        assert_eq!(bands.color_for(100.0), Color::Success);
        assert_eq!(bands.color_for(85.2), Color::Warning);
        assert_eq!(bands.color_for(69.9), Color::Danger);
        assert_eq!(ThresholdBands::default().color_for(50.0), Color::Gray);
    }

    #[test]
    fn formatting_rounds_only_for_display() {
        assert_eq!(format_percent(100.0), "100.0%");
        assert_eq!(format_percent(66.666_666), "66.7%");
        assert_eq!(format_amount(650.0), "650.00");
    }

    #[test]
    fn cells_render_per_type() {
        assert_eq!(render_value(&FieldValue::Ref(crate::EntityId(4))), "#4");
        assert_eq!(render_value(&FieldValue::Bool(false)), "no");
        assert_eq!(render_value(&FieldValue::Null), "-");
    }
}
