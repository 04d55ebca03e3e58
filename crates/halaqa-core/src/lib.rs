//! # Halaqa Core
//!
//! Derived metric & filtered listing engine for the Halaqa admin panel
//! (academic calendars, attendance, finance, KPIs, strategic plans, tasks).
//!
//! The admin panel framework owns forms, routing and rendering. This crate
//! owns the one part with a semantic contract: turning stored records into
//! computed, filterable, sortable, paginated summary values.
//!
//! ```text
//! FilterSpec ──► filter::build ──► Predicate ─┐
//!                                              ├─► EntityStore::query ──► Page
//! ListRequest ──► projection::list ───────────┘          │
//!                                metric::evaluate ◄──────┘ (per row)
//! ```
//!
//! Every call is synchronous and request-scoped. Derived metrics are never
//! cached or persisted.

pub mod actions;
pub mod context;
pub mod display;
pub mod error;
pub mod filter;
pub mod formats;
pub mod metric;
pub mod period;
pub mod primitives;
pub mod profile;
pub mod projection;
pub mod store;
mod types;

pub use context::RequestContext;
pub use error::{Error, Result};
pub use types::*;
