//! Row actions exposed next to listings: boolean toggles and navigation
//! badge counts.

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::filter::{self, FilterSpec};
use crate::profile::ResourceProfile;
use crate::store::EntityStore;
use crate::{Entity, EntityId, FieldValue};
use tracing::debug;

/// Flip a boolean field and persist it, stamping `updated_at` from `ctx`.
///
/// A missing field reads as `false`. Concurrent toggles are last writer wins.
pub fn toggle_flag<S: EntityStore + ?Sized>(
    store: &mut S,
    id: EntityId,
    field: &str,
    ctx: &RequestContext,
) -> Result<Entity> {
    let entity = store.find_by_id(id)?.ok_or(Error::NotFound(id))?;
    let current = match entity.field(field) {
        None => false,
        Some(value) if value.is_null() => false,
        Some(value) => value.as_bool().ok_or_else(|| Error::FieldType {
            id,
            field: field.to_string(),
            expected: "bool",
        })?,
    };
    debug!(%id, field, to = !current, "toggle");
    store.update_field(id, field, FieldValue::Bool(!current), ctx.now)
}

/// Number of `profile.kind` entities matching `filters`.
///
/// An empty `filters` falls back to the profile's badge filter.
pub fn badge_count<S: EntityStore + ?Sized>(
    store: &S,
    profile: &ResourceProfile,
    filters: &FilterSpec,
    ctx: &RequestContext,
) -> Result<usize> {
    let spec = if filters.is_empty() {
        &profile.badge
    } else {
        filters
    };
    let predicate = filter::build(&profile.filters, spec, ctx);
    Ok(store.aggregate(&profile.kind, &predicate, None)?.count)
}
