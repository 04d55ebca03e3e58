//! # Primitives
//!
//! Shared constants for listing and presentation.

/// Page size used when neither the request nor the profile sets one.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Upper bound on page size. Larger requests are clamped.
pub const MAX_PAGE_SIZE: usize = 500;

/// Decimal places for rendered percentages.
pub const PERCENT_DECIMALS: usize = 1;

/// Decimal places for rendered amounts.
pub const AMOUNT_DECIMALS: usize = 2;

/// Leading byte of every encoded entity record.
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Pseudo-field holding the entity identifier.
pub const FIELD_ID: &str = "id";

/// Pseudo-field holding the creation timestamp.
pub const FIELD_CREATED_AT: &str = "created_at";

/// Pseudo-field holding the last update timestamp.
pub const FIELD_UPDATED_AT: &str = "updated_at";

/// Field stamped from the request context on new drafts.
pub const FIELD_CREATED_BY: &str = "created_by";
