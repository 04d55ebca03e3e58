//! # Formats Module
//!
//! Binary record format for persisted entities (version byte + postcard).
//!
//! Note: file I/O and JSON datasets live in the app layer (apps/halaqa).
//! This module only handles format conversion.

mod record;

pub use record::*;
