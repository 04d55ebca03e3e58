//! # Halaqa Library
//!
//! Exposes the CLI command implementations for testing and integration.
//!
//! The binary drives these through the `main.rs` entry point.

pub mod cli;

// Re-export halaqa_core for convenience
pub use halaqa_core;
