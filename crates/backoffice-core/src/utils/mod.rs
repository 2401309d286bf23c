//! Utility functions for the backoffice core.

pub mod formatting;

pub use formatting::truncate_id;
