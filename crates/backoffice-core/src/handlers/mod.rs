//! Handlers for the operations on each record kind.
//!
//! Every handler consults the access policy before it reads or writes
//! anything, and writes through the [`RecordStore`](crate::store::RecordStore)
//! so each mutation lands together with its audit entry.

pub mod customer;
pub mod order;
pub mod records;
pub mod user;

pub use customer::CustomerHandler;
pub use order::OrderHandler;
pub use records::RecordHandler;
pub use user::UserHandler;

use crate::ServiceError;

/// Trims a required text field and rejects it if empty.
pub(crate) fn require_text(field: &str, value: &str) -> Result<String, ServiceError> {
	let value = value.trim();
	if value.is_empty() {
		return Err(ServiceError::Validation(format!("{} must not be empty", field)));
	}
	Ok(value.to_string())
}

/// Trims an optional text field; blank values become `None`.
pub(crate) fn clean_optional(value: Option<String>) -> Option<String> {
	value
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
}
