//! Error taxonomy shared by every backoffice operation.
//!
//! Each variant is distinguishable by callers; the HTTP layer maps them onto
//! status codes.

use backoffice_storage::StorageError;
use backoffice_types::{EntityKind, Operation, OrderStatus, Role};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
	/// The pair is not an edge of the order lifecycle, or asks for the
	/// status the order already has.
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	/// The record is soft-deleted and the operation needs a live record.
	#[error("{kind} {id} is deleted")]
	EntityDeleted { kind: EntityKind, id: Uuid },
	#[error("Permission denied: {0}")]
	PermissionDenied(String),
	/// Restore was requested for a record that is not deleted.
	#[error("{kind} {id} is not deleted")]
	NotDeleted { kind: EntityKind, id: Uuid },
	#[error("{kind} {id} not found")]
	NotFound { kind: EntityKind, id: Uuid },
	/// The record changed between read and write; nothing was written.
	#[error("{kind} {id} was modified concurrently")]
	ConcurrentModification { kind: EntityKind, id: Uuid },
	/// The acting user does not exist or is deleted.
	#[error("Unknown actor: {0}")]
	UnknownActor(Uuid),
	#[error("Validation error: {0}")]
	Validation(String),
	/// A uniqueness constraint, such as a user email, is already taken.
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl ServiceError {
	pub(crate) fn denied(role: Role, kind: EntityKind, operation: Operation) -> Self {
		ServiceError::PermissionDenied(format!(
			"role {} may not {} {} records",
			role, operation, kind
		))
	}

	pub(crate) fn transition_denied(role: Role, from: OrderStatus, to: OrderStatus) -> Self {
		ServiceError::PermissionDenied(format!(
			"role {} may not move orders from {} to {}",
			role, from, to
		))
	}
}

impl From<StorageError> for ServiceError {
	fn from(err: StorageError) -> Self {
		ServiceError::Storage(err.to_string())
	}
}
