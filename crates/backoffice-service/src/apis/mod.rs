//! HTTP handlers for the backoffice API.
//!
//! Handlers resolve the caller from the `x-actor-id` header, call one engine
//! operation and translate its [`ServiceError`] into an [`APIError`].

pub mod customers;
pub mod orders;
pub mod records;
pub mod users;

use axum::{extract::FromRequestParts, http::request::Parts};
use backoffice_core::ServiceError;
use backoffice_types::{APIError, Actor};
use uuid::Uuid;

use crate::server::AppState;

/// Header carrying the acting user's id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The resolved caller of a request.
pub struct CurrentActor(pub Actor);

impl FromRequestParts<AppState> for CurrentActor {
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let header = parts
			.headers
			.get(ACTOR_HEADER)
			.and_then(|value| value.to_str().ok())
			.ok_or_else(|| APIError::Unauthorized {
				error_type: "MISSING_ACTOR".to_string(),
				message: format!("the {} header is required", ACTOR_HEADER),
			})?;
		let user_id = Uuid::parse_str(header.trim()).map_err(|_| APIError::Unauthorized {
			error_type: "INVALID_ACTOR".to_string(),
			message: format!("{} must be a user id", ACTOR_HEADER),
		})?;

		state
			.engine
			.resolve_actor(user_id)
			.await
			.map(CurrentActor)
			.map_err(to_api_error)
	}
}

/// Parses a record id from a path segment.
pub fn parse_id(id: &str) -> Result<Uuid, APIError> {
	Uuid::parse_str(id).map_err(|_| APIError::BadRequest {
		error_type: "INVALID_ID".to_string(),
		message: format!("'{}' is not a valid id", id),
	})
}

/// Maps an engine failure onto an HTTP error.
pub fn to_api_error(err: ServiceError) -> APIError {
	let message = err.to_string();
	match err {
		ServiceError::NotFound { .. } => APIError::NotFound {
			error_type: "NOT_FOUND".to_string(),
			message,
		},
		ServiceError::PermissionDenied(_) => APIError::Forbidden {
			error_type: "PERMISSION_DENIED".to_string(),
			message,
		},
		ServiceError::UnknownActor(_) => APIError::Unauthorized {
			error_type: "UNKNOWN_ACTOR".to_string(),
			message,
		},
		ServiceError::InvalidTransition { .. } => APIError::UnprocessableEntity {
			error_type: "INVALID_TRANSITION".to_string(),
			message,
		},
		ServiceError::EntityDeleted { .. } => APIError::UnprocessableEntity {
			error_type: "ENTITY_DELETED".to_string(),
			message,
		},
		ServiceError::NotDeleted { .. } => APIError::UnprocessableEntity {
			error_type: "NOT_DELETED".to_string(),
			message,
		},
		ServiceError::ConcurrentModification { .. } => APIError::Conflict {
			error_type: "CONCURRENT_MODIFICATION".to_string(),
			message,
		},
		ServiceError::Conflict(_) => APIError::Conflict {
			error_type: "CONFLICT".to_string(),
			message,
		},
		ServiceError::Validation(_) => APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
		},
		ServiceError::Storage(_) => {
			tracing::error!(error = %message, "Storage failure");
			APIError::InternalServerError {
				error_type: "INTERNAL_ERROR".to_string(),
				message: "internal storage error".to_string(),
			}
		},
	}
}
