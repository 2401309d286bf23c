//! Endpoints shared by every record kind.
//!
//! The handlers are generic over the record type; the router instantiates
//! them once per kind.

use axum::{
	extract::{Path, State},
	response::Json,
};
use backoffice_core::EntityRecord;
use backoffice_types::{APIError, AuditRecord, Record};

use super::{parse_id, to_api_error, CurrentActor};
use crate::server::AppState;

/// Handles DELETE /api/{kind}/{id}.
pub async fn soft_delete<R: Record>(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
) -> Result<Json<EntityRecord>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.soft_delete(R::KIND, id, &actor)
		.await
		.map(Json)
		.map_err(|e| {
			tracing::warn!(kind = R::KIND.as_str(), error = %e, "Delete rejected");
			to_api_error(e)
		})
}

/// Handles POST /api/{kind}/{id}/restore.
pub async fn restore<R: Record>(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
) -> Result<Json<EntityRecord>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.restore(R::KIND, id, &actor)
		.await
		.map(Json)
		.map_err(|e| {
			tracing::warn!(kind = R::KIND.as_str(), error = %e, "Restore rejected");
			to_api_error(e)
		})
}

/// Handles GET /api/{kind}/{id}/audit.
pub async fn audit_trail<R: Record>(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
) -> Result<Json<Vec<AuditRecord>>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.audit_trail(R::KIND, id, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}
