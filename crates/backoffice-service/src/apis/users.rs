//! User endpoints.

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
};
use backoffice_types::{APIError, CreateUser, ListQuery, Page, UpdateUser, User};

use super::{parse_id, to_api_error, CurrentActor};
use crate::server::AppState;

/// Handles GET /api/users.
pub async fn list(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Query(query): Query<ListQuery>,
) -> Result<Json<Page<User>>, APIError> {
	state
		.engine
		.list_users(&query, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles POST /api/users.
pub async fn create(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>), APIError> {
	state
		.engine
		.create_user(input, &actor)
		.await
		.map(|user| (StatusCode::CREATED, Json(user)))
		.map_err(to_api_error)
}

/// Handles GET /api/users/{id}.
pub async fn get(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
) -> Result<Json<User>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.get_user(id, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles PATCH /api/users/{id}.
pub async fn update(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
	Json(patch): Json<UpdateUser>,
) -> Result<Json<User>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.update_user(id, patch, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}
