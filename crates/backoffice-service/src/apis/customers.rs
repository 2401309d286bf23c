//! Customer endpoints.

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
};
use backoffice_types::{APIError, CreateCustomer, Customer, ListQuery, Page, UpdateCustomer};

use super::{parse_id, to_api_error, CurrentActor};
use crate::server::AppState;

/// Handles GET /api/customers.
pub async fn list(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Query(query): Query<ListQuery>,
) -> Result<Json<Page<Customer>>, APIError> {
	state
		.engine
		.list_customers(&query, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles POST /api/customers.
pub async fn create(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Json(input): Json<CreateCustomer>,
) -> Result<(StatusCode, Json<Customer>), APIError> {
	state
		.engine
		.create_customer(input, &actor)
		.await
		.map(|customer| (StatusCode::CREATED, Json(customer)))
		.map_err(to_api_error)
}

/// Handles GET /api/customers/{id}.
pub async fn get(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
) -> Result<Json<Customer>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.get_customer(id, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles PATCH /api/customers/{id}.
pub async fn update(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
	Json(patch): Json<UpdateCustomer>,
) -> Result<Json<Customer>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.update_customer(id, patch, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}
