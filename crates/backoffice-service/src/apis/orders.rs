//! Order endpoints, including status transitions.

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
};
use backoffice_types::{
	APIError, CreateOrder, ListQuery, Order, OrderQuery, OrderStatus, Page, TransitionRequest,
	UpdateOrder, DEFAULT_PAGE_LIMIT,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_id, to_api_error, CurrentActor};
use crate::server::AppState;

/// Query string of GET /api/orders.
#[derive(Debug, Deserialize)]
pub struct OrderListParams {
	#[serde(default)]
	pub offset: u64,
	#[serde(default = "default_limit")]
	pub limit: u64,
	#[serde(default)]
	pub include_deleted: bool,
	pub status: Option<OrderStatus>,
	pub customer_id: Option<Uuid>,
}

fn default_limit() -> u64 {
	DEFAULT_PAGE_LIMIT
}

impl From<OrderListParams> for OrderQuery {
	fn from(params: OrderListParams) -> Self {
		OrderQuery {
			list: ListQuery {
				offset: params.offset,
				limit: params.limit,
				include_deleted: params.include_deleted,
			},
			status: params.status,
			customer_id: params.customer_id,
		}
	}
}

/// Handles GET /api/orders.
pub async fn list(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Query(params): Query<OrderListParams>,
) -> Result<Json<Page<Order>>, APIError> {
	state
		.engine
		.list_orders(&params.into(), &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles POST /api/orders.
pub async fn create(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Json(input): Json<CreateOrder>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	state
		.engine
		.create_order(input, &actor)
		.await
		.map(|order| (StatusCode::CREATED, Json(order)))
		.map_err(to_api_error)
}

/// Handles GET /api/orders/{id}.
pub async fn get(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
) -> Result<Json<Order>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.get_order(id, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles PATCH /api/orders/{id}.
///
/// The status cannot be changed here; unknown fields such as `status` are
/// ignored.
pub async fn update(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
	Json(patch): Json<UpdateOrder>,
) -> Result<Json<Order>, APIError> {
	let id = parse_id(&id)?;
	state
		.engine
		.update_order(id, patch, &actor)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles POST /api/orders/{id}/transition.
pub async fn transition(
	State(state): State<AppState>,
	CurrentActor(actor): CurrentActor,
	Path(id): Path<String>,
	Json(request): Json<TransitionRequest>,
) -> Result<Json<Order>, APIError> {
	let id = parse_id(&id)?;
	match state
		.engine
		.request_transition(id, request.status, &actor)
		.await
	{
		Ok(order) => Ok(Json(order)),
		Err(e) => {
			tracing::warn!(order_id = %id, to = %request.status, error = %e, "Transition rejected");
			Err(to_api_error(e))
		},
	}
}
