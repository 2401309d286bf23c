//! HTTP server for the backoffice API.
//!
//! Every route lives under `/api` and requires the `x-actor-id` header.

use axum::{
	routing::{get, post},
	Router,
};
use backoffice_config::ApiConfig;
use backoffice_core::BackofficeEngine;
use backoffice_types::{Customer, Order, User};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::apis::{customers, orders, records, users};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine that executes every operation.
	pub engine: Arc<BackofficeEngine>,
}

/// Builds the API router.
pub fn router(engine: Arc<BackofficeEngine>) -> Router {
	let api = Router::new()
		.route("/customers", get(customers::list).post(customers::create))
		.route(
			"/customers/{id}",
			get(customers::get)
				.patch(customers::update)
				.delete(records::soft_delete::<Customer>),
		)
		.route(
			"/customers/{id}/restore",
			post(records::restore::<Customer>),
		)
		.route(
			"/customers/{id}/audit",
			get(records::audit_trail::<Customer>),
		)
		.route("/orders", get(orders::list).post(orders::create))
		.route(
			"/orders/{id}",
			get(orders::get)
				.patch(orders::update)
				.delete(records::soft_delete::<Order>),
		)
		.route("/orders/{id}/transition", post(orders::transition))
		.route("/orders/{id}/restore", post(records::restore::<Order>))
		.route("/orders/{id}/audit", get(records::audit_trail::<Order>))
		.route("/users", get(users::list).post(users::create))
		.route(
			"/users/{id}",
			get(users::get)
				.patch(users::update)
				.delete(records::soft_delete::<User>),
		)
		.route("/users/{id}/restore", post(records::restore::<User>))
		.route("/users/{id}/audit", get(records::audit_trail::<User>));

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(AppState { engine })
}

/// Starts the HTTP server and serves until Ctrl+C.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<BackofficeEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Backoffice API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!("Failed to listen for shutdown signal: {}", e);
			}
		})
		.await?;

	Ok(())
}
