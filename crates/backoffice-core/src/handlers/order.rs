//! Order records.
//!
//! New orders start in [`OrderStatus::Pending`]. Updates never touch the
//! status; that goes through the state machine.

use backoffice_storage::{Transaction, Versioned};
use backoffice_types::{
	Actor, AuditAction, CreateOrder, Customer, EntityKind, Operation, Order, OrderQuery,
	OrderStatus, Page, RecordMeta, StorageKey, UpdateOrder,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{clean_optional, require_text};
use crate::access::AccessPolicy;
use crate::store::RecordStore;
use crate::utils::truncate_id;
use crate::ServiceError;

pub struct OrderHandler {
	store: Arc<RecordStore>,
	policy: Arc<AccessPolicy>,
}

impl OrderHandler {
	pub fn new(store: Arc<RecordStore>, policy: Arc<AccessPolicy>) -> Self {
		Self { store, policy }
	}

	#[instrument(skip_all, fields(customer_id = %truncate_id(&input.customer_id.to_string())))]
	pub async fn create(&self, input: CreateOrder, actor: &Actor) -> Result<Order, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Order, Operation::Create)?;

		let reference = require_text("reference", &input.reference)?;
		let total = validate_total(input.total)?;
		let customer = self.live_customer(input.customer_id).await?;

		let order = Order {
			id: Uuid::new_v4(),
			customer_id: input.customer_id,
			reference,
			total,
			notes: clean_optional(input.notes),
			status: OrderStatus::Pending,
			meta: RecordMeta::new(actor.user_id, Utc::now()),
		};
		self.store
			.insert(&order, Self::customer_guard(&customer))
			.await
			.map_err(|e| Self::customer_conflict(e, order.customer_id))?;

		tracing::info!(order_id = %truncate_id(&order.id.to_string()), "Order created");
		Ok(order)
	}

	/// Returns an order, including a soft-deleted one.
	pub async fn get(&self, id: Uuid, actor: &Actor) -> Result<Order, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Order, Operation::Read)?;
		Ok(self.store.load::<Order>(id).await?.into_inner())
	}

	pub async fn list(&self, query: &OrderQuery, actor: &Actor) -> Result<Page<Order>, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Order, Operation::Read)?;
		self.store
			.list::<Order, _>(&query.list, |order| {
				query.status.is_none_or(|status| order.status == status)
					&& query
						.customer_id
						.is_none_or(|customer_id| order.customer_id == customer_id)
			})
			.await
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(&id.to_string())))]
	pub async fn update(
		&self,
		id: Uuid,
		patch: UpdateOrder,
		actor: &Actor,
	) -> Result<Order, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Order, Operation::Update)?;
		let fields = patch.changed_fields();
		if fields.is_empty() {
			return Err(ServiceError::Validation("empty update".into()));
		}

		let read = self.store.load_live::<Order>(id).await?;
		let mut updated = read.value().clone();
		let mut extra = Transaction::new();

		if let Some(customer_id) = patch.customer_id {
			if customer_id != updated.customer_id {
				let customer = self.live_customer(customer_id).await?;
				extra = Self::customer_guard(&customer);
				updated.customer_id = customer_id;
			}
		}
		if let Some(reference) = patch.reference {
			updated.reference = require_text("reference", &reference)?;
		}
		if let Some(total) = patch.total {
			updated.total = validate_total(total)?;
		}
		if let Some(notes) = patch.notes {
			updated.notes = clean_optional(notes);
		}
		updated.meta.touch(actor.user_id, Utc::now());

		let customer_id = updated.customer_id;
		self.store
			.replace(&read, &updated, AuditAction::Updated { fields }, extra)
			.await
			.map_err(|e| Self::customer_conflict(e, customer_id))?;
		Ok(updated)
	}

	async fn live_customer(&self, id: Uuid) -> Result<Versioned<Customer>, ServiceError> {
		self.store.load_live::<Customer>(id).await
	}

	/// Keeps the referenced customer from being deleted while the order is
	/// written.
	fn customer_guard(customer: &Versioned<Customer>) -> Transaction {
		Transaction::new().expect_unchanged(
			StorageKey::Customers.as_str(),
			&customer.value().id.to_string(),
			customer,
		)
	}

	fn customer_conflict(err: ServiceError, customer_id: Uuid) -> ServiceError {
		match err {
			ServiceError::Conflict(key)
				if key == format!("{}:{}", StorageKey::Customers.as_str(), customer_id) =>
			{
				ServiceError::Conflict(format!(
					"customer {} changed while the order was written",
					customer_id
				))
			},
			other => other,
		}
	}
}

fn validate_total(total: Decimal) -> Result<Decimal, ServiceError> {
	if total.is_sign_negative() && !total.is_zero() {
		return Err(ServiceError::Validation("total must not be negative".into()));
	}
	Ok(total)
}
