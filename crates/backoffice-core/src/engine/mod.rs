//! Backoffice engine exposing every operation on customers, orders and users.
//!
//! The engine owns the handlers and the order state machine and routes
//! kind-generic operations (soft delete, restore, audit trail) to the typed
//! implementation for each record kind.

use backoffice_storage::{StorageService, Versioned};
use backoffice_types::{
	Actor, AuditRecord, CreateCustomer, CreateOrder, CreateUser, Customer, EntityKind, ListQuery,
	Order, OrderQuery, OrderStatus, Page, UpdateCustomer, UpdateOrder, UpdateUser, User,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::access::AccessPolicy;
use crate::handlers::{CustomerHandler, OrderHandler, RecordHandler, UserHandler};
use crate::state::OrderStateMachine;
use crate::store::RecordStore;
use crate::utils::truncate_id;
use crate::ServiceError;

/// A record of any kind, returned by the kind-generic operations.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EntityRecord {
	Customer(Customer),
	Order(Order),
	User(User),
}

/// Main backoffice engine.
#[derive(Clone)]
pub struct BackofficeEngine {
	store: Arc<RecordStore>,
	customers: Arc<CustomerHandler>,
	orders: Arc<OrderHandler>,
	users: Arc<UserHandler>,
	records: Arc<RecordHandler>,
	state_machine: Arc<OrderStateMachine>,
}

impl BackofficeEngine {
	pub fn new(storage: Arc<StorageService>, policy: AccessPolicy) -> Self {
		let policy = Arc::new(policy);
		let store = Arc::new(RecordStore::new(storage));
		Self {
			customers: Arc::new(CustomerHandler::new(store.clone(), policy.clone())),
			orders: Arc::new(OrderHandler::new(store.clone(), policy.clone())),
			users: Arc::new(UserHandler::new(store.clone(), policy.clone())),
			records: Arc::new(RecordHandler::new(store.clone(), policy.clone())),
			state_machine: Arc::new(OrderStateMachine::new(store.clone(), policy)),
			store,
		}
	}

	// Identity

	/// Resolves a user id into the actor it acts as.
	pub async fn resolve_actor(&self, user_id: Uuid) -> Result<Actor, ServiceError> {
		self.users.resolve_actor(user_id).await
	}

	pub async fn bootstrap_admin(&self, email: &str, full_name: &str) -> Result<User, ServiceError> {
		self.users.bootstrap_admin(email, full_name).await
	}

	// Lifecycle

	/// Moves an order to `target`. See [`OrderStateMachine::request_transition`].
	pub async fn request_transition(
		&self,
		order_id: Uuid,
		target: OrderStatus,
		actor: &Actor,
	) -> Result<Order, ServiceError> {
		self.state_machine
			.request_transition(order_id, target, actor)
			.await
	}

	/// Reads an order together with its version, for [`Self::transition_from`].
	pub async fn order_snapshot(&self, order_id: Uuid) -> Result<Versioned<Order>, ServiceError> {
		self.store.load::<Order>(order_id).await
	}

	/// Moves a previously read order to `target`, failing with
	/// [`ServiceError::ConcurrentModification`] if it changed since.
	pub async fn transition_from(
		&self,
		snapshot: Versioned<Order>,
		target: OrderStatus,
		actor: &Actor,
	) -> Result<Order, ServiceError> {
		self.state_machine
			.transition_from(snapshot, target, actor)
			.await
	}

	// Soft delete and audit

	#[instrument(skip_all, fields(kind = %kind, id = %truncate_id(&id.to_string())))]
	pub async fn soft_delete(
		&self,
		kind: EntityKind,
		id: Uuid,
		actor: &Actor,
	) -> Result<EntityRecord, ServiceError> {
		match kind {
			EntityKind::Customer => self
				.records
				.soft_delete::<Customer>(id, actor)
				.await
				.map(EntityRecord::Customer),
			EntityKind::Order => self
				.records
				.soft_delete::<Order>(id, actor)
				.await
				.map(EntityRecord::Order),
			EntityKind::User => {
				if id == actor.user_id {
					return Err(ServiceError::Validation(
						"users cannot delete themselves".into(),
					));
				}
				self.records
					.soft_delete::<User>(id, actor)
					.await
					.map(EntityRecord::User)
			},
		}
	}

	#[instrument(skip_all, fields(kind = %kind, id = %truncate_id(&id.to_string())))]
	pub async fn restore(
		&self,
		kind: EntityKind,
		id: Uuid,
		actor: &Actor,
	) -> Result<EntityRecord, ServiceError> {
		match kind {
			EntityKind::Customer => self
				.records
				.restore::<Customer>(id, actor)
				.await
				.map(EntityRecord::Customer),
			EntityKind::Order => self
				.records
				.restore::<Order>(id, actor)
				.await
				.map(EntityRecord::Order),
			EntityKind::User => self
				.records
				.restore::<User>(id, actor)
				.await
				.map(EntityRecord::User),
		}
	}

	pub async fn audit_trail(
		&self,
		kind: EntityKind,
		id: Uuid,
		actor: &Actor,
	) -> Result<Vec<AuditRecord>, ServiceError> {
		match kind {
			EntityKind::Customer => self.records.audit_trail::<Customer>(id, actor).await,
			EntityKind::Order => self.records.audit_trail::<Order>(id, actor).await,
			EntityKind::User => self.records.audit_trail::<User>(id, actor).await,
		}
	}

	// Customers

	pub async fn create_customer(
		&self,
		input: CreateCustomer,
		actor: &Actor,
	) -> Result<Customer, ServiceError> {
		self.customers.create(input, actor).await
	}

	pub async fn get_customer(&self, id: Uuid, actor: &Actor) -> Result<Customer, ServiceError> {
		self.customers.get(id, actor).await
	}

	pub async fn list_customers(
		&self,
		query: &ListQuery,
		actor: &Actor,
	) -> Result<Page<Customer>, ServiceError> {
		self.customers.list(query, actor).await
	}

	pub async fn update_customer(
		&self,
		id: Uuid,
		patch: UpdateCustomer,
		actor: &Actor,
	) -> Result<Customer, ServiceError> {
		self.customers.update(id, patch, actor).await
	}

	// Orders

	pub async fn create_order(&self, input: CreateOrder, actor: &Actor) -> Result<Order, ServiceError> {
		self.orders.create(input, actor).await
	}

	pub async fn get_order(&self, id: Uuid, actor: &Actor) -> Result<Order, ServiceError> {
		self.orders.get(id, actor).await
	}

	pub async fn list_orders(
		&self,
		query: &OrderQuery,
		actor: &Actor,
	) -> Result<Page<Order>, ServiceError> {
		self.orders.list(query, actor).await
	}

	pub async fn update_order(
		&self,
		id: Uuid,
		patch: UpdateOrder,
		actor: &Actor,
	) -> Result<Order, ServiceError> {
		self.orders.update(id, patch, actor).await
	}

	// Users

	pub async fn create_user(&self, input: CreateUser, actor: &Actor) -> Result<User, ServiceError> {
		self.users.create(input, actor).await
	}

	pub async fn get_user(&self, id: Uuid, actor: &Actor) -> Result<User, ServiceError> {
		self.users.get(id, actor).await
	}

	pub async fn list_users(&self, query: &ListQuery, actor: &Actor) -> Result<Page<User>, ServiceError> {
		self.users.list(query, actor).await
	}

	pub async fn update_user(
		&self,
		id: Uuid,
		patch: UpdateUser,
		actor: &Actor,
	) -> Result<User, ServiceError> {
		self.users.update(id, patch, actor).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::is_valid_transition;
	use crate::test_support::fixture;
	use backoffice_storage::implementations::file::FileStorage;
	use backoffice_types::{AuditAction, Record, Role};
	use rust_decimal::Decimal;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_pairs_outside_table_are_rejected_and_leave_order_unchanged() {
		let f = fixture().await;
		for from in OrderStatus::all() {
			for to in OrderStatus::all() {
				if is_valid_transition(from, to) {
					continue;
				}
				let order = f.order_in(from).await;
				let trail_before = f
					.engine
					.audit_trail(EntityKind::Order, order.id, &f.admin)
					.await
					.unwrap()
					.len();

				let err = f
					.engine
					.request_transition(order.id, to, &f.admin)
					.await
					.unwrap_err();
				assert!(
					matches!(err, ServiceError::InvalidTransition { from: a, to: b } if a == from && b == to),
					"{} -> {}: {:?}",
					from,
					to,
					err
				);

				let stored = f.engine.get_order(order.id, &f.admin).await.unwrap();
				assert_eq!(stored.status, from);
				assert_eq!(stored.meta.revision(), order.meta.revision());
				let trail_after = f
					.engine
					.audit_trail(EntityKind::Order, order.id, &f.admin)
					.await
					.unwrap()
					.len();
				assert_eq!(trail_before, trail_after);
			}
		}
	}

	#[tokio::test]
	async fn test_same_status_request_is_invalid() {
		let f = fixture().await;
		let order = f.order().await;
		let err = f
			.engine
			.request_transition(order.id, OrderStatus::Pending, &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::InvalidTransition { .. }));
	}

	#[tokio::test]
	async fn test_deleted_orders_reject_every_transition() {
		let f = fixture().await;
		for from in OrderStatus::all() {
			let order = f.order_in(from).await;
			f.engine
				.soft_delete(EntityKind::Order, order.id, &f.admin)
				.await
				.unwrap();

			for to in OrderStatus::all() {
				let err = f
					.engine
					.request_transition(order.id, to, &f.admin)
					.await
					.unwrap_err();
				assert!(
					matches!(err, ServiceError::EntityDeleted { kind: EntityKind::Order, .. }),
					"{} -> {}: {:?}",
					from,
					to,
					err
				);
			}
		}
	}

	#[tokio::test]
	async fn test_full_lifecycle_then_archived_is_terminal() {
		let f = fixture().await;
		let order = f.order().await;

		for step in [
			OrderStatus::Active,
			OrderStatus::Completed,
			OrderStatus::Archived,
		] {
			let updated = f
				.engine
				.request_transition(order.id, step, &f.admin)
				.await
				.unwrap();
			assert_eq!(updated.status, step);
			assert_eq!(updated.meta.updated_by(), f.admin.user_id);
		}

		for to in OrderStatus::all() {
			let err = f
				.engine
				.request_transition(order.id, to, &f.admin)
				.await
				.unwrap_err();
			assert!(matches!(err, ServiceError::InvalidTransition { .. }));
		}

		let trail = f
			.engine
			.audit_trail(EntityKind::Order, order.id, &f.admin)
			.await
			.unwrap();
		let actions: Vec<_> = trail.iter().map(|r| r.action.clone()).collect();
		assert_eq!(
			actions,
			vec![
				AuditAction::Created,
				AuditAction::StatusChanged {
					from: OrderStatus::Pending,
					to: OrderStatus::Active
				},
				AuditAction::StatusChanged {
					from: OrderStatus::Active,
					to: OrderStatus::Completed
				},
				AuditAction::StatusChanged {
					from: OrderStatus::Completed,
					to: OrderStatus::Archived
				},
			]
		);
		let sequences: Vec<u64> = trail.iter().map(|r| r.sequence).collect();
		assert_eq!(sequences, vec![1, 2, 3, 4]);
	}

	#[tokio::test]
	async fn test_transition_stamps_strictly_later_update() {
		let f = fixture().await;
		let order = f.order().await;
		let updated = f
			.engine
			.request_transition(order.id, OrderStatus::Active, &f.manager)
			.await
			.unwrap();
		assert!(updated.meta.updated_at() > order.meta.updated_at());
		assert_eq!(updated.meta.updated_by(), f.manager.user_id);
		assert_eq!(updated.meta.created_by(), f.admin.user_id);
	}

	#[tokio::test]
	async fn test_soft_delete_then_restore_returns_prior_state() {
		let f = fixture().await;
		let order = f.order_in(OrderStatus::Active).await;

		let deleted = f
			.engine
			.soft_delete(EntityKind::Order, order.id, &f.manager)
			.await
			.unwrap();
		let EntityRecord::Order(deleted) = deleted else {
			panic!("expected an order");
		};
		assert!(deleted.is_deleted());
		assert!(deleted.meta.deleted_at().is_some());

		// Still retrievable by id, but hidden from the default listing.
		let stored = f.engine.get_order(order.id, &f.admin).await.unwrap();
		assert!(stored.is_deleted());
		let listed = f
			.engine
			.list_orders(&OrderQuery::default(), &f.admin)
			.await
			.unwrap();
		assert!(listed.items.iter().all(|o| o.id != order.id));

		let restored = f
			.engine
			.restore(EntityKind::Order, order.id, &f.manager)
			.await
			.unwrap();
		let EntityRecord::Order(restored) = restored else {
			panic!("expected an order");
		};
		assert!(!restored.is_deleted());
		assert!(restored.meta.deleted_at().is_none());
		assert_eq!(restored.status, OrderStatus::Active);
		assert_eq!(restored.reference, order.reference);
		assert_eq!(restored.total, order.total);

		let err = f
			.engine
			.restore(EntityKind::Order, order.id, &f.manager)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::NotDeleted { .. }));
	}

	#[tokio::test]
	async fn test_delete_twice_and_restore_live_customer() {
		let f = fixture().await;
		let customer = f.customer().await;

		let err = f
			.engine
			.restore(EntityKind::Customer, customer.id, &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::NotDeleted { kind: EntityKind::Customer, .. }));

		f.engine
			.soft_delete(EntityKind::Customer, customer.id, &f.admin)
			.await
			.unwrap();
		let err = f
			.engine
			.soft_delete(EntityKind::Customer, customer.id, &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::EntityDeleted { .. }));
	}

	#[tokio::test]
	async fn test_deleting_customer_does_not_cascade() {
		let f = fixture().await;
		let order = f.order().await;
		f.engine
			.soft_delete(EntityKind::Customer, order.customer_id, &f.admin)
			.await
			.unwrap();

		let stored = f.engine.get_order(order.id, &f.admin).await.unwrap();
		assert!(!stored.is_deleted());
		f.engine
			.request_transition(order.id, OrderStatus::Active, &f.admin)
			.await
			.unwrap();

		// A deleted customer cannot receive new orders.
		let err = f
			.engine
			.create_order(
				CreateOrder {
					customer_id: order.customer_id,
					reference: "PO-2".into(),
					total: Decimal::ONE,
					notes: None,
				},
				&f.admin,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::EntityDeleted { kind: EntityKind::Customer, .. }));
	}

	#[tokio::test]
	async fn test_stale_snapshot_loses_with_concurrent_modification() {
		let f = fixture().await;
		let order = f.order().await;

		let first = f.engine.order_snapshot(order.id).await.unwrap();
		let second = f.engine.order_snapshot(order.id).await.unwrap();

		f.engine
			.transition_from(first, OrderStatus::Active, &f.admin)
			.await
			.unwrap();
		let err = f
			.engine
			.transition_from(second, OrderStatus::Cancelled, &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::ConcurrentModification { .. }));

		let stored = f.engine.get_order(order.id, &f.admin).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Active);
		let status_changes = f
			.engine
			.audit_trail(EntityKind::Order, order.id, &f.admin)
			.await
			.unwrap()
			.into_iter()
			.filter(|r| matches!(r.action, AuditAction::StatusChanged { .. }))
			.count();
		assert_eq!(status_changes, 1);
	}

	#[tokio::test]
	async fn test_requests_sharing_one_read_let_exactly_one_win() {
		let f = fixture().await;
		let order = f.order().await;

		// Both requests read the order before either of them commits.
		let first = f.engine.order_snapshot(order.id).await.unwrap();
		let second = f.engine.order_snapshot(order.id).await.unwrap();
		let (a, b) = futures::future::join(
			f.engine
				.transition_from(first, OrderStatus::Active, &f.admin),
			f.engine
				.transition_from(second, OrderStatus::Active, &f.manager),
		)
		.await;

		let results = [a, b];
		assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
		let loser = results
			.into_iter()
			.find_map(|r| r.err())
			.unwrap();
		assert!(matches!(loser, ServiceError::ConcurrentModification { .. }));

		let trail = f
			.engine
			.audit_trail(EntityKind::Order, order.id, &f.admin)
			.await
			.unwrap();
		assert_eq!(trail.len(), 2);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_requests_across_tasks() {
		let f = fixture().await;
		let order = f.order().await;

		let mut tasks = Vec::new();
		for _ in 0..8 {
			let engine = f.engine.clone();
			let actor = f.admin;
			tasks.push(tokio::spawn(async move {
				engine
					.request_transition(order.id, OrderStatus::Cancelled, &actor)
					.await
			}));
		}
		let results: Vec<_> = futures::future::join_all(tasks)
			.await
			.into_iter()
			.map(|r| r.unwrap())
			.collect();

		assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
		for err in results.into_iter().filter_map(|r| r.err()) {
			assert!(matches!(
				err,
				ServiceError::ConcurrentModification { .. } | ServiceError::InvalidTransition { .. }
			));
		}
		let stored = f.engine.get_order(order.id, &f.admin).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Cancelled);
		assert_eq!(stored.meta.revision(), 2);
	}

	#[tokio::test]
	async fn test_staff_cannot_complete_but_admin_can() {
		let f = fixture().await;
		let order = f.order_in(OrderStatus::Active).await;

		let err = f
			.engine
			.request_transition(order.id, OrderStatus::Completed, &f.staff)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::PermissionDenied(_)));
		let stored = f.engine.get_order(order.id, &f.admin).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Active);

		let done = f
			.engine
			.request_transition(order.id, OrderStatus::Completed, &f.admin)
			.await
			.unwrap();
		assert_eq!(done.status, OrderStatus::Completed);
	}

	#[tokio::test]
	async fn test_staff_may_activate_pending_orders() {
		let f = fixture().await;
		let order = f.order().await;
		let active = f
			.engine
			.request_transition(order.id, OrderStatus::Active, &f.staff)
			.await
			.unwrap();
		assert_eq!(active.status, OrderStatus::Active);
	}

	#[tokio::test]
	async fn test_manager_cannot_archive() {
		let f = fixture().await;
		let order = f.order_in(OrderStatus::Completed).await;
		let err = f
			.engine
			.request_transition(order.id, OrderStatus::Archived, &f.manager)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::PermissionDenied(_)));
	}

	#[tokio::test]
	async fn test_denied_operations_write_nothing() {
		let f = fixture().await;
		let customer = f.customer().await;

		let err = f
			.engine
			.soft_delete(EntityKind::Customer, customer.id, &f.staff)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::PermissionDenied(_)));

		let err = f
			.engine
			.update_customer(
				customer.id,
				UpdateCustomer {
					name: Some("Renamed".into()),
					..Default::default()
				},
				&f.staff,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::PermissionDenied(_)));

		let stored = f.engine.get_customer(customer.id, &f.staff).await.unwrap();
		assert_eq!(stored.name, "Acme");
		assert!(!stored.is_deleted());
		let trail = f
			.engine
			.audit_trail(EntityKind::Customer, customer.id, &f.admin)
			.await
			.unwrap();
		assert_eq!(trail.len(), 1);
	}

	#[tokio::test]
	async fn test_permission_is_checked_before_lookup() {
		let f = fixture().await;
		let err = f
			.engine
			.soft_delete(EntityKind::User, Uuid::new_v4(), &f.staff)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::PermissionDenied(_)));

		let err = f
			.engine
			.request_transition(Uuid::new_v4(), OrderStatus::Active, &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::NotFound { kind: EntityKind::Order, .. }));
	}

	#[tokio::test]
	async fn test_staff_creates_customers_but_not_orders() {
		let f = fixture().await;
		let customer = f
			.engine
			.create_customer(
				CreateCustomer {
					name: "  Globex ".into(),
					email: None,
					phone: Some("".into()),
					company: None,
				},
				&f.staff,
			)
			.await
			.unwrap();
		assert_eq!(customer.name, "Globex");
		assert_eq!(customer.phone, None);
		assert_eq!(customer.meta.created_by(), f.staff.user_id);

		let err = f
			.engine
			.create_order(
				CreateOrder {
					customer_id: customer.id,
					reference: "PO-9".into(),
					total: Decimal::ONE,
					notes: None,
				},
				&f.staff,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::PermissionDenied(_)));

		let err = f
			.engine
			.list_users(&ListQuery::default(), &f.staff)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::PermissionDenied(_)));
	}

	#[tokio::test]
	async fn test_update_applies_fields_and_audits_them() {
		let f = fixture().await;
		let order = f.order().await;

		let updated = f
			.engine
			.update_order(
				order.id,
				UpdateOrder {
					total: Some(Decimal::new(1000, 2)),
					notes: Some(Some("rush".into())),
					..Default::default()
				},
				&f.manager,
			)
			.await
			.unwrap();
		assert_eq!(updated.total, Decimal::new(1000, 2));
		assert_eq!(updated.notes.as_deref(), Some("rush"));
		assert_eq!(updated.status, OrderStatus::Pending);
		assert_eq!(updated.meta.updated_by(), f.manager.user_id);
		assert_eq!(updated.meta.revision(), 2);

		let trail = f
			.engine
			.audit_trail(EntityKind::Order, order.id, &f.admin)
			.await
			.unwrap();
		assert_eq!(
			trail[1].action,
			AuditAction::Updated {
				fields: vec!["total".into(), "notes".into()]
			}
		);
		assert_eq!(trail[1].actor, f.manager.user_id);

		let cleared = f
			.engine
			.update_order(
				order.id,
				UpdateOrder {
					notes: Some(None),
					..Default::default()
				},
				&f.manager,
			)
			.await
			.unwrap();
		assert_eq!(cleared.notes, None);
	}

	#[tokio::test]
	async fn test_update_rejects_empty_invalid_and_deleted() {
		let f = fixture().await;
		let order = f.order().await;

		let err = f
			.engine
			.update_order(order.id, UpdateOrder::default(), &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Validation(_)));

		let err = f
			.engine
			.update_order(
				order.id,
				UpdateOrder {
					total: Some(Decimal::new(-1, 0)),
					..Default::default()
				},
				&f.admin,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Validation(_)));

		f.engine
			.soft_delete(EntityKind::Order, order.id, &f.admin)
			.await
			.unwrap();
		let err = f
			.engine
			.update_order(
				order.id,
				UpdateOrder {
					reference: Some("PO-7".into()),
					..Default::default()
				},
				&f.admin,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::EntityDeleted { .. }));
	}

	#[tokio::test]
	async fn test_list_orders_filters_and_orders() {
		let f = fixture().await;
		let first = f.order().await;
		let second = f.order_in(OrderStatus::Active).await;
		let third = f.order().await;
		f.engine
			.soft_delete(EntityKind::Order, third.id, &f.admin)
			.await
			.unwrap();

		let all = f
			.engine
			.list_orders(&OrderQuery::default(), &f.admin)
			.await
			.unwrap();
		let ids: Vec<_> = all.items.iter().map(|o| o.id).collect();
		assert_eq!(ids, vec![first.id, second.id]);
		assert_eq!(all.total, 2);

		let pending = f
			.engine
			.list_orders(
				&OrderQuery {
					status: Some(OrderStatus::Pending),
					..Default::default()
				},
				&f.admin,
			)
			.await
			.unwrap();
		assert_eq!(pending.items.len(), 1);
		assert_eq!(pending.items[0].id, first.id);

		let by_customer = f
			.engine
			.list_orders(
				&OrderQuery {
					customer_id: Some(second.customer_id),
					..Default::default()
				},
				&f.admin,
			)
			.await
			.unwrap();
		assert_eq!(by_customer.total, 1);

		let with_deleted = f
			.engine
			.list_orders(
				&OrderQuery {
					list: ListQuery {
						include_deleted: true,
						..Default::default()
					},
					..Default::default()
				},
				&f.admin,
			)
			.await
			.unwrap();
		assert_eq!(with_deleted.total, 3);
	}

	#[tokio::test]
	async fn test_user_emails_are_unique_ignoring_case() {
		let f = fixture().await;
		let err = f
			.engine
			.create_user(
				CreateUser {
					email: " Staff@Example.com ".into(),
					full_name: "Someone".into(),
					role: Role::Staff,
				},
				&f.admin,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Conflict(_)));

		let err = f
			.engine
			.update_user(
				f.manager.user_id,
				UpdateUser {
					email: Some("STAFF@example.com".into()),
					..Default::default()
				},
				&f.admin,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Conflict(_)));

		// Moving to a fresh address frees the old one.
		f.engine
			.update_user(
				f.manager.user_id,
				UpdateUser {
					email: Some("boss@example.com".into()),
					..Default::default()
				},
				&f.admin,
			)
			.await
			.unwrap();
		let reused = f
			.engine
			.create_user(
				CreateUser {
					email: "manager@example.com".into(),
					full_name: "New manager".into(),
					role: Role::Manager,
				},
				&f.admin,
			)
			.await
			.unwrap();
		assert_eq!(reused.email, "manager@example.com");
	}

	#[tokio::test]
	async fn test_role_comes_from_stored_user() {
		let f = fixture().await;
		f.engine
			.update_user(
				f.staff.user_id,
				UpdateUser {
					role: Some(Role::Manager),
					..Default::default()
				},
				&f.admin,
			)
			.await
			.unwrap();
		let promoted = f.engine.resolve_actor(f.staff.user_id).await.unwrap();
		assert_eq!(promoted.role, Role::Manager);
	}

	#[tokio::test]
	async fn test_deleted_users_cannot_act() {
		let f = fixture().await;
		f.engine
			.soft_delete(EntityKind::User, f.staff.user_id, &f.admin)
			.await
			.unwrap();
		let err = f.engine.resolve_actor(f.staff.user_id).await.unwrap_err();
		assert!(matches!(err, ServiceError::UnknownActor(_)));

		let err = f.engine.resolve_actor(Uuid::new_v4()).await.unwrap_err();
		assert!(matches!(err, ServiceError::UnknownActor(_)));

		f.engine
			.restore(EntityKind::User, f.staff.user_id, &f.admin)
			.await
			.unwrap();
		assert!(f.engine.resolve_actor(f.staff.user_id).await.is_ok());
	}

	#[tokio::test]
	async fn test_users_cannot_delete_themselves() {
		let f = fixture().await;
		let err = f
			.engine
			.soft_delete(EntityKind::User, f.admin.user_id, &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Validation(_)));
	}

	#[tokio::test]
	async fn test_bootstrap_admin_is_idempotent() {
		let f = fixture().await;
		let again = f
			.engine
			.bootstrap_admin("ADMIN@example.com", "Admin")
			.await
			.unwrap();
		assert_eq!(again.id, f.admin.user_id);
		assert_eq!(again.meta.created_by(), again.id);

		let err = f
			.engine
			.bootstrap_admin("staff@example.com", "Staff")
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Conflict(_)));
	}

	#[tokio::test]
	async fn test_audit_trail_requires_read_access() {
		let f = fixture().await;
		let err = f
			.engine
			.audit_trail(EntityKind::User, f.manager.user_id, &f.staff)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::PermissionDenied(_)));

		let err = f
			.engine
			.audit_trail(EntityKind::Customer, Uuid::new_v4(), &f.admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::NotFound { .. }));
	}

	#[tokio::test]
	async fn test_failed_file_commit_keeps_order_and_trail_together() {
		let dir = TempDir::new().unwrap();
		let storage = StorageService::new(Box::new(FileStorage::new(dir.path().to_path_buf())));
		let engine = BackofficeEngine::new(Arc::new(storage), AccessPolicy::builtin());
		let root = engine
			.bootstrap_admin("admin@example.com", "Admin")
			.await
			.unwrap();
		let admin = engine.resolve_actor(root.id).await.unwrap();
		let customer = engine
			.create_customer(
				CreateCustomer {
					name: "Acme".into(),
					email: None,
					phone: None,
					company: None,
				},
				&admin,
			)
			.await
			.unwrap();
		let order = engine
			.create_order(
				CreateOrder {
					customer_id: customer.id,
					reference: "PO-7".into(),
					total: Decimal::new(1000, 2),
					notes: None,
				},
				&admin,
			)
			.await
			.unwrap();

		// A directory where the second audit entry would be staged.
		let blocker = dir
			.path()
			.join(format!("audit%3A{}%3A{:020}.tmp", order.id, 2));
		std::fs::create_dir(&blocker).unwrap();

		let err = engine
			.request_transition(order.id, OrderStatus::Active, &admin)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Storage(_)));

		let stored = engine.get_order(order.id, &admin).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Pending);
		assert_eq!(stored.meta.revision(), 1);
		let trail = engine
			.audit_trail(EntityKind::Order, order.id, &admin)
			.await
			.unwrap();
		assert_eq!(trail.len(), 1);

		std::fs::remove_dir(&blocker).unwrap();
		let moved = engine
			.request_transition(order.id, OrderStatus::Active, &admin)
			.await
			.unwrap();
		assert_eq!(moved.meta.revision(), 2);
		let trail = engine
			.audit_trail(EntityKind::Order, order.id, &admin)
			.await
			.unwrap();
		assert_eq!(trail.len(), 2);
		assert_eq!(
			trail[1].action,
			AuditAction::StatusChanged {
				from: OrderStatus::Pending,
				to: OrderStatus::Active,
			}
		);
	}
}
