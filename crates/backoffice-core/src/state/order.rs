//! Order state machine implementation.
//!
//! Orders move through Pending -> Active -> Completed -> Archived, with
//! Cancelled reachable from Pending and Active and leading only to Archived.
//! Archived is terminal. The status field of an order is never written
//! anywhere else: updates cannot carry it, and every change here is checked
//! against the table, the actor's role and the version of the record that
//! was read.

use backoffice_storage::{Transaction, Versioned};
use backoffice_types::{Actor, AuditAction, EntityKind, Operation, Order, OrderStatus, Record};
use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::access::AccessPolicy;
use crate::store::RecordStore;
use crate::utils::truncate_id;
use crate::ServiceError;

// Static transition table - each state maps to allowed next states
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Pending,
		HashSet::from([OrderStatus::Active, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::Active,
		HashSet::from([OrderStatus::Completed, OrderStatus::Cancelled]),
	);
	m.insert(OrderStatus::Completed, HashSet::from([OrderStatus::Archived]));
	m.insert(OrderStatus::Cancelled, HashSet::from([OrderStatus::Archived]));
	m.insert(OrderStatus::Archived, HashSet::new()); // terminal
	m
});

/// Checks if a state transition is an edge of the lifecycle.
///
/// A status never transitions to itself.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|allowed| allowed.contains(&to))
}

/// Every edge of the lifecycle, in a stable order.
pub fn lifecycle_edges() -> Vec<(OrderStatus, OrderStatus)> {
	OrderStatus::all()
		.flat_map(|from| {
			OrderStatus::all()
				.filter(move |to| is_valid_transition(from, *to))
				.map(move |to| (from, to))
		})
		.collect()
}

/// Applies validated status changes to stored orders.
pub struct OrderStateMachine {
	store: Arc<RecordStore>,
	policy: Arc<AccessPolicy>,
}

impl OrderStateMachine {
	pub fn new(store: Arc<RecordStore>, policy: Arc<AccessPolicy>) -> Self {
		Self { store, policy }
	}

	/// Moves an order to `target` on behalf of `actor`.
	///
	/// Checks run in this order: the actor's role may transition orders at
	/// all, the order exists, it is not deleted, the pair is a lifecycle edge,
	/// the role is granted that edge. The write itself succeeds only if the
	/// order is unchanged since it was read; on any failure the stored order
	/// and its audit trail are untouched.
	#[instrument(skip_all, fields(order_id = %truncate_id(&order_id.to_string()), to = %target))]
	pub async fn request_transition(
		&self,
		order_id: Uuid,
		target: OrderStatus,
		actor: &Actor,
	) -> Result<Order, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Order, Operation::Transition)?;
		let read = self.store.load::<Order>(order_id).await?;
		self.transition_from(read, target, actor).await
	}

	/// Moves the order captured in `read` to `target`.
	///
	/// Fails with [`ServiceError::ConcurrentModification`] if the stored
	/// order no longer matches `read`.
	pub async fn transition_from(
		&self,
		read: Versioned<Order>,
		target: OrderStatus,
		actor: &Actor,
	) -> Result<Order, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Order, Operation::Transition)?;

		let current = read.value();
		if current.is_deleted() {
			return Err(ServiceError::EntityDeleted {
				kind: EntityKind::Order,
				id: current.id,
			});
		}

		let from = current.status;
		if !is_valid_transition(from, target) {
			return Err(ServiceError::InvalidTransition { from, to: target });
		}
		self.policy.authorize_transition(actor, from, target)?;

		let mut updated = current.clone();
		updated.status = target;
		updated.meta.touch(actor.user_id, Utc::now());

		self.store
			.replace(
				&read,
				&updated,
				AuditAction::StatusChanged { from, to: target },
				Transaction::new(),
			)
			.await?;

		tracing::info!(
			order_id = %truncate_id(&updated.id.to_string()),
			from = %from,
			to = %target,
			actor = %truncate_id(&actor.user_id.to_string()),
			"Order status changed"
		);
		Ok(updated)
	}
}
