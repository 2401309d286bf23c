//! Role-based access policy.
//!
//! The policy answers two questions: may a role perform an operation on an
//! entity kind, and may a role move an order along a given lifecycle edge.
//! It depends only on the actor's role. Anything not granted is denied.

use backoffice_config::AccessConfig;
use backoffice_types::{Actor, EntityKind, Operation, OrderStatus, Role};
use std::collections::HashSet;
use thiserror::Error;

use crate::state::{is_valid_transition, lifecycle_edges};
use crate::ServiceError;

/// Errors raised while assembling a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
	#[error("{from} -> {to} is not an order lifecycle transition")]
	NotAnEdge { from: OrderStatus, to: OrderStatus },
	#[error("Transition must be granted per edge, not as an operation on {0}")]
	TransitionAsOperation(EntityKind),
}

#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
	grants: HashSet<(Role, EntityKind, Operation)>,
	transitions: HashSet<(Role, OrderStatus, OrderStatus)>,
}

impl AccessPolicy {
	/// A policy that denies everything.
	pub fn deny_all() -> Self {
		Self::default()
	}

	/// The built-in matrix.
	///
	/// | Role    | Customers           | Orders                        | Users |
	/// |---------|---------------------|-------------------------------|-------|
	/// | Admin   | all                 | all, every edge               | all   |
	/// | Manager | all                 | all, every edge not archiving | read  |
	/// | Staff   | read, create        | read, pending -> active       | none  |
	pub fn builtin() -> Self {
		let mut policy = Self::deny_all();

		for kind in EntityKind::all() {
			policy.grant_crud(Role::Admin, kind, Operation::crud());
		}
		policy.grant_crud(Role::Manager, EntityKind::Customer, Operation::crud());
		policy.grant_crud(Role::Manager, EntityKind::Order, Operation::crud());
		policy.grant_crud(Role::Manager, EntityKind::User, [Operation::Read]);
		policy.grant_crud(
			Role::Staff,
			EntityKind::Customer,
			[Operation::Read, Operation::Create],
		);
		policy.grant_crud(Role::Staff, EntityKind::Order, [Operation::Read]);

		for (from, to) in lifecycle_edges() {
			policy.transitions.insert((Role::Admin, from, to));
			if to != OrderStatus::Archived {
				policy.transitions.insert((Role::Manager, from, to));
			}
		}
		policy
			.transitions
			.insert((Role::Staff, OrderStatus::Pending, OrderStatus::Active));

		policy
	}

	/// Builds a policy from an explicit matrix, replacing the built-in one.
	pub fn from_config(config: &AccessConfig) -> Result<Self, PolicyError> {
		let mut policy = Self::deny_all();
		for grant in &config.grants {
			policy.grant(grant.role, grant.entity, grant.operations.iter().copied())?;
		}
		for edge in &config.transitions {
			policy.grant_transition(edge.role, edge.from, edge.to)?;
		}
		Ok(policy)
	}

	/// Grants CRUD or restore operations on a kind.
	pub fn grant(
		&mut self,
		role: Role,
		kind: EntityKind,
		operations: impl IntoIterator<Item = Operation>,
	) -> Result<(), PolicyError> {
		for operation in operations {
			if operation == Operation::Transition {
				return Err(PolicyError::TransitionAsOperation(kind));
			}
			self.grants.insert((role, kind, operation));
		}
		Ok(())
	}

	fn grant_crud(
		&mut self,
		role: Role,
		kind: EntityKind,
		operations: impl IntoIterator<Item = Operation>,
	) {
		for operation in operations {
			self.grants.insert((role, kind, operation));
		}
	}

	/// Grants one lifecycle edge. Pairs outside the table are rejected.
	pub fn grant_transition(
		&mut self,
		role: Role,
		from: OrderStatus,
		to: OrderStatus,
	) -> Result<(), PolicyError> {
		if !is_valid_transition(from, to) {
			return Err(PolicyError::NotAnEdge { from, to });
		}
		self.transitions.insert((role, from, to));
		Ok(())
	}

	/// Whether `role` may perform `operation` on `kind`.
	///
	/// [`Operation::Transition`] is allowed when the role holds at least one
	/// edge; it only applies to orders.
	pub fn allows(&self, role: Role, kind: EntityKind, operation: Operation) -> bool {
		match operation {
			Operation::Transition => {
				kind == EntityKind::Order && self.transitions.iter().any(|(r, _, _)| *r == role)
			},
			_ => self.grants.contains(&(role, kind, operation)),
		}
	}

	pub fn allows_transition(&self, role: Role, from: OrderStatus, to: OrderStatus) -> bool {
		self.transitions.contains(&(role, from, to))
	}

	pub fn authorize(
		&self,
		actor: &Actor,
		kind: EntityKind,
		operation: Operation,
	) -> Result<(), ServiceError> {
		if self.allows(actor.role, kind, operation) {
			Ok(())
		} else {
			tracing::debug!(role = %actor.role, %kind, %operation, "Denied");
			Err(ServiceError::denied(actor.role, kind, operation))
		}
	}

	pub fn authorize_transition(
		&self,
		actor: &Actor,
		from: OrderStatus,
		to: OrderStatus,
	) -> Result<(), ServiceError> {
		if self.allows_transition(actor.role, from, to) {
			Ok(())
		} else {
			tracing::debug!(role = %actor.role, %from, %to, "Transition denied");
			Err(ServiceError::transition_denied(actor.role, from, to))
		}
	}
}
