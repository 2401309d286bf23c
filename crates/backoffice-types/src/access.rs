//! Access vocabulary shared by the policy, the configuration and the API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::StorageKey;

/// Role stored on a user record.
///
/// The role is the only input the access policy uses to decide what a user
/// may do; it is never derived from any other data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Admin,
	Manager,
	Staff,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Admin => "admin",
			Role::Manager => "manager",
			Role::Staff => "staff",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"admin" => Ok(Self::Admin),
			"manager" => Ok(Self::Manager),
			"staff" => Ok(Self::Staff),
			other => Err(format!("unknown role '{}'", other)),
		}
	}
}

/// Kind of business entity an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
	Customer,
	Order,
	User,
}

impl EntityKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			EntityKind::Customer => "customer",
			EntityKind::Order => "order",
			EntityKind::User => "user",
		}
	}

	/// Storage namespace holding records of this kind.
	pub fn storage_key(&self) -> StorageKey {
		match self {
			EntityKind::Customer => StorageKey::Customers,
			EntityKind::Order => StorageKey::Orders,
			EntityKind::User => StorageKey::Users,
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Customer, Self::Order, Self::User].into_iter()
	}
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EntityKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"customer" | "customers" => Ok(Self::Customer),
			"order" | "orders" => Ok(Self::Order),
			"user" | "users" => Ok(Self::User),
			other => Err(format!("unknown entity kind '{}'", other)),
		}
	}
}

/// Operation a caller asks to perform on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
	Create,
	Read,
	Update,
	Delete,
	Restore,
	Transition,
}

impl Operation {
	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::Create => "create",
			Operation::Read => "read",
			Operation::Update => "update",
			Operation::Delete => "delete",
			Operation::Restore => "restore",
			Operation::Transition => "transition",
		}
	}

	/// Create, read, update, delete and restore.
	pub fn crud() -> [Self; 5] {
		[
			Self::Create,
			Self::Read,
			Self::Update,
			Self::Delete,
			Self::Restore,
		]
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Operation {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"create" => Ok(Self::Create),
			"read" => Ok(Self::Read),
			"update" => Ok(Self::Update),
			"delete" => Ok(Self::Delete),
			"restore" => Ok(Self::Restore),
			"transition" => Ok(Self::Transition),
			other => Err(format!("unknown operation '{}'", other)),
		}
	}
}

/// The user on whose behalf an operation runs.
///
/// Supplied by the identity lookup, which copies the role from the stored
/// user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub user_id: Uuid,
	pub role: Role,
}

impl Actor {
	pub fn new(user_id: Uuid, role: Role) -> Self {
		Self { user_id, role }
	}
}
