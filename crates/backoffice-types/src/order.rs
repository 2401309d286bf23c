//! Order records and statuses.
//!
//! An order belongs to a customer (by id only; the customer may later be
//! soft-deleted without affecting the order) and moves through a small set
//! of statuses. Which status changes are legal is decided by the lifecycle
//! validator in the core crate, never by the update input below.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::serde_helpers::double_option;
use crate::{EntityKind, ListQuery, Record, RecordMeta};

/// A customer order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: Uuid,
	/// Customer that placed the order.
	pub customer_id: Uuid,
	/// Human-readable order number.
	pub reference: String,
	/// Order total, never negative.
	pub total: Decimal,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	/// Current status of the order.
	pub status: OrderStatus,
	pub meta: RecordMeta,
}

impl Record for Order {
	const KIND: EntityKind = EntityKind::Order;

	fn id(&self) -> Uuid {
		self.id
	}

	fn meta(&self) -> &RecordMeta {
		&self.meta
	}

	fn meta_mut(&mut self) -> &mut RecordMeta {
		&mut self.meta
	}
}

/// Status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// Order has been recorded but work has not started. Initial status.
	Pending,
	/// Order is being worked on.
	Active,
	/// Order has been fulfilled.
	Completed,
	/// Order was called off before completion.
	Cancelled,
	/// Order is closed for good.
	Archived,
}

impl OrderStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Active => "active",
			OrderStatus::Completed => "completed",
			OrderStatus::Cancelled => "cancelled",
			OrderStatus::Archived => "archived",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Active,
			Self::Completed,
			Self::Cancelled,
			Self::Archived,
		]
		.into_iter()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Pending => write!(f, "Pending"),
			OrderStatus::Active => write!(f, "Active"),
			OrderStatus::Completed => write!(f, "Completed"),
			OrderStatus::Cancelled => write!(f, "Cancelled"),
			OrderStatus::Archived => write!(f, "Archived"),
		}
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pending" => Ok(Self::Pending),
			"active" => Ok(Self::Active),
			"completed" => Ok(Self::Completed),
			"cancelled" | "canceled" => Ok(Self::Cancelled),
			"archived" => Ok(Self::Archived),
			other => Err(format!("unknown order status '{}'", other)),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
	pub customer_id: Uuid,
	pub reference: String,
	pub total: Decimal,
	pub notes: Option<String>,
}

/// Patch for an order's descriptive fields. The status is not patchable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateOrder {
	pub customer_id: Option<Uuid>,
	pub reference: Option<String>,
	pub total: Option<Decimal>,
	#[serde(default, deserialize_with = "double_option::deserialize")]
	pub notes: Option<Option<String>>,
}

impl UpdateOrder {
	/// Names of the fields this patch touches.
	pub fn changed_fields(&self) -> Vec<String> {
		let mut fields = Vec::new();
		if self.customer_id.is_some() {
			fields.push("customer_id".to_string());
		}
		if self.reference.is_some() {
			fields.push("reference".to_string());
		}
		if self.total.is_some() {
			fields.push("total".to_string());
		}
		if self.notes.is_some() {
			fields.push("notes".to_string());
		}
		fields
	}
}

/// Request body for a status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
	pub status: OrderStatus,
}

/// List parameters for orders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQuery {
	#[serde(flatten)]
	pub list: ListQuery,
	pub status: Option<OrderStatus>,
	pub customer_id: Option<Uuid>,
}
