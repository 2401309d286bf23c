//! User records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EntityKind, Record, RecordMeta, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	pub id: Uuid,
	/// Unique across users, compared case-insensitively.
	pub email: String,
	pub full_name: String,
	pub role: Role,
	pub meta: RecordMeta,
}

impl Record for User {
	const KIND: EntityKind = EntityKind::User;

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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
	pub email: String,
	pub full_name: String,
	pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
	pub email: Option<String>,
	pub full_name: Option<String>,
	pub role: Option<Role>,
}

impl UpdateUser {
	/// Names of the fields this patch touches.
	pub fn changed_fields(&self) -> Vec<String> {
		let mut fields = Vec::new();
		if self.email.is_some() {
			fields.push("email".to_string());
		}
		if self.full_name.is_some() {
			fields.push("full_name".to_string());
		}
		if self.role.is_some() {
			fields.push("role".to_string());
		}
		fields
	}
}

/// Canonical form of an email address used for uniqueness checks.
pub fn normalize_email(email: &str) -> String {
	email.trim().to_ascii_lowercase()
}
