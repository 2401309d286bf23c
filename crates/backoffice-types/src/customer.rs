//! Customer records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::serde_helpers::double_option;
use crate::{EntityKind, Record, RecordMeta};

/// A customer of the business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
	pub id: Uuid,
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub phone: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub company: Option<String>,
	pub meta: RecordMeta,
}

impl Record for Customer {
	const KIND: EntityKind = EntityKind::Customer;

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
pub struct CreateCustomer {
	pub name: String,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateCustomer {
	pub name: Option<String>,
	#[serde(default, deserialize_with = "double_option::deserialize")]
	pub email: Option<Option<String>>,
	#[serde(default, deserialize_with = "double_option::deserialize")]
	pub phone: Option<Option<String>>,
	#[serde(default, deserialize_with = "double_option::deserialize")]
	pub company: Option<Option<String>>,
}

impl UpdateCustomer {
	/// Names of the fields this patch touches.
	pub fn changed_fields(&self) -> Vec<String> {
		let mut fields = Vec::new();
		if self.name.is_some() {
			fields.push("name".to_string());
		}
		if self.email.is_some() {
			fields.push("email".to_string());
		}
		if self.phone.is_some() {
			fields.push("phone".to_string());
		}
		if self.company.is_some() {
			fields.push("company".to_string());
		}
		fields
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_patch_distinguishes_null_from_absent() {
		let patch: UpdateCustomer =
			serde_json::from_str(r#"{"phone": null, "company": "Acme"}"#).unwrap();
		assert_eq!(patch.name, None);
		assert_eq!(patch.email, None);
		assert_eq!(patch.phone, Some(None));
		assert_eq!(patch.company, Some(Some("Acme".to_string())));
		assert_eq!(patch.changed_fields(), vec!["phone", "company"]);
	}
}
