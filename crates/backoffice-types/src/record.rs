//! Record header shared by every business entity.
//!
//! The header holds the audit stamps (who created and last changed a record,
//! and when), the soft-delete flag and a revision counter. Its fields are
//! private: inputs accepted from callers never contain them, and they only
//! change through the stamping methods below, which the operation layer calls.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::EntityKind;

/// Default page size for list queries.
pub const DEFAULT_PAGE_LIMIT: u64 = 50;
/// Largest page size a list query may request.
pub const MAX_PAGE_LIMIT: u64 = 500;

/// Audit and soft-delete state of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
	created_at: DateTime<Utc>,
	created_by: Uuid,
	updated_at: DateTime<Utc>,
	updated_by: Uuid,
	#[serde(default)]
	is_deleted: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	deleted_at: Option<DateTime<Utc>>,
	revision: u64,
}

impl RecordMeta {
	/// Header for a freshly created record at revision 1.
	pub fn new(actor: Uuid, at: DateTime<Utc>) -> Self {
		Self {
			created_at: at,
			created_by: actor,
			updated_at: at,
			updated_by: actor,
			is_deleted: false,
			deleted_at: None,
			revision: 1,
		}
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	pub fn created_by(&self) -> Uuid {
		self.created_by
	}

	pub fn updated_at(&self) -> DateTime<Utc> {
		self.updated_at
	}

	pub fn updated_by(&self) -> Uuid {
		self.updated_by
	}

	pub fn is_deleted(&self) -> bool {
		self.is_deleted
	}

	pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
		self.deleted_at
	}

	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// Stamps a mutation by `actor` and bumps the revision.
	///
	/// `updated_at` is strictly increasing, even if the clock has not
	/// advanced since the previous mutation.
	pub fn touch(&mut self, actor: Uuid, at: DateTime<Utc>) {
		self.updated_at = if at > self.updated_at {
			at
		} else {
			self.updated_at + Duration::nanoseconds(1)
		};
		self.updated_by = actor;
		self.revision += 1;
	}

	/// Sets the soft-delete flag and stamps the mutation.
	pub fn mark_deleted(&mut self, actor: Uuid, at: DateTime<Utc>) {
		self.touch(actor, at);
		self.is_deleted = true;
		self.deleted_at = Some(self.updated_at);
	}

	/// Clears the soft-delete flag and stamps the mutation.
	pub fn mark_restored(&mut self, actor: Uuid, at: DateTime<Utc>) {
		self.touch(actor, at);
		self.is_deleted = false;
		self.deleted_at = None;
	}
}

/// A persisted business entity carrying a [`RecordMeta`] header.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
	/// Entity kind, used for policy lookups and storage namespaces.
	const KIND: EntityKind;

	fn id(&self) -> Uuid;
	fn meta(&self) -> &RecordMeta;
	fn meta_mut(&mut self) -> &mut RecordMeta;

	fn is_deleted(&self) -> bool {
		self.meta().is_deleted()
	}
}

/// Pagination and visibility parameters for list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListQuery {
	#[serde(default)]
	pub offset: u64,
	#[serde(default = "default_limit")]
	pub limit: u64,
	/// Include soft-deleted records; they are hidden by default.
	#[serde(default)]
	pub include_deleted: bool,
}

fn default_limit() -> u64 {
	DEFAULT_PAGE_LIMIT
}

impl Default for ListQuery {
	fn default() -> Self {
		Self {
			offset: 0,
			limit: DEFAULT_PAGE_LIMIT,
			include_deleted: false,
		}
	}
}

impl ListQuery {
	/// Page size after clamping to `1..=MAX_PAGE_LIMIT`.
	pub fn effective_limit(&self) -> u64 {
		self.limit.clamp(1, MAX_PAGE_LIMIT)
	}
}

/// A page of results together with the total number of matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub total: u64,
	pub offset: u64,
	pub limit: u64,
}
