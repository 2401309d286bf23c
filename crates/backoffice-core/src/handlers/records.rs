//! Operations shared by every record kind: soft delete, restore and the
//! audit trail.
//!
//! Soft delete and restore only flip the flag in the record header; the
//! business fields stay as they were, so a restore brings back exactly what
//! was deleted.

use backoffice_storage::Transaction;
use backoffice_types::{Actor, AuditAction, AuditRecord, Operation, Record};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::access::AccessPolicy;
use crate::store::RecordStore;
use crate::utils::truncate_id;
use crate::ServiceError;

pub struct RecordHandler {
	store: Arc<RecordStore>,
	policy: Arc<AccessPolicy>,
}

impl RecordHandler {
	pub fn new(store: Arc<RecordStore>, policy: Arc<AccessPolicy>) -> Self {
		Self { store, policy }
	}

	/// Marks a live record deleted. Deleting twice is an error.
	pub async fn soft_delete<R: Record>(&self, id: Uuid, actor: &Actor) -> Result<R, ServiceError> {
		self.policy.authorize(actor, R::KIND, Operation::Delete)?;

		let read = self.store.load_live::<R>(id).await?;
		let mut updated = read.value().clone();
		updated.meta_mut().mark_deleted(actor.user_id, Utc::now());

		self.store
			.replace(&read, &updated, AuditAction::Deleted, Transaction::new())
			.await?;

		tracing::info!(kind = R::KIND.as_str(), id = %truncate_id(&id.to_string()), "Soft-deleted");
		Ok(updated)
	}

	/// Clears the deleted flag of a record.
	pub async fn restore<R: Record>(&self, id: Uuid, actor: &Actor) -> Result<R, ServiceError> {
		self.policy.authorize(actor, R::KIND, Operation::Restore)?;

		let read = self.store.load::<R>(id).await?;
		if !read.value().is_deleted() {
			return Err(ServiceError::NotDeleted { kind: R::KIND, id });
		}
		let mut updated = read.value().clone();
		updated.meta_mut().mark_restored(actor.user_id, Utc::now());

		self.store
			.replace(&read, &updated, AuditAction::Restored, Transaction::new())
			.await?;

		tracing::info!(kind = R::KIND.as_str(), id = %truncate_id(&id.to_string()), "Restored");
		Ok(updated)
	}

	/// Returns the audit entries of a record, oldest first.
	///
	/// Requires read access to the record's kind.
	pub async fn audit_trail<R: Record>(
		&self,
		id: Uuid,
		actor: &Actor,
	) -> Result<Vec<AuditRecord>, ServiceError> {
		self.policy.authorize(actor, R::KIND, Operation::Read)?;
		self.store.load::<R>(id).await?;
		self.store.audit_trail(id).await
	}
}
