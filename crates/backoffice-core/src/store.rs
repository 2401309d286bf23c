//! Typed record persistence with an audit trail.
//!
//! Every write of a record goes through [`RecordStore::insert`] or
//! [`RecordStore::replace`], which commit the record and its audit entry in a
//! single conditional batch. A replace only succeeds if the stored record is
//! still byte-for-byte the one the caller read, so two writers racing on the
//! same record cannot both win.

use backoffice_storage::{StorageError, StorageService, Transaction, Versioned};
use backoffice_types::{AuditAction, AuditRecord, ListQuery, Page, Record, StorageKey};
use std::sync::Arc;
use uuid::Uuid;

use crate::ServiceError;

pub struct RecordStore {
	storage: Arc<StorageService>,
}

impl RecordStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Reads a record along with the version token needed to replace it.
	pub async fn load<R: Record>(&self, id: Uuid) -> Result<Versioned<R>, ServiceError> {
		self.storage
			.retrieve_versioned(R::KIND.storage_key().as_str(), &id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => ServiceError::NotFound { kind: R::KIND, id },
				other => other.into(),
			})
	}

	/// Reads a record that must exist and must not be soft-deleted.
	pub async fn load_live<R: Record>(&self, id: Uuid) -> Result<Versioned<R>, ServiceError> {
		let read = self.load::<R>(id).await?;
		if read.value().is_deleted() {
			return Err(ServiceError::EntityDeleted { kind: R::KIND, id });
		}
		Ok(read)
	}

	/// Returns every stored record of a kind, ordered by creation time then id.
	pub async fn all<R: Record>(&self) -> Result<Vec<R>, ServiceError> {
		let mut records: Vec<R> = self
			.storage
			.retrieve_all(R::KIND.storage_key().as_str(), "")
			.await?;
		records.sort_by(|a, b| {
			(a.meta().created_at(), a.id()).cmp(&(b.meta().created_at(), b.id()))
		});
		Ok(records)
	}

	/// Lists records matching `filter`, hiding deleted ones unless requested.
	pub async fn list<R, F>(&self, query: &ListQuery, filter: F) -> Result<Page<R>, ServiceError>
	where
		R: Record,
		F: Fn(&R) -> bool,
	{
		let matching: Vec<R> = self
			.all::<R>()
			.await?
			.into_iter()
			.filter(|r| query.include_deleted || !r.is_deleted())
			.filter(|r| filter(r))
			.collect();

		let limit = query.effective_limit();
		let total = matching.len() as u64;
		let items = matching
			.into_iter()
			.skip(query.offset as usize)
			.take(limit as usize)
			.collect();

		Ok(Page {
			items,
			total,
			offset: query.offset,
			limit,
		})
	}

	/// Persists a new record with its `Created` audit entry.
	///
	/// `extra` carries additional preconditions and writes that must land in
	/// the same commit, such as a uniqueness index.
	pub async fn insert<R: Record>(&self, record: &R, extra: Transaction) -> Result<(), ServiceError> {
		let namespace = R::KIND.storage_key();
		let id = record.id().to_string();
		let tx = extra
			.expect_absent(namespace.as_str(), &id)
			.put(namespace.as_str(), &id, record)?;
		self.commit_with_audit(record, AuditAction::Created, tx).await
	}

	/// Writes `updated` over the record `read` was taken from.
	///
	/// Fails with [`ServiceError::ConcurrentModification`] if the stored
	/// record changed since `read`; in that case nothing is written.
	pub async fn replace<R: Record>(
		&self,
		read: &Versioned<R>,
		updated: &R,
		action: AuditAction,
		extra: Transaction,
	) -> Result<(), ServiceError> {
		let namespace = R::KIND.storage_key();
		let id = updated.id().to_string();
		let tx = extra
			.expect_unchanged(namespace.as_str(), &id, read)
			.put(namespace.as_str(), &id, updated)?;
		self.commit_with_audit(updated, action, tx).await
	}

	async fn commit_with_audit<R: Record>(
		&self,
		record: &R,
		action: AuditAction,
		tx: Transaction,
	) -> Result<(), ServiceError> {
		let meta = record.meta();
		let entry = AuditRecord {
			entity: R::KIND,
			entity_id: record.id(),
			sequence: meta.revision(),
			action,
			actor: meta.updated_by(),
			at: meta.updated_at(),
		};
		let audit_id = AuditRecord::storage_id(record.id(), meta.revision());
		let tx = tx
			.expect_absent(StorageKey::Audit.as_str(), &audit_id)
			.put(StorageKey::Audit.as_str(), &audit_id, &entry)?;

		let record_key = format!("{}:{}", R::KIND.storage_key().as_str(), record.id());
		let audit_key = format!("{}:{}", StorageKey::Audit.as_str(), audit_id);
		match self.storage.commit(tx).await {
			Ok(()) => Ok(()),
			Err(StorageError::Conflict(key)) if key == record_key || key == audit_key => {
				Err(ServiceError::ConcurrentModification {
					kind: R::KIND,
					id: record.id(),
				})
			},
			Err(StorageError::Conflict(key)) => Err(ServiceError::Conflict(key)),
			Err(e) => Err(e.into()),
		}
	}

	/// Returns the audit entries of a record, oldest first.
	pub async fn audit_trail(&self, id: Uuid) -> Result<Vec<AuditRecord>, ServiceError> {
		Ok(self
			.storage
			.retrieve_all(StorageKey::Audit.as_str(), &AuditRecord::storage_prefix(id))
			.await?)
	}
}
