//! Audit trail records.
//!
//! One record is appended for every mutation of a business entity. The
//! record's `sequence` equals the revision the mutation produced, so the
//! trail of an entity is dense and ordered: sequence 1 is always `Created`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EntityKind, OrderStatus};

/// What a mutation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditAction {
	Created,
	Updated { fields: Vec<String> },
	StatusChanged { from: OrderStatus, to: OrderStatus },
	Deleted,
	Restored,
}

/// Who changed what, when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
	pub entity: EntityKind,
	pub entity_id: Uuid,
	pub sequence: u64,
	pub action: AuditAction,
	pub actor: Uuid,
	pub at: DateTime<Utc>,
}

impl AuditRecord {
	/// Storage id of this record within the audit namespace.
	///
	/// The zero-padded sequence keeps lexical and numeric order identical.
	pub fn storage_id(entity_id: Uuid, sequence: u64) -> String {
		format!("{}:{:020}", entity_id, sequence)
	}

	/// Prefix shared by every audit record of one entity.
	pub fn storage_prefix(entity_id: Uuid) -> String {
		format!("{}:", entity_id)
	}
}
