//! Customer records.

use backoffice_storage::Transaction;
use backoffice_types::{
	Actor, AuditAction, CreateCustomer, Customer, EntityKind, ListQuery, Operation, Page,
	RecordMeta, UpdateCustomer,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{clean_optional, require_text};
use crate::access::AccessPolicy;
use crate::store::RecordStore;
use crate::utils::truncate_id;
use crate::ServiceError;

pub struct CustomerHandler {
	store: Arc<RecordStore>,
	policy: Arc<AccessPolicy>,
}

impl CustomerHandler {
	pub fn new(store: Arc<RecordStore>, policy: Arc<AccessPolicy>) -> Self {
		Self { store, policy }
	}

	#[instrument(skip_all)]
	pub async fn create(
		&self,
		input: CreateCustomer,
		actor: &Actor,
	) -> Result<Customer, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Customer, Operation::Create)?;

		let customer = Customer {
			id: Uuid::new_v4(),
			name: require_text("name", &input.name)?,
			email: validate_email(clean_optional(input.email))?,
			phone: clean_optional(input.phone),
			company: clean_optional(input.company),
			meta: RecordMeta::new(actor.user_id, Utc::now()),
		};
		self.store.insert(&customer, Transaction::new()).await?;

		tracing::info!(customer_id = %truncate_id(&customer.id.to_string()), "Customer created");
		Ok(customer)
	}

	/// Returns a customer, including a soft-deleted one.
	pub async fn get(&self, id: Uuid, actor: &Actor) -> Result<Customer, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Customer, Operation::Read)?;
		Ok(self.store.load::<Customer>(id).await?.into_inner())
	}

	pub async fn list(&self, query: &ListQuery, actor: &Actor) -> Result<Page<Customer>, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Customer, Operation::Read)?;
		self.store.list::<Customer, _>(query, |_| true).await
	}

	#[instrument(skip_all, fields(customer_id = %truncate_id(&id.to_string())))]
	pub async fn update(
		&self,
		id: Uuid,
		patch: UpdateCustomer,
		actor: &Actor,
	) -> Result<Customer, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::Customer, Operation::Update)?;
		let fields = patch.changed_fields();
		if fields.is_empty() {
			return Err(ServiceError::Validation("empty update".into()));
		}

		let read = self.store.load_live::<Customer>(id).await?;
		let mut updated = read.value().clone();
		if let Some(name) = patch.name {
			updated.name = require_text("name", &name)?;
		}
		if let Some(email) = patch.email {
			updated.email = validate_email(clean_optional(email))?;
		}
		if let Some(phone) = patch.phone {
			updated.phone = clean_optional(phone);
		}
		if let Some(company) = patch.company {
			updated.company = clean_optional(company);
		}
		updated.meta.touch(actor.user_id, Utc::now());

		self.store
			.replace(
				&read,
				&updated,
				AuditAction::Updated { fields },
				Transaction::new(),
			)
			.await?;
		Ok(updated)
	}
}

fn validate_email(email: Option<String>) -> Result<Option<String>, ServiceError> {
	match email {
		Some(email) if !email.contains('@') => Err(ServiceError::Validation(format!(
			"'{}' is not an email address",
			email
		))),
		other => Ok(other),
	}
}
