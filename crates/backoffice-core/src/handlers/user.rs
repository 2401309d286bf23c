//! User records and identity.
//!
//! Emails are unique across users, soft-deleted ones included. The
//! `user_by_email` index is written in the same commit as the user, guarded
//! by an absence precondition, so two concurrent creates with one email
//! cannot both succeed.

use backoffice_storage::{StorageError, Transaction};
use backoffice_types::{
	normalize_email, Actor, AuditAction, CreateUser, EntityKind, ListQuery, Operation, Page,
	Record, RecordMeta, Role, StorageKey, UpdateUser, User,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::require_text;
use crate::access::AccessPolicy;
use crate::store::RecordStore;
use crate::utils::truncate_id;
use crate::ServiceError;

pub struct UserHandler {
	store: Arc<RecordStore>,
	policy: Arc<AccessPolicy>,
}

impl UserHandler {
	pub fn new(store: Arc<RecordStore>, policy: Arc<AccessPolicy>) -> Self {
		Self { store, policy }
	}

	#[instrument(skip_all, fields(role = %input.role))]
	pub async fn create(&self, input: CreateUser, actor: &Actor) -> Result<User, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::User, Operation::Create)?;

		let email = validate_email(&input.email)?;
		let user = User {
			id: Uuid::new_v4(),
			full_name: require_text("full_name", &input.full_name)?,
			email,
			role: input.role,
			meta: RecordMeta::new(actor.user_id, Utc::now()),
		};
		self.insert(&user).await?;

		tracing::info!(user_id = %truncate_id(&user.id.to_string()), role = %user.role, "User created");
		Ok(user)
	}

	/// Returns a user, including a soft-deleted one.
	pub async fn get(&self, id: Uuid, actor: &Actor) -> Result<User, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::User, Operation::Read)?;
		Ok(self.store.load::<User>(id).await?.into_inner())
	}

	pub async fn list(&self, query: &ListQuery, actor: &Actor) -> Result<Page<User>, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::User, Operation::Read)?;
		self.store.list::<User, _>(query, |_| true).await
	}

	#[instrument(skip_all, fields(user_id = %truncate_id(&id.to_string())))]
	pub async fn update(
		&self,
		id: Uuid,
		patch: UpdateUser,
		actor: &Actor,
	) -> Result<User, ServiceError> {
		self.policy
			.authorize(actor, EntityKind::User, Operation::Update)?;
		let fields = patch.changed_fields();
		if fields.is_empty() {
			return Err(ServiceError::Validation("empty update".into()));
		}

		let read = self.store.load_live::<User>(id).await?;
		let mut updated = read.value().clone();
		let mut extra = Transaction::new();

		if let Some(email) = patch.email {
			let email = validate_email(&email)?;
			if email != updated.email {
				extra = extra
					.expect_absent(StorageKey::UserByEmail.as_str(), &email)
					.put(StorageKey::UserByEmail.as_str(), &email, &id)?
					.remove(StorageKey::UserByEmail.as_str(), &updated.email);
				updated.email = email;
			}
		}
		if let Some(full_name) = patch.full_name {
			updated.full_name = require_text("full_name", &full_name)?;
		}
		if let Some(role) = patch.role {
			updated.role = role;
		}
		updated.meta.touch(actor.user_id, Utc::now());

		let email = updated.email.clone();
		self.store
			.replace(&read, &updated, AuditAction::Updated { fields }, extra)
			.await
			.map_err(|e| email_conflict(e, &email))?;
		Ok(updated)
	}

	/// Resolves the acting user. Unknown and soft-deleted users cannot act.
	pub async fn resolve_actor(&self, user_id: Uuid) -> Result<Actor, ServiceError> {
		match self.store.load::<User>(user_id).await {
			Ok(read) if !read.value().is_deleted() => {
				let user = read.into_inner();
				Ok(Actor::new(user.id, user.role))
			},
			Ok(_) | Err(ServiceError::NotFound { .. }) => Err(ServiceError::UnknownActor(user_id)),
			Err(e) => Err(e),
		}
	}

	/// Looks up a user id by email, deleted users included.
	pub async fn find_by_email(&self, email: &str) -> Result<Option<Uuid>, ServiceError> {
		match self
			.store
			.storage()
			.retrieve::<Uuid>(StorageKey::UserByEmail.as_str(), &normalize_email(email))
			.await
		{
			Ok(id) => Ok(Some(id)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	/// Creates the first administrator, attributed to itself.
	///
	/// Running it again with the same email returns the existing user.
	#[instrument(skip_all)]
	pub async fn bootstrap_admin(&self, email: &str, full_name: &str) -> Result<User, ServiceError> {
		let email = validate_email(email)?;
		if let Some(existing) = self.existing_admin(&email).await? {
			return Ok(existing);
		}

		let id = Uuid::new_v4();
		let user = User {
			id,
			email: email.clone(),
			full_name: require_text("full_name", full_name)?,
			role: Role::Admin,
			meta: RecordMeta::new(id, Utc::now()),
		};
		match self.insert(&user).await {
			Ok(()) => {
				tracing::info!(user_id = %truncate_id(&id.to_string()), "Bootstrap administrator created");
				Ok(user)
			},
			// Lost a race against another bootstrap with the same email.
			Err(ServiceError::Conflict(_)) => self
				.existing_admin(&email)
				.await?
				.ok_or_else(|| ServiceError::Conflict(format!("email {} is already in use", email))),
			Err(e) => Err(e),
		}
	}

	async fn existing_admin(&self, email: &str) -> Result<Option<User>, ServiceError> {
		let Some(id) = self.find_by_email(email).await? else {
			return Ok(None);
		};
		let user = self.store.load::<User>(id).await?.into_inner();
		if user.role != Role::Admin || user.is_deleted() {
			return Err(ServiceError::Conflict(format!(
				"email {} belongs to a user that is not an active administrator",
				email
			)));
		}
		Ok(Some(user))
	}

	async fn insert(&self, user: &User) -> Result<(), ServiceError> {
		let index = Transaction::new()
			.expect_absent(StorageKey::UserByEmail.as_str(), &user.email)
			.put(StorageKey::UserByEmail.as_str(), &user.email, &user.id)?;
		self.store
			.insert(user, index)
			.await
			.map_err(|e| email_conflict(e, &user.email))
	}
}

fn validate_email(email: &str) -> Result<String, ServiceError> {
	let email = normalize_email(email);
	if email.is_empty() || !email.contains('@') {
		return Err(ServiceError::Validation(format!(
			"'{}' is not an email address",
			email
		)));
	}
	Ok(email)
}

fn email_conflict(err: ServiceError, email: &str) -> ServiceError {
	match err {
		ServiceError::Conflict(key)
			if key == format!("{}:{}", StorageKey::UserByEmail.as_str(), email) =>
		{
			ServiceError::Conflict(format!("email {} is already in use", email))
		},
		other => other,
	}
}
