//! Builder for constructing backoffice engines.
//!
//! Resolves the primary storage implementation through a factory map, picks
//! the access policy (the built-in matrix unless configuration supplies one)
//! and creates the bootstrap administrator when configured.

use crate::access::AccessPolicy;
use crate::engine::BackofficeEngine;
use backoffice_config::Config;
use backoffice_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
	#[error("Bootstrap failed: {0}")]
	Bootstrap(String),
}

/// Builder for constructing a BackofficeEngine from configuration.
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine using `storage_factories` keyed by implementation name.
	pub async fn build<SF>(
		self,
		storage_factories: &HashMap<String, SF>,
	) -> Result<BackofficeEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let (name, storage_config) = self.config.primary_storage().ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' has no configuration",
				self.config.storage.primary
			))
		})?;
		let factory = storage_factories
			.get(name)
			.ok_or_else(|| BuilderError::MissingComponent(format!("storage '{}'", name)))?;

		let backend = match factory(storage_config) {
			Ok(backend) => backend,
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %name,
					error = %e,
					"Failed to create storage implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					name, e
				)));
			},
		};
		tracing::info!(component = "storage", implementation = %name, "Loaded");
		let storage = Arc::new(StorageService::new(backend));

		let policy = match &self.config.access {
			Some(access) => {
				let policy = AccessPolicy::from_config(access)
					.map_err(|e| BuilderError::Config(format!("Invalid access matrix: {}", e)))?;
				tracing::info!(
					grants = access.grants.len(),
					transitions = access.transitions.len(),
					"Using configured access matrix"
				);
				policy
			},
			None => AccessPolicy::builtin(),
		};

		let engine = BackofficeEngine::new(storage, policy);

		if let Some(bootstrap) = &self.config.bootstrap {
			engine
				.bootstrap_admin(&bootstrap.admin_email, &bootstrap.admin_name)
				.await
				.map_err(|e| BuilderError::Bootstrap(e.to_string()))?;
		}

		Ok(engine)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use backoffice_storage::{implementations::memory, StorageFactory};
	use crate::ServiceError;
	use backoffice_types::{CreateCustomer, ImplementationRegistry, ListQuery, Role};
	use tempfile::TempDir;

	fn factories() -> HashMap<String, StorageFactory> {
		backoffice_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect()
	}

	#[tokio::test]
	async fn test_build_with_memory_and_bootstrap() {
		let config: Config = r#"
[service]
id = "test"

[storage]
primary = "memory"
[storage.implementations.memory]

[bootstrap]
admin_email = "root@example.com"
"#
		.parse()
		.unwrap();

		let engine = EngineBuilder::new(config)
			.build(&factories())
			.await
			.unwrap();
		let admin = engine
			.bootstrap_admin("root@example.com", "ignored")
			.await
			.unwrap();
		assert_eq!(admin.role, Role::Admin);
		assert_eq!(admin.full_name, "Administrator");
	}

	#[tokio::test]
	async fn test_configured_matrix_replaces_builtin() {
		let config: Config = r#"
[service]
id = "test"

[storage]
primary = "memory"
[storage.implementations.memory]

[[access.grants]]
role = "admin"
entity = "user"
operations = ["read"]
"#
		.parse()
		.unwrap();

		let engine = EngineBuilder::new(config)
			.build(&factories())
			.await
			.unwrap();
		let root = engine
			.bootstrap_admin("root@example.com", "Root")
			.await
			.unwrap();
		let admin = engine.resolve_actor(root.id).await.unwrap();

		assert!(engine
			.list_users(&ListQuery::default(), &admin)
			.await
			.is_ok());
		assert!(matches!(
			engine.list_customers(&ListQuery::default(), &admin).await,
			Err(ServiceError::PermissionDenied(_))
		));
	}

	#[tokio::test]
	async fn test_configured_transition_must_be_an_edge() {
		let config: Config = r#"
[service]
id = "test"

[storage]
primary = "memory"
[storage.implementations.memory]

[[access.transitions]]
role = "staff"
from = "pending"
to = "completed"
"#
		.parse()
		.unwrap();

		let err = EngineBuilder::new(config)
			.build(&factories())
			.await
			.err()
			.unwrap();
		assert!(matches!(err, BuilderError::Config(_)));
	}

	#[tokio::test]
	async fn test_missing_factory() {
		let config: Config = r#"
[service]
id = "test"

[storage]
primary = "memory"
[storage.implementations.memory]
"#
		.parse()
		.unwrap();

		let only_memory_name: HashMap<String, StorageFactory> = HashMap::new();
		let err = EngineBuilder::new(config)
			.build(&only_memory_name)
			.await
			.err()
			.unwrap();
		assert!(matches!(err, BuilderError::MissingComponent(_)));
		assert_eq!(memory::Registry::NAME, "memory");
	}

	#[tokio::test]
	async fn test_file_storage_survives_rebuild() {
		let temp_dir = TempDir::new().unwrap();
		let toml = format!(
			r#"
[service]
id = "test"

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "{}"

[bootstrap]
admin_email = "root@example.com"
"#,
			temp_dir.path().display()
		);

		let engine = EngineBuilder::new(toml.parse().unwrap())
			.build(&factories())
			.await
			.unwrap();
		let root = engine
			.bootstrap_admin("root@example.com", "Administrator")
			.await
			.unwrap();
		let admin = engine.resolve_actor(root.id).await.unwrap();
		let customer = engine
			.create_customer(
				CreateCustomer {
					name: "Initech".into(),
					email: None,
					phone: None,
					company: None,
				},
				&admin,
			)
			.await
			.unwrap();
		drop(engine);

		let reopened = EngineBuilder::new(toml.parse().unwrap())
			.build(&factories())
			.await
			.unwrap();
		let again = reopened
			.bootstrap_admin("root@example.com", "Administrator")
			.await
			.unwrap();
		assert_eq!(again.id, root.id);
		let page = reopened
			.list_customers(&ListQuery::default(), &admin)
			.await
			.unwrap();
		assert_eq!(page.items.len(), 1);
		assert_eq!(page.items[0].id, customer.id);
	}
}
