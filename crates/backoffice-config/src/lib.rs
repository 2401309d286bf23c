//! Configuration module for the backoffice service.
//!
//! Configuration is read from TOML. `${VAR}` and `${VAR:-default}` references
//! are replaced with environment values before parsing, and the parsed
//! configuration is validated before it is handed out.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use backoffice_types::{EntityKind, Operation, OrderStatus, Role};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the backoffice service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Replacement access matrix. The built-in matrix applies when absent.
	pub access: Option<AccessConfig>,
	/// First administrator to create at startup.
	pub bootstrap: Option<BootstrapConfig>,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// An explicit access matrix.
///
/// Everything not granted here is denied.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessConfig {
	#[serde(default)]
	pub grants: Vec<GrantConfig>,
	#[serde(default)]
	pub transitions: Vec<TransitionGrantConfig>,
}

/// Operations a role may perform on an entity kind.
///
/// Status changes are granted per edge through [`TransitionGrantConfig`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GrantConfig {
	pub role: Role,
	pub entity: EntityKind,
	pub operations: Vec<Operation>,
}

/// One order status change a role may request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransitionGrantConfig {
	pub role: Role,
	pub from: OrderStatus,
	pub to: OrderStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapConfig {
	pub admin_email: String,
	#[serde(default = "default_admin_name")]
	pub admin_name: String,
}

fn default_admin_name() -> String {
	"Administrator".to_string()
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};
		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;
		loader.load_config(file_name).await
	}

	/// Returns the primary storage implementation's name and its raw config.
	pub fn primary_storage(&self) -> Option<(&str, &toml::Value)> {
		self.storage
			.implementations
			.get(&self.storage.primary)
			.map(|value| (self.storage.primary.as_str(), value))
	}

	/// Checks cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if let Some(access) = &self.access {
			for grant in &access.grants {
				if grant.operations.is_empty() {
					return Err(ConfigError::Validation(format!(
						"Access grant for role '{}' on '{}' lists no operations",
						grant.role, grant.entity
					)));
				}
				if grant.operations.contains(&Operation::Transition) {
					return Err(ConfigError::Validation(format!(
						"Access grant for role '{}' on '{}' cannot list 'transition'; \
						use [[access.transitions]] instead",
						grant.role, grant.entity
					)));
				}
			}
			for transition in &access.transitions {
				if transition.from == transition.to {
					return Err(ConfigError::Validation(format!(
						"Transition grant for role '{}' goes from '{}' to itself",
						transition.role,
						transition.from.as_str()
					)));
				}
			}
		}

		if let Some(bootstrap) = &self.bootstrap {
			let email = bootstrap.admin_email.trim();
			if email.is_empty() || !email.contains('@') {
				return Err(ConfigError::Validation(format!(
					"Bootstrap admin_email '{}' is not a valid email address",
					bootstrap.admin_email
				)));
			}
			if bootstrap.admin_name.trim().is_empty() {
				return Err(ConfigError::Validation(
					"Bootstrap admin_name cannot be empty".into(),
				));
			}
		}

		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation(
					"API port must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses a configuration string: resolves environment variables, parses
/// the TOML and validates the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
