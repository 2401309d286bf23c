//! Storage module for the backoffice system.
//!
//! This module provides the persistence collaborator used by the core: a
//! low-level key/value [`StorageInterface`] implemented by pluggable backends,
//! and a typed [`StorageService`] on top of it.
//!
//! Every write goes through [`StorageService::commit`]: a [`Transaction`]
//! carries preconditions (the exact bytes, or absence, a key must hold) and
//! mutations. A backend checks every precondition and applies every mutation
//! inside one exclusive section, or applies nothing and reports an error.

use async_trait::async_trait;
use backoffice_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// A commit precondition did not hold; nothing was written.
	#[error("Conflict on key {0}")]
	Conflict(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Expected state of a key at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
	pub key: String,
	/// `None` means the key must not exist.
	pub expected: Option<Vec<u8>>,
}

/// A single write inside a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	Put { key: String, value: Vec<u8> },
	Delete { key: String },
}

/// Preconditions and mutations applied together by [`StorageInterface::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
	pub preconditions: Vec<Precondition>,
	pub mutations: Vec<Mutation>,
}

impl WriteBatch {
	/// Returns the key of the first precondition that `current` violates.
	///
	/// `current` looks up the stored bytes for a key.
	pub fn first_violation<F>(&self, mut current: F) -> Option<&str>
	where
		F: FnMut(&str) -> Option<Vec<u8>>,
	{
		self.preconditions
			.iter()
			.find(|p| current(&p.key) != p.expected)
			.map(|p| p.key.as_str())
	}
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys are `namespace:id[:suffix]` strings. [`StorageInterface::commit`] is
/// the only write path and must be atomic with respect to every other call on
/// the same backend instance: a reader sees either none or all of a batch.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Lists all keys starting with `prefix`, in ascending order.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Checks every precondition, then applies every mutation, atomically.
	///
	/// On any error nothing from the batch is left visible.
	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn make_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

/// A value read from storage together with the exact bytes it was decoded from.
///
/// The bytes serve as the version token for a later conditional commit.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
	value: T,
	raw: Vec<u8>,
}

impl<T> Versioned<T> {
	pub fn value(&self) -> &T {
		&self.value
	}

	pub fn into_inner(self) -> T {
		self.value
	}
}

/// Builder for a conditional, atomic write.
#[derive(Debug, Default)]
pub struct Transaction {
	batch: WriteBatch,
}

impl Transaction {
	pub fn new() -> Self {
		Self::default()
	}

	/// Requires the stored value to still be exactly what `read` was decoded from.
	pub fn expect_unchanged<T>(mut self, namespace: &str, id: &str, read: &Versioned<T>) -> Self {
		self.batch.preconditions.push(Precondition {
			key: make_key(namespace, id),
			expected: Some(read.raw.clone()),
		});
		self
	}

	/// Requires the key to be absent.
	pub fn expect_absent(mut self, namespace: &str, id: &str) -> Self {
		self.batch.preconditions.push(Precondition {
			key: make_key(namespace, id),
			expected: None,
		});
		self
	}

	/// Serializes and writes `data`.
	pub fn put<T: Serialize>(
		mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<Self, StorageError> {
		let value =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.batch.mutations.push(Mutation::Put {
			key: make_key(namespace, id),
			value,
		});
		Ok(self)
	}

	/// Removes the key.
	pub fn remove(mut self, namespace: &str, id: &str) -> Self {
		self.batch.mutations.push(Mutation::Delete {
			key: make_key(namespace, id),
		});
		self
	}

	pub fn into_batch(self) -> WriteBatch {
		self.batch
	}
}

/// High-level storage service that provides typed operations.
///
/// Values are serialized as JSON. The namespace and id are combined into the
/// backend key.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		self.retrieve_versioned(namespace, id)
			.await
			.map(Versioned::into_inner)
	}

	/// Retrieves a value along with its version token for a later [`Transaction`].
	pub async fn retrieve_versioned<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Versioned<T>, StorageError> {
		let raw = self.backend.get_bytes(&make_key(namespace, id)).await?;
		let value =
			serde_json::from_slice(&raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok(Versioned { value, raw })
	}

	/// Retrieves every value whose id starts with `id_prefix`, ordered by key.
	///
	/// An empty prefix returns the whole namespace.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id_prefix: &str,
	) -> Result<Vec<T>, StorageError> {
		let keys = self
			.backend
			.list_keys(&make_key(namespace, id_prefix))
			.await?;
		let mut values = Vec::with_capacity(keys.len());
		for key in keys {
			let bytes = match self.backend.get_bytes(&key).await {
				Ok(bytes) => bytes,
				// Removed between listing and reading.
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			};
			values.push(
				serde_json::from_slice(&bytes)
					.map_err(|e| StorageError::Serialization(e.to_string()))?,
			);
		}
		Ok(values)
	}

	/// Applies a transaction atomically.
	///
	/// Returns [`StorageError::Conflict`] without writing anything when a
	/// precondition no longer holds. A backend failure also leaves nothing
	/// written.
	pub async fn commit(&self, transaction: Transaction) -> Result<(), StorageError> {
		self.backend.commit(transaction.into_batch()).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Item {
		name: String,
		count: u32,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	async fn put(storage: &StorageService, namespace: &str, id: &str, item: &Item) {
		let tx = Transaction::new().put(namespace, id, item).unwrap();
		storage.commit(tx).await.unwrap();
	}

	#[tokio::test]
	async fn test_typed_round_trip_and_listing() {
		let storage = service();
		let a = Item {
			name: "a".into(),
			count: 1,
		};
		let b = Item {
			name: "b".into(),
			count: 2,
		};
		put(&storage, "items", "2", &b).await;
		put(&storage, "items", "1", &a).await;
		put(&storage, "other", "1", &a).await;

		let item: Item = storage.retrieve("items", "1").await.unwrap();
		assert_eq!(item, a);

		let all: Vec<Item> = storage.retrieve_all("items", "").await.unwrap();
		assert_eq!(all, vec![a.clone(), b]);

		storage
			.commit(Transaction::new().remove("items", "1"))
			.await
			.unwrap();
		assert!(matches!(
			storage.retrieve::<Item>("items", "1").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_commit_rejects_stale_version() {
		let storage = service();
		let item = Item {
			name: "a".into(),
			count: 1,
		};
		put(&storage, "items", "1", &item).await;

		let first = storage.retrieve_versioned::<Item>("items", "1").await.unwrap();
		let second = storage.retrieve_versioned::<Item>("items", "1").await.unwrap();

		let mut updated = first.value().clone();
		updated.count = 2;
		let tx = Transaction::new()
			.expect_unchanged("items", "1", &first)
			.put("items", "1", &updated)
			.unwrap();
		storage.commit(tx).await.unwrap();

		// The second reader still holds the old bytes.
		let mut stale = second.value().clone();
		stale.count = 3;
		let tx = Transaction::new()
			.expect_unchanged("items", "1", &second)
			.put("items", "1", &stale)
			.unwrap()
			.put("log", "1", &"should not be written")
			.unwrap();
		let err = storage.commit(tx).await.unwrap_err();
		assert!(matches!(err, StorageError::Conflict(key) if key == "items:1"));

		let current: Item = storage.retrieve("items", "1").await.unwrap();
		assert_eq!(current.count, 2);
		assert!(matches!(
			storage.retrieve::<String>("log", "1").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_expect_absent() {
		let storage = service();
		let tx = Transaction::new()
			.expect_absent("index", "a@example.com")
			.put("index", "a@example.com", &"user-1")
			.unwrap();
		storage.commit(tx).await.unwrap();

		let tx = Transaction::new()
			.expect_absent("index", "a@example.com")
			.put("index", "a@example.com", &"user-2")
			.unwrap();
		assert!(matches!(
			storage.commit(tx).await,
			Err(StorageError::Conflict(_))
		));
		let owner: String = storage.retrieve("index", "a@example.com").await.unwrap();
		assert_eq!(owner, "user-1");
	}
}
