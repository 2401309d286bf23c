//! File-based storage backend implementation.
//!
//! Each key is stored as one file under the configured directory. A commit
//! first writes every new value to a staging file, then renames the staged
//! files into place. A failure while staging leaves the stored files
//! untouched; a failure while renaming restores the files already replaced.

use crate::{Mutation, StorageError, StorageFactory, StorageInterface, StorageRegistry, WriteBatch};
use async_trait::async_trait;
use backoffice_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

const DEFAULT_STORAGE_PATH: &str = "./data/storage";
const EXTENSION: &str = "bin";

/// Fixed-size file header.
///
/// Binary layout (16 bytes total):
/// - [0-3]: Magic bytes "BOFS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-15]: Reserved
#[derive(Debug, Clone)]
struct FileHeader {
	version: u16,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"BOFS";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn current() -> Self {
		Self {
			version: Self::VERSION,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Bad magic bytes".into()));
		}
		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}
		Ok(Self { version })
	}
}

/// Encodes a key into a file stem: `[A-Za-z0-9_-]` pass through, every other
/// byte becomes `%XX`.
fn encode_key(key: &str) -> String {
	let mut out = String::with_capacity(key.len());
	for byte in key.bytes() {
		if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
			out.push(byte as char);
		} else {
			out.push_str(&format!("%{:02X}", byte));
		}
	}
	out
}

fn decode_key(stem: &str) -> Option<String> {
	let bytes = stem.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			let hex = stem.get(i + 1..i + 3)?;
			out.push(u8::from_str_radix(hex, 16).ok()?);
			i += 3;
		} else {
			out.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(out).ok()
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Commits hold the write side for their whole check-stage-publish step,
	/// readers the read side, so no reader observes part of a batch.
	lock: RwLock<()>,
}

/// Final contents per key after a batch; `None` removes the key.
type NetEffect = BTreeMap<String, Option<Vec<u8>>>;

fn backend_error(err: std::io::Error) -> StorageError {
	StorageError::Backend(err.to_string())
}

/// Reads a whole file, header included. A missing file reads as `None`.
async fn read_file(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
	match fs::read(path).await {
		Ok(data) => Ok(Some(data)),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e),
	}
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
	match fs::remove_file(path).await {
		Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
		_ => Ok(()),
	}
}

/// Collapses a batch so that the last mutation of each key wins.
fn net_effect(mutations: Vec<Mutation>) -> NetEffect {
	let mut effect = NetEffect::new();
	for mutation in mutations {
		match mutation {
			Mutation::Put { key, value } => effect.insert(key, Some(value)),
			Mutation::Delete { key } => effect.insert(key, None),
		};
	}
	effect
}

impl FileStorage {
	/// Creates a new FileStorage instance rooted at `base_path`.
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			lock: RwLock::new(()),
		}
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path
			.join(format!("{}.{}", encode_key(key), EXTENSION))
	}

	/// Where a key's new contents wait until the whole batch is staged.
	fn staging_path(&self, key: &str) -> PathBuf {
		self.get_file_path(key).with_extension("tmp")
	}

	async fn read_value(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		let Some(data) = read_file(&self.get_file_path(key))
			.await
			.map_err(backend_error)?
		else {
			return Ok(None);
		};
		FileHeader::deserialize(&data)?;
		Ok(Some(data[FileHeader::SIZE..].to_vec()))
	}

	/// Writes every new value of the batch to its staging file.
	///
	/// Nothing visible changes here. On failure every staging file of the
	/// batch is removed again.
	async fn stage(&self, effect: &NetEffect) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(backend_error)?;

		for (key, value) in effect {
			let Some(value) = value else {
				continue;
			};
			let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
			file_data.extend_from_slice(&FileHeader::current().serialize());
			file_data.extend_from_slice(value);

			if let Err(e) = fs::write(self.staging_path(key), file_data).await {
				self.discard_staged(effect).await;
				return Err(backend_error(e));
			}
		}
		Ok(())
	}

	/// Moves staged files into place and removes deleted keys.
	///
	/// If a step fails, the keys already changed get their previous contents
	/// back before the error is returned.
	async fn publish(&self, effect: &NetEffect) -> Result<(), StorageError> {
		let mut applied: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(effect.len());
		for (key, value) in effect {
			let path = self.get_file_path(key);
			match self.apply_one(key, value.is_some(), &path).await {
				Ok(previous) => applied.push((path, previous)),
				Err(e) => {
					self.roll_back(applied).await;
					self.discard_staged(effect).await;
					return Err(backend_error(e));
				},
			}
		}
		Ok(())
	}

	/// Replaces or removes one file, returning what it held before.
	async fn apply_one(
		&self,
		key: &str,
		staged: bool,
		path: &Path,
	) -> std::io::Result<Option<Vec<u8>>> {
		let previous = read_file(path).await?;
		if staged {
			fs::rename(self.staging_path(key), path).await?;
		} else {
			remove_if_exists(path).await?;
		}
		Ok(previous)
	}

	async fn roll_back(&self, applied: Vec<(PathBuf, Option<Vec<u8>>)>) {
		for (path, previous) in applied.into_iter().rev() {
			let restored = match previous {
				Some(data) => fs::write(&path, data).await,
				None => remove_if_exists(&path).await,
			};
			if let Err(e) = restored {
				tracing::error!("Failed to restore {:?} after a failed commit: {}", path, e);
			}
		}
	}

	async fn discard_staged(&self, effect: &NetEffect) {
		for key in effect.keys() {
			// Staging paths taken by something other than a file are left alone.
			let _ = fs::remove_file(self.staging_path(key)).await;
		}
	}

	fn key_from_path(path: &Path) -> Option<String> {
		if path.extension()? != EXTENSION {
			return None;
		}
		decode_key(path.file_stem()?.to_str()?)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let _guard = self.lock.read().await;
		self.read_value(key).await?.ok_or(StorageError::NotFound)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let _guard = self.lock.read().await;
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend_error(e)),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend_error)? {
			let path = entry.path();
			match Self::key_from_path(&path) {
				Some(key) if key.starts_with(prefix) => keys.push(key),
				Some(_) => {},
				None => tracing::debug!("Skipping unrecognized file {:?}", path),
			}
		}
		keys.sort();
		Ok(keys)
	}

	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		let _guard = self.lock.write().await;

		for precondition in &batch.preconditions {
			let current = self.read_value(&precondition.key).await?;
			if current != precondition.expected {
				return Err(StorageError::Conflict(precondition.key.clone()));
			}
		}

		let effect = net_effect(batch.mutations);
		self.stage(&effect).await?;
		self.publish(&effect).await?;

		tracing::debug!(
			"Committed {} key(s) under {:?}",
			effect.len(),
			self.base_path
		);
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if path.trim().is_empty() => {
							Err("storage_path cannot be empty".to_string())
						},
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
