//! Storage-related types for the backoffice system.

/// Storage namespaces for the different record collections.
///
/// Keys in the backend have the form `<namespace>:<id>[:<suffix>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Customer records
	Customers,
	/// Order records
	Orders,
	/// User records
	Users,
	/// Maps a normalized email address to a user id
	UserByEmail,
	/// Append-only audit records, keyed by entity id and sequence
	Audit,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Customers => "customers",
			StorageKey::Orders => "orders",
			StorageKey::Users => "users",
			StorageKey::UserByEmail => "user_by_email",
			StorageKey::Audit => "audit",
		}
	}
}
