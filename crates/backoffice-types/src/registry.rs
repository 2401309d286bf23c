//! Registry trait for self-registering implementations.
//!
//! Every pluggable backend module exposes a `Registry` struct implementing
//! this trait, so the binary can assemble its factory map without knowing
//! each implementation's constructor.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// for example `"memory"` for `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
