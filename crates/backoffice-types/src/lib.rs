//! Common types for the backoffice system.
//!
//! This crate defines the business records (customers, orders, users), the
//! shared record header carrying audit and soft-delete state, the access
//! vocabulary used by the policy, and the configuration validation framework
//! shared by pluggable backends.

/// Access vocabulary: roles, entity kinds, operations and the acting user.
pub mod access;
/// API error types for HTTP endpoints.
pub mod api;
/// Audit trail records.
pub mod audit;
/// Customer records and their inputs.
pub mod customer;
/// Order records, statuses and their inputs.
pub mod order;
/// Record header, the `Record` trait and list queries.
pub mod record;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// User records and their inputs.
pub mod user;
/// Configuration validation types for pluggable backends.
pub mod validation;

mod serde_helpers;

pub use access::*;
pub use api::*;
pub use audit::*;
pub use customer::*;
pub use order::*;
pub use record::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use user::*;
pub use validation::*;
