//! Core of the backoffice service.
//!
//! This crate holds the business rules shared by every caller: the order
//! lifecycle state machine, the role-based access policy, soft delete with
//! restore, and the audit trail written alongside every mutation. The
//! [`BackofficeEngine`] exposes them as one set of operations, and the
//! [`EngineBuilder`] assembles an engine from configuration.

pub mod access;
pub mod builder;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod state;
pub mod store;
pub mod utils;

pub use access::{AccessPolicy, PolicyError};
pub use builder::{BuilderError, EngineBuilder};
pub use engine::{BackofficeEngine, EntityRecord};
pub use error::ServiceError;
pub use state::{is_valid_transition, lifecycle_edges, OrderStateMachine};
