//! State management for orders.
//!
//! This module holds the order lifecycle table and the state machine that
//! applies status changes to stored orders.

pub mod order;

pub use order::{is_valid_transition, lifecycle_edges, OrderStateMachine};
