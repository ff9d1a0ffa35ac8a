//! In-memory process instance store for Rill
//!
//! This crate provides an in-memory implementation of the
//! [`MutableProcessInstances`](rill_core::MutableProcessInstances) store
//! contract. It is primarily useful for development, testing, and simple
//! deployments where persistence is not required.

pub mod repositories;
pub use repositories::{InMemoryProcessInstances, SharedViews};
