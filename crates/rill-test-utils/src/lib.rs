//! Testing utilities for Rill.
//!
//! This crate provides the testing utilities shared by the Rill crates:
//! a scripted execution engine (fake), mocks of the store contract,
//! assertion helpers for process instances and units of work, and tracing
//! setup for tests.

pub mod assertions;
pub mod implementations;
pub mod mocks;
pub mod util;

/// Re-export commonly used types for convenience
pub use mockall;

pub use implementations::{ProcessScript, ScriptedRuntime, Step};
pub use util::{init_tracing, init_tracing_with};
