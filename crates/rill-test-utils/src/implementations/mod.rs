//! Test implementations (fakes) of the Rill engine contract.
//!
//! These implementations provide higher-fidelity testing capabilities than
//! mocks, but still operate in-memory for testability.

pub mod scripted_runtime;

pub use scripted_runtime::*;
