//! Mock implementations of the Rill store contract.

pub mod store;

pub use store::*;
