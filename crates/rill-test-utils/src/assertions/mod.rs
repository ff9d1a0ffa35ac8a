//! Assertion utilities for process instances and units of work.

mod process_state;

pub use process_state::*;
