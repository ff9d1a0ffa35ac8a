/// Typed business records
pub mod model;

/// Record <-> variable store binding
pub mod binder;

/// Work item projection, policies and transitions
pub mod work_item;

/// Error snapshot and recovery
pub mod process_error;

/// Domain events
pub mod events;

/// Store contract
pub mod repository;

/// Compiled process definitions
pub mod process;

/// Process instance state machine
pub mod process_instance;
