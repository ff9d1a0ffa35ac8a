/// Contract of the execution-engine collaborator
pub mod runtime_interface;

/// Completion listener channel
pub mod completion;

/// Deferred store mutations
pub mod unit_of_work;
