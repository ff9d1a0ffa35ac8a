//! Completion listener
//!
//! An instance registers an event type with its engine handle together with
//! the sending half of a channel. When some other operation drives the
//! instance to completion the engine posts a [`CompletionEvent`]; the owner
//! dispatches it into finish bookkeeping on its own call stack.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use super::runtime_interface::EngineProcessInstance;
use crate::ProcessInstanceStatus;

/// Prefix of the completion event type
pub const COMPLETION_EVENT_PREFIX: &str = "instance-completed:";

/// Sending half handed to the engine
pub type CompletionSender = UnboundedSender<CompletionEvent>;

/// Event type a process instance listens on
pub fn completion_event_type(process_instance_id: &str) -> String {
    format!("{}{}", COMPLETION_EVENT_PREFIX, process_instance_id)
}

/// Posted by the engine when an instance reaches completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    /// Event type the listener was registered under
    pub event_type: String,
    /// Completed instance
    pub process_instance_id: String,
    /// State observed by the engine when posting
    pub status: ProcessInstanceStatus,
}

pub(crate) struct CompletionListener {
    process_instance_id: String,
    event_type: String,
    sender: CompletionSender,
    receiver: UnboundedReceiver<CompletionEvent>,
    registered: bool,
}

impl CompletionListener {
    pub(crate) fn new(process_instance_id: &str) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            process_instance_id: process_instance_id.to_string(),
            event_type: completion_event_type(process_instance_id),
            sender,
            receiver,
            registered: false,
        }
    }

    pub(crate) fn process_instance_id(&self) -> &str {
        &self.process_instance_id
    }

    pub(crate) fn event_type(&self) -> &str {
        &self.event_type
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn register(&mut self, handle: &dyn EngineProcessInstance) {
        handle.add_event_listener(&self.event_type, self.sender.clone());
        self.registered = true;
        trace!(event_type = %self.event_type, "Registered completion listener");
    }

    pub(crate) fn unregister(&mut self, handle: &dyn EngineProcessInstance) {
        handle.remove_event_listener(&self.event_type);
        self.registered = false;
        trace!(event_type = %self.event_type, "Removed completion listener");
    }

    /// Discard every pending event, returning how many there were
    pub(crate) fn drain(&mut self) -> usize {
        let mut pending = 0;
        while let Ok(event) = self.receiver.try_recv() {
            if event.event_type == self.event_type {
                pending += 1;
            }
        }
        pending
    }
}
