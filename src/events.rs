//! Change notifications published by the rule store

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEvent {
    /// Description of the rule open for editing changed
    DescriptionChanged(String),
    /// Warning state of the rule open for editing changed
    WarningChanged(bool),
    /// One field of the rule open for editing changed
    DataChanged { key: &'static str },
    /// Rules were added, removed, reordered, loaded or imported
    RuleBookChanged,
    EditingIndexChanged(Option<usize>),
    Saved,
}

/// Fan-out of [`RuleEvent`]s to any number of channel subscribers
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<RuleEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<RuleEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Send to every live subscriber, dropping those whose receiver is gone
    pub fn emit(&mut self, event: RuleEvent) {
        trace!(event = ?event, subscribers = self.subscribers.len(), "Emitting rule event");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
