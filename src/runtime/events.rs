use std::fmt;
use tracing::debug;
use crate::runtime::blueprint::NodeIndex;
use crate::runtime::context::InstanceId;

/// Lifecycle notifications for running lists.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent {
    Begin { instance_id: InstanceId, graph_id: String, start_index: NodeIndex },
    /// Fired exactly once per run, whether it completed or was killed.
    End { instance_id: InstanceId, graph_id: String, killed: bool },
    Pause { instance_id: InstanceId, graph_id: String, resume_indices: Vec<NodeIndex> },
    Resume { instance_id: InstanceId, graph_id: String },
    Skip { instance_id: InstanceId, graph_id: String, start_index: NodeIndex },
    ConversationOnEnd { instance_id: InstanceId, graph_id: String, conversation: String },
}

impl ListEvent {
    pub fn instance_id(&self) -> InstanceId {
        match self {
            ListEvent::Begin { instance_id, .. }
            | ListEvent::End { instance_id, .. }
            | ListEvent::Pause { instance_id, .. }
            | ListEvent::Resume { instance_id, .. }
            | ListEvent::Skip { instance_id, .. }
            | ListEvent::ConversationOnEnd { instance_id, .. } => *instance_id,
        }
    }

    pub fn graph_id(&self) -> &str {
        match self {
            ListEvent::Begin { graph_id, .. }
            | ListEvent::End { graph_id, .. }
            | ListEvent::Pause { graph_id, .. }
            | ListEvent::Resume { graph_id, .. }
            | ListEvent::Skip { graph_id, .. }
            | ListEvent::ConversationOnEnd { graph_id, .. } => graph_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ListEvent::Begin { .. } => "begin",
            ListEvent::End { .. } => "end",
            ListEvent::Pause { .. } => "pause",
            ListEvent::Resume { .. } => "resume",
            ListEvent::Skip { .. } => "skip",
            ListEvent::ConversationOnEnd { .. } => "conversation_on_end",
        }
    }
}

pub type Observer = Box<dyn FnMut(&ListEvent) + Send>;

/// Named observers, called synchronously in registration order.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<(String, Observer)>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. A second observer with the same name replaces the first.
    pub fn register_observer<F>(&mut self, name: impl Into<String>, observer: F)
    where
        F: FnMut(&ListEvent) + Send + 'static,
    {
        let name = name.into();
        let observer: Observer = Box::new(observer);
        match self.observers.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = observer,
            None => self.observers.push((name, observer)),
        }
    }

    pub fn remove_observer(&mut self, name: &str) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(n, _)| n != name);
        before != self.observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn emit(&mut self, event: ListEvent) {
        debug!(event = event.name(), instance_id = %event.instance_id(), graph = event.graph_id(), "List event");
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[test]
    fn observers_replace_by_name() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let first = seen.clone();
        bus.register_observer("ui", move |e| first.lock().unwrap().push(format!("first:{}", e.name())));
        let second = seen.clone();
        bus.register_observer("ui", move |e| second.lock().unwrap().push(format!("second:{}", e.name())));

        bus.emit(ListEvent::Resume { instance_id: Uuid::new_v4(), graph_id: "intro".into() });

        assert_eq!(bus.observer_count(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["second:resume".to_string()]);
        assert!(bus.remove_observer("ui"));
        assert!(!bus.remove_observer("ui"));
    }
}
