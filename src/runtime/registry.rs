use tracing::{debug, info};
use crate::runtime::active::{ActiveList, SkipRequest, RECORD_SEPARATOR};
use crate::runtime::blueprint::NodeIndex;
use crate::runtime::context::InstanceId;

/// Global table of live and resumable lists, in registration order.
#[derive(Debug, Default)]
pub struct ActiveListManager {
    lists: Vec<ActiveList>,
}

impl ActiveListManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ActiveList] {
        &self.lists
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn record(&self, instance_id: InstanceId) -> Option<&ActiveList> {
        self.lists.iter().find(|r| r.instance_id == Some(instance_id))
    }

    pub fn record_mut(&mut self, instance_id: InstanceId) -> Option<&mut ActiveList> {
        self.lists.iter_mut().find(|r| r.instance_id == Some(instance_id))
    }

    /// Registers a started instance, updating its record if it already has one.
    pub fn add_to_list(
        &mut self,
        instance_id: InstanceId,
        graph_id: &str,
        start_index: NodeIndex,
        add_to_skip_queue: bool,
        conversation_on_end: Option<String>,
    ) {
        let record = match self.lists.iter().position(|r| r.instance_id == Some(instance_id)) {
            Some(pos) => &mut self.lists[pos],
            None => {
                self.lists.push(ActiveList::new(graph_id, instance_id));
                let last = self.lists.len() - 1;
                &mut self.lists[last]
            }
        };
        record.is_running = true;
        record.in_skip_queue = add_to_skip_queue;
        record.start_index = start_index;
        record.resume_indices.clear();
        record.parameter_data.clear();
        record.conversation_on_end = conversation_on_end;
        debug!(instance_id = %instance_id, graph = graph_id, skip_queue = add_to_skip_queue, "Registered list");
    }

    pub fn mark_paused(&mut self, instance_id: InstanceId, resume_indices: Vec<NodeIndex>, parameter_data: String) {
        if let Some(record) = self.record_mut(instance_id) {
            record.is_running = false;
            record.resume_indices = resume_indices;
            record.parameter_data = parameter_data;
        }
    }

    /// Drops the record of a finished or killed instance.
    pub fn end_list(&mut self, instance_id: InstanceId) {
        self.lists.retain(|r| r.instance_id != Some(instance_id));
    }

    /// The instance is registered and marked running.
    pub fn is_live(&self, instance_id: InstanceId) -> bool {
        self.record(instance_id).is_some_and(ActiveList::is_running)
    }

    pub fn is_graph_running(&self, graph_id: &str) -> bool {
        self.lists.iter().any(|r| r.graph_id == graph_id && r.is_running)
    }

    pub fn is_in_skip_queue(&self, instance_id: InstanceId) -> bool {
        self.record(instance_id).is_some_and(|r| r.in_skip_queue)
    }

    /// Empties the skip queue in registration order.
    pub fn take_skip_queue(&mut self) -> Vec<SkipRequest> {
        let requests: Vec<SkipRequest> = self.lists.iter_mut().filter_map(ActiveList::skip).collect();
        self.purge();
        requests
    }

    /// Removes the first restored (instance-less) paused record of a graph.
    pub fn take_detached_paused(&mut self, graph_id: &str) -> Option<ActiveList> {
        let pos = self
            .lists
            .iter()
            .position(|r| r.instance_id.is_none() && r.graph_id == graph_id && r.is_paused())?;
        Some(self.lists.remove(pos))
    }

    pub fn remove_detached(&mut self, graph_id: &str) -> usize {
        let before = self.lists.len();
        self.lists.retain(|r| r.instance_id.is_some() || r.graph_id != graph_id);
        before - self.lists.len()
    }

    pub fn purge(&mut self) {
        self.lists.retain(ActiveList::is_necessary);
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }

    pub fn save_data(&self) -> String {
        self.lists
            .iter()
            .filter_map(ActiveList::save_data)
            .collect::<Vec<_>>()
            .join(&RECORD_SEPARATOR.to_string())
    }

    /// Replaces every record with those parsed from `data`.
    pub fn load_data(&mut self, data: &str) {
        self.lists = data
            .split(RECORD_SEPARATOR)
            .filter(|chunk| !chunk.trim().is_empty())
            .filter_map(ActiveList::load_data)
            .filter(|r| !r.is_running || r.in_skip_queue)
            .map(|mut r| {
                r.is_running = false;
                r
            })
            .filter(ActiveList::is_necessary)
            .collect();
        info!(records = self.lists.len(), "Loaded active lists");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn save_skips_running_and_joins_records() {
        let mut manager = ActiveListManager::new();
        let running = Uuid::new_v4();
        let paused = Uuid::new_v4();
        manager.add_to_list(running, "a", 0, true, None);
        manager.add_to_list(paused, "b", 0, true, None);
        manager.mark_paused(paused, vec![3], "1=2".into());

        assert_eq!(manager.save_data(), "b:3:0:1:0::1=2");

        let mut restored = ActiveListManager::new();
        restored.load_data(&format!("{}|", manager.save_data()));
        assert_eq!(restored.len(), 1);
        assert!(restored.records()[0].is_paused());
        assert!(restored.take_detached_paused("b").is_some());
        assert!(restored.is_empty());
    }

    #[test]
    fn skip_queue_is_taken_once() {
        let mut manager = ActiveListManager::new();
        let id = Uuid::new_v4();
        manager.add_to_list(id, "a", 2, true, Some("chat".into()));
        let requests = manager.take_skip_queue();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].conversation_on_end.as_deref(), Some("chat"));
        assert!(manager.take_skip_queue().is_empty());
        assert!(manager.is_live(id));
    }
}
