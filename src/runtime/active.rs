use tracing::{debug, warn};
use crate::runtime::blueprint::NodeIndex;
use crate::runtime::context::InstanceId;
use crate::runtime::list::ActionList;
use crate::runtime::parameter::{escape_literal, unescape_literal};

/// Separates the fields of one save record.
pub const RECORD_DELIMITER: char = ':';
/// Separates records in a save batch.
pub const RECORD_SEPARATOR: char = '|';
/// Separates entries of a parameter snapshot.
pub const ENTRY_DELIMITER: char = ';';
/// Separates resume indices inside a record.
pub const INDEX_DELIMITER: char = ']';

/// Registry record for one list instance: enough to skip it, resume it, or persist it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActiveList {
    pub graph_id: String,
    /// Live instance. `None` for records restored from a save.
    pub instance_id: Option<InstanceId>,
    pub in_skip_queue: bool,
    pub is_running: bool,
    pub resume_indices: Vec<NodeIndex>,
    pub start_index: NodeIndex,
    pub conversation_on_end: Option<String>,
    pub parameter_data: String,
}

/// A queued skip taken out of the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipRequest {
    pub graph_id: String,
    pub instance_id: Option<InstanceId>,
    pub start_index: NodeIndex,
    pub conversation_on_end: Option<String>,
}

impl ActiveList {
    pub fn new(graph_id: impl Into<String>, instance_id: InstanceId) -> Self {
        Self {
            graph_id: graph_id.into(),
            instance_id: Some(instance_id),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_paused(&self) -> bool {
        !self.is_running && !self.resume_indices.is_empty()
    }

    /// Records that are neither running, queued, nor resumable can be dropped.
    pub fn is_necessary(&self) -> bool {
        self.is_running || self.in_skip_queue || !self.resume_indices.is_empty()
    }

    /// Halts the instance without firing lifecycle events.
    pub fn reset(&mut self, list: Option<&mut ActionList>, remove_from_skip_queue: bool) {
        self.is_running = false;
        if let Some(list) = list {
            list.halt();
        }
        if remove_from_skip_queue {
            self.in_skip_queue = false;
        }
    }

    /// Takes the record out of the skip queue. Returns what to skip, if it was queued.
    pub fn skip(&mut self) -> Option<SkipRequest> {
        if !self.in_skip_queue {
            return None;
        }
        self.in_skip_queue = false;
        Some(SkipRequest {
            graph_id: self.graph_id.clone(),
            instance_id: self.instance_id,
            start_index: self.start_index,
            conversation_on_end: self.conversation_on_end.clone(),
        })
    }

    /// Serialises the record. Running records are not persisted.
    ///
    /// Layout: `graph:i1]i2:start:skip:running:conversation:parameters`.
    pub fn save_data(&self) -> Option<String> {
        if self.is_running {
            debug!(graph = %self.graph_id, "Running list is not saved");
            return None;
        }
        if self.graph_id.is_empty() {
            return None;
        }
        let indices = self
            .resume_indices
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(&INDEX_DELIMITER.to_string());
        let conversation = self.conversation_on_end.as_deref().map(escape_literal).unwrap_or_default();
        let d = RECORD_DELIMITER;
        Some(format!(
            "{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}",
            escape_literal(&self.graph_id),
            indices,
            self.start_index,
            flag(self.in_skip_queue),
            flag(self.is_running),
            conversation,
            self.parameter_data,
        ))
    }

    /// Parses one record. Unparsable numbers read as zero; a record without a graph is rejected.
    pub fn load_data(data: &str) -> Option<ActiveList> {
        let fields: Vec<&str> = data.split(RECORD_DELIMITER).collect();
        let graph_id = unescape_literal(fields[0].trim());
        if graph_id.is_empty() {
            warn!(record = data, "Save record has no graph id, ignored");
            return None;
        }
        if fields.len() > 7 {
            warn!(record = data, "Save record has extra fields, ignored them");
        }

        let field = |i: usize| fields.get(i).copied().unwrap_or_default();
        let resume_indices = field(1)
            .split(INDEX_DELIMITER)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().unwrap_or(0))
            .collect();
        let conversation = field(5);

        Some(ActiveList {
            graph_id,
            instance_id: None,
            resume_indices,
            start_index: field(2).parse().unwrap_or(0),
            in_skip_queue: field(3) == "1",
            is_running: field(4) == "1",
            conversation_on_end: (!conversation.is_empty()).then(|| unescape_literal(conversation)),
            parameter_data: field(6).to_string(),
        })
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn paused_record_layout() {
        let mut record = ActiveList::new("intro", Uuid::new_v4());
        record.resume_indices = vec![2, 5];
        record.start_index = 1;
        record.in_skip_queue = true;
        record.conversation_on_end = Some("talk:2".into());
        record.parameter_data = "1=7;2=hello".into();

        assert_eq!(record.save_data().unwrap(), "intro:2]5:1:1:0:talk*COLON*2:1=7;2=hello");
    }

    #[test]
    fn running_records_are_not_saved() {
        let mut record = ActiveList::new("intro", Uuid::new_v4());
        record.is_running = true;
        assert_eq!(record.save_data(), None);
    }

    #[test]
    fn load_tolerates_garbage_numbers() {
        let record = ActiveList::load_data("outro:x]3:abc:1:0::").unwrap();
        assert_eq!(record.graph_id, "outro");
        assert_eq!(record.resume_indices, vec![0, 3]);
        assert_eq!(record.start_index, 0);
        assert!(record.in_skip_queue);
        assert_eq!(record.instance_id, None);
        assert_eq!(record.conversation_on_end, None);
        assert!(ActiveList::load_data(":1:0:0:0::").is_none());
    }

    #[test]
    fn skip_consumes_queue_membership() {
        let mut record = ActiveList::new("intro", Uuid::new_v4());
        record.in_skip_queue = true;
        record.start_index = 4;
        let request = record.skip().unwrap();
        assert_eq!(request.start_index, 4);
        assert!(record.skip().is_none());
        assert!(!record.is_necessary());
    }
}
