use crate::runtime::blueprint::NodeIndex;

/// Cross-graph request raised while a node or the scheduler is running.
///
/// Requests are buffered and applied by the engine after the current step,
/// so a running instance never re-enters the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start {
        graph_id: String,
        start_index: NodeIndex,
        add_to_skip_queue: bool,
        skip: bool,
    },
    Kill { graph_id: String },
    Pause { graph_id: String },
    Resume { graph_id: String, rerun: bool },
    Skip { graph_id: String },
}

#[derive(Debug, Default)]
pub struct Syscall {
    pending: Vec<Command>,
}

impl Syscall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start another graph. With `skip` set it runs to completion instantly.
    pub fn start(&mut self, graph_id: impl Into<String>, start_index: NodeIndex, add_to_skip_queue: bool, skip: bool) {
        self.pending.push(Command::Start {
            graph_id: graph_id.into(),
            start_index,
            add_to_skip_queue,
            skip,
        });
    }

    pub fn kill(&mut self, graph_id: impl Into<String>) {
        self.pending.push(Command::Kill { graph_id: graph_id.into() });
    }

    pub fn pause(&mut self, graph_id: impl Into<String>) {
        self.pending.push(Command::Pause { graph_id: graph_id.into() });
    }

    pub fn resume(&mut self, graph_id: impl Into<String>, rerun: bool) {
        self.pending.push(Command::Resume { graph_id: graph_id.into(), rerun });
    }

    pub fn skip(&mut self, graph_id: impl Into<String>) {
        self.pending.push(Command::Skip { graph_id: graph_id.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Command] {
        &self.pending
    }

    pub(crate) fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending)
    }
}
