use serde::{Deserialize, Serialize};
use crate::runtime::blueprint::NodeIndex;

/// What happens after a node finishes through one of its output sockets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Ending {
    /// Dispatch the next node in the array.
    #[default]
    Continue,
    /// Finish this branch.
    Stop,
    /// Jump to another node of the same graph.
    SkipTo(NodeIndex),
    /// Hand off to another graph. Naming the owning graph restarts it.
    RunGraph(String),
}

impl Ending {
    pub fn skip_to(target: NodeIndex) -> Self {
        Ending::SkipTo(target)
    }

    pub fn run_graph(graph_id: impl Into<String>) -> Self {
        Ending::RunGraph(graph_id.into())
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Ending::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_continue() {
        assert_eq!(Ending::default(), Ending::Continue);
    }

    #[test]
    fn json_shape_is_stable() {
        let endings = vec![Ending::Continue, Ending::skip_to(3), Ending::run_graph("outro")];
        let text = serde_json::to_string(&endings).unwrap();
        assert_eq!(text, r#"["Continue",{"SkipTo":3},{"RunGraph":"outro"}]"#);
    }
}
