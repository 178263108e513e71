use thiserror::Error;
use crate::runtime::blueprint::NodeIndex;
use crate::runtime::context::InstanceId;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("graph not found: {0}")]
    UnknownGraph(String),
    #[error("instance not found: {0}")]
    UnknownInstance(InstanceId),
    #[error("graph {0} is disabled")]
    Disabled(String),
    #[error("no definition for node kind {kind} (graph {graph}, node {index})")]
    UnknownNodeKind { graph: String, index: NodeIndex, kind: String },
    #[error("invalid node {index} in graph {graph}: {reason}")]
    InvalidNode { graph: String, index: NodeIndex, reason: String },
}
