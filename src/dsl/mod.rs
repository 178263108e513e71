pub mod builder;

use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use crate::runtime::blueprint::ListSettings;
use crate::runtime::parameter::Parameter;

/// A graph as authored in YAML. Nodes refer to each other by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphDoc {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Id of the node a plain trigger starts at. Defaults to the first node.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub settings: ListSettings,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub nodes: Vec<NodeDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDoc {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    /// One entry per output socket: `continue`, `stop`, `goto:<node>` or `run:<graph>`.
    #[serde(default = "continue_only")]
    pub outputs: Vec<String>,
}

fn enabled() -> bool {
    true
}

fn continue_only() -> Vec<String> {
    vec!["continue".to_string()]
}
