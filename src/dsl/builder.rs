use std::collections::HashMap;
use serde_json::Value;
use crate::dsl::{GraphDoc, NodeDoc};
use crate::runtime::blueprint::{ListMode, ListSettings};
use crate::runtime::parameter::{Parameter, ParameterValue};

pub struct GraphBuilder {
    id: String,
    name: String,
    start: Option<String>,
    settings: ListSettings,
    parameters: Vec<Parameter>,
    pub nodes: Vec<NodeDoc>, // Public so tests can tweak nodes after building
}

impl GraphBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            start: None,
            settings: ListSettings::default(),
            parameters: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn start(mut self, node_id: &str) -> Self {
        self.start = Some(node_id.to_string());
        self
    }

    pub fn background(mut self) -> Self {
        self.settings.mode = ListMode::RunInBackground;
        self
    }

    pub fn unskippable(mut self) -> Self {
        self.settings.skippable = false;
        self
    }

    pub fn multi_instance(mut self) -> Self {
        self.settings.multi_instance = true;
        self
    }

    pub fn survive_scene_change(mut self) -> Self {
        self.settings.survive_scene_change = true;
        self
    }

    pub fn start_delay(mut self, seconds: f32) -> Self {
        self.settings.start_delay = seconds;
        self
    }

    pub fn parameter(mut self, id: i32, label: &str, value: ParameterValue) -> Self {
        self.parameters.push(Parameter::new(id, label, value));
        self
    }

    /// Starts a node; finish it with `done()`.
    pub fn node(self, id: &str, kind: &str) -> NodeBuilder {
        NodeBuilder {
            graph: self,
            doc: NodeDoc {
                id: id.to_string(),
                kind: kind.to_string(),
                title: String::new(),
                enabled: true,
                params: HashMap::new(),
                outputs: vec!["continue".to_string()],
            },
        }
    }

    pub fn build(self) -> GraphDoc {
        GraphDoc {
            id: self.id,
            name: self.name,
            start: self.start,
            settings: self.settings,
            parameters: self.parameters,
            nodes: self.nodes,
        }
    }
}

pub struct NodeBuilder {
    graph: GraphBuilder,
    doc: NodeDoc,
}

impl NodeBuilder {
    pub fn title(mut self, title: &str) -> Self {
        self.doc.title = title.to_string();
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.doc.params.insert(key.to_string(), value.into());
        self
    }

    /// Binds a field to a graph parameter through `<field>_parameter`.
    pub fn bind(self, field: &str, parameter_id: i32) -> Self {
        let key = format!("{}_parameter", field);
        self.param(&key, parameter_id)
    }

    pub fn outputs(mut self, outputs: &[&str]) -> Self {
        self.doc.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.doc.enabled = false;
        self
    }

    pub fn done(mut self) -> GraphBuilder {
        self.graph.nodes.push(self.doc);
        self.graph
    }
}
