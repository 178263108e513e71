use crate::dsl::{GraphDoc, NodeDoc};
use crate::runtime::blueprint::{Blueprint, BlueprintNode, NodeIndex};
use crate::runtime::ending::Ending;
use std::collections::HashMap;
use anyhow::{Result, anyhow};

const GOTO_PREFIX: &str = "goto:";
const RUN_PREFIX: &str = "run:";

/// Turns an authored graph into a `Blueprint`, resolving node ids to indices.
pub struct Compiler {
    id_map: HashMap<String, NodeIndex>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            id_map: HashMap::new(),
        }
    }

    pub fn compile(&mut self, doc: GraphDoc) -> Result<Blueprint> {
        self.id_map.clear();
        if doc.id.trim().is_empty() {
            return Err(anyhow!("Graph has no id"));
        }

        // 1. Indexing
        for (idx, node) in doc.nodes.iter().enumerate() {
            if self.id_map.insert(node.id.clone(), idx).is_some() {
                return Err(anyhow!("Duplicate node ID: {}", node.id));
            }
        }

        // 2. Transform
        let nodes = doc
            .nodes
            .iter()
            .map(|node| self.transform_node(node))
            .collect::<Result<Vec<_>>>()?;

        // 3. Start node
        let start_index = match &doc.start {
            Some(id) => self.resolve_target(id)?,
            None => 0,
        };

        let name = if doc.name.is_empty() { doc.id.clone() } else { doc.name };
        Ok(Blueprint {
            id: doc.id,
            name,
            nodes,
            start_index,
            parameters: doc.parameters,
            settings: doc.settings,
        })
    }

    fn transform_node(&self, node: &NodeDoc) -> Result<BlueprintNode> {
        let endings = node
            .outputs
            .iter()
            .map(|output| self.parse_output(output))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| anyhow!("Node {}: {}", node.id, e))?;

        Ok(BlueprintNode {
            kind: node.kind.clone(),
            id: node.id.clone(),
            title: node.title.clone(),
            enabled: node.enabled,
            endings,
            params: serde_json::to_value(&node.params)?,
        })
    }

    fn parse_output(&self, output: &str) -> Result<Ending> {
        let output = output.trim();
        if let Some(target) = output.strip_prefix(GOTO_PREFIX) {
            return Ok(Ending::SkipTo(self.resolve_target(target.trim())?));
        }
        if let Some(graph) = output.strip_prefix(RUN_PREFIX) {
            let graph = graph.trim();
            if graph.is_empty() {
                return Err(anyhow!("Output {} names no graph", output));
            }
            return Ok(Ending::RunGraph(graph.to_string()));
        }
        match output {
            "continue" => Ok(Ending::Continue),
            "stop" => Ok(Ending::Stop),
            other => Err(anyhow!("Malformed output: {}", other)),
        }
    }

    fn resolve_target(&self, id: &str) -> Result<NodeIndex> {
        self.id_map
            .get(id)
            .copied()
            .ok_or_else(|| anyhow!("Target node not found: {}", id))
    }
}
