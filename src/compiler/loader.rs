use anyhow::{Result, Context as AnyhowContext};
use std::fs;
use std::path::Path;
use crate::compiler::core::Compiler;
use crate::dsl::GraphDoc;
use crate::runtime::blueprint::Blueprint;

pub fn load_graph_from_yaml(file_path: impl AsRef<Path>) -> Result<GraphDoc> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read YAML file from {}", file_path.display()))?;

    let doc: GraphDoc = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize YAML content from {}", file_path.display()))?;

    Ok(doc)
}

/// Loads and compiles one graph file.
pub fn load_blueprint(file_path: impl AsRef<Path>) -> Result<Blueprint> {
    let file_path = file_path.as_ref();
    let doc = load_graph_from_yaml(file_path)?;
    Compiler::new()
        .compile(doc)
        .with_context(|| format!("Failed to compile {}", file_path.display()))
}

/// Loads every `.yaml`/`.yml` file of a directory, sorted by file name.
pub fn load_blueprints_from_dir(dir: impl AsRef<Path>) -> Result<Vec<Blueprint>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))? {
        let path = entry?.path();
        let is_yaml = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml {
            paths.push(path);
        }
    }
    paths.sort();
    paths.iter().map(load_blueprint).collect()
}
