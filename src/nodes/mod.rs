pub mod common;
pub mod flow;
pub mod variable;

use serde_json::Value;
use anyhow::{Result, anyhow};
use crate::runtime::engine::Engine;

/// Registers every built-in node kind.
pub fn register_builtin(engine: &mut Engine) {
    engine.register_node(Box::new(common::CommentDefinition));
    engine.register_node(Box::new(common::LogDefinition));
    engine.register_node(Box::new(common::WaitDefinition));
    engine.register_node(Box::new(flow::CheckDefinition));
    engine.register_node(Box::new(flow::WaitUntilDefinition));
    engine.register_node(Box::new(flow::CycleDefinition));
    engine.register_node(Box::new(flow::ParallelDefinition));
    engine.register_node(Box::new(flow::RunGraphDefinition));
    engine.register_node(Box::new(flow::ControlGraphDefinition));
    engine.register_node(Box::new(variable::SetVariableDefinition));
}

/// Parameter id a field is bound to, from `<field>_parameter`.
pub(crate) fn binding(params: &Value, field: &str) -> Option<i32> {
    params
        .get(format!("{}_parameter", field))
        .and_then(Value::as_i64)
        .and_then(|id| i32::try_from(id).ok())
}

pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params.get(key).and_then(Value::as_str).ok_or_else(|| anyhow!("Missing {}", key))
}

pub(crate) fn optional_f32(params: &Value, key: &str) -> Option<f32> {
    params.get(key).and_then(Value::as_f64).map(|v| v as f32)
}
