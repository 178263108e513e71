use serde_json::Value;
use anyhow::{Result, anyhow};
use tracing::warn;
use crate::nodes::binding;
use crate::runtime::context::Context;
use crate::runtime::node::{Action, ActionDefinition};
use crate::runtime::parameter::{ParameterSet, Vector3};
use crate::runtime::variables::{VarScope, VarValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Set,
    Add,
}

/// Writes or increments a global or local variable.
#[derive(Debug, Clone)]
pub struct SetVariableAction {
    scope: VarScope,
    variable: i32,
    variable_parameter: Option<i32>,
    operation: Operation,
    value: VarValue,
    value_parameter: Option<i32>,
}

pub struct SetVariableDefinition;

fn parse_value(raw: &Value) -> Result<VarValue> {
    match raw {
        Value::Bool(b) => Ok(VarValue::Boolean(*b)),
        Value::Number(n) if n.is_i64() => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(VarValue::Integer)
            .ok_or_else(|| anyhow!("Integer out of range: {}", n)),
        Value::Number(n) => Ok(VarValue::Float(n.as_f64().unwrap_or_default() as f32)),
        Value::String(s) => Ok(VarValue::String(s.clone())),
        Value::Array(items) if items.len() == 3 => {
            let c: Vec<f32> = items.iter().map(|v| v.as_f64().unwrap_or_default() as f32).collect();
            Ok(VarValue::Vector3(Vector3::new(c[0], c[1], c[2])))
        }
        other => Err(anyhow!("Unsupported variable value: {}", other)),
    }
}

impl ActionDefinition for SetVariableDefinition {
    fn name(&self) -> &str { "set_variable" }

    fn validate(&self, params: &Value) -> Result<()> {
        self.prepare(params.clone()).map(|_| ())
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        let scope = match params.get("scope").and_then(Value::as_str).unwrap_or("global") {
            "global" => VarScope::Global,
            "local" => VarScope::Local,
            other => return Err(anyhow!("Unknown variable scope: {}", other)),
        };
        let operation = match params.get("operation").and_then(Value::as_str).unwrap_or("set") {
            "set" => Operation::Set,
            "add" => Operation::Add,
            other => return Err(anyhow!("Unknown operation: {}", other)),
        };
        let variable_parameter = binding(&params, "variable");
        let variable = match params.get("variable").and_then(Value::as_i64) {
            Some(id) => i32::try_from(id)?,
            None if variable_parameter.is_some() => 0,
            None => return Err(anyhow!("Missing variable")),
        };
        let value_parameter = binding(&params, "value");
        let value = match params.get("value") {
            Some(raw) => parse_value(raw)?,
            None if value_parameter.is_some() => VarValue::Integer(0),
            None => return Err(anyhow!("Missing value")),
        };
        if operation == Operation::Add && !matches!(value, VarValue::Integer(_) | VarValue::Float(_)) {
            return Err(anyhow!("add needs a numeric value"));
        }
        Ok(Box::new(SetVariableAction { scope, variable, variable_parameter, operation, value, value_parameter }))
    }
}

impl Action for SetVariableAction {
    fn assign_values(&mut self, params: &ParameterSet) {
        params.assign_reference(self.variable_parameter, &mut self.variable);
        let Some(param) = self.value_parameter.and_then(|id| params.get(id)) else {
            return;
        };
        let v = &param.value;
        let bound = match &self.value {
            VarValue::Integer(_) => v.as_integer().map(VarValue::Integer),
            VarValue::Float(_) => v.as_float().map(VarValue::Float),
            VarValue::Boolean(_) => v.as_bool().map(VarValue::Boolean),
            VarValue::String(_) => v.as_str().map(|s| VarValue::String(s.to_string())),
            VarValue::Vector3(_) => v.as_vector3().map(VarValue::Vector3),
        };
        if let Some(bound) = bound {
            self.value = bound;
        }
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> f32 {
        let next = match self.operation {
            Operation::Set => self.value.clone(),
            Operation::Add => match (ctx.variables.get(self.scope, self.variable), &self.value) {
                (Some(VarValue::Integer(a)), VarValue::Integer(b)) => VarValue::Integer(a.saturating_add(*b)),
                (Some(VarValue::Float(a)), VarValue::Float(b)) => VarValue::Float(a + b),
                (Some(VarValue::Float(a)), VarValue::Integer(b)) => VarValue::Float(a + *b as f32),
                (Some(VarValue::Integer(a)), VarValue::Float(b)) => VarValue::Float(a as f32 + b),
                (None, value) => value.clone(),
                (Some(current), _) => {
                    warn!(graph = ctx.graph_id, variable = self.variable, ?current, "Cannot add to a non-numeric variable");
                    return 0.0;
                }
            },
        };
        ctx.variables.set(self.scope, self.variable, next);
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_bad_definitions() {
        assert!(SetVariableDefinition.validate(&json!({ "variable": 1 })).is_err());
        assert!(SetVariableDefinition.validate(&json!({ "variable": 1, "value": "x", "operation": "add" })).is_err());
        assert!(SetVariableDefinition.validate(&json!({ "variable": 1, "value": 2, "scope": "scene" })).is_err());
        assert!(SetVariableDefinition.validate(&json!({ "variable_parameter": 4, "value": true })).is_ok());
    }

    #[test]
    fn parses_vectors() {
        assert_eq!(parse_value(&json!([1.0, 2.0, 3.5])).unwrap(), VarValue::Vector3(Vector3::new(1.0, 2.0, 3.5)));
    }
}
