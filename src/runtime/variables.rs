use dashmap::DashMap;
use evalexpr::{ContextWithMutableVariables, DefaultNumericTypes, HashMapContext, Node as EvalNode};
use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::runtime::parameter::Vector3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarValue {
    Integer(i32),
    Float(f32),
    Boolean(bool),
    String(String),
    Vector3(Vector3),
}

impl VarValue {
    fn to_eval(&self) -> Option<evalexpr::Value<DefaultNumericTypes>> {
        match self {
            VarValue::Integer(i) => Some(evalexpr::Value::Int(i64::from(*i))),
            VarValue::Float(f) => Some(evalexpr::Value::Float(f64::from(*f))),
            VarValue::Boolean(b) => Some(evalexpr::Value::Boolean(*b)),
            VarValue::String(s) => Some(evalexpr::Value::String(s.clone())),
            VarValue::Vector3(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarScope {
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: i32,
    pub label: String,
    pub value: VarValue,
}

/// Game variables that nodes read and write.
///
/// Nodes only ever see `&Variables`, so the maps carry their own locking.
#[derive(Debug, Default)]
pub struct Variables {
    global: DashMap<i32, Variable>,
    local: DashMap<i32, Variable>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    fn scope(&self, scope: VarScope) -> &DashMap<i32, Variable> {
        match scope {
            VarScope::Global => &self.global,
            VarScope::Local => &self.local,
        }
    }

    pub fn define(&self, scope: VarScope, id: i32, label: impl Into<String>, value: VarValue) {
        self.scope(scope).insert(id, Variable { id, label: label.into(), value });
    }

    pub fn get(&self, scope: VarScope, id: i32) -> Option<VarValue> {
        self.scope(scope).get(&id).map(|v| v.value.clone())
    }

    pub fn get_by_label(&self, label: &str) -> Option<VarValue> {
        let find = |map: &DashMap<i32, Variable>| {
            map.iter().find(|v| v.label == label).map(|v| v.value.clone())
        };
        find(&self.local).or_else(|| find(&self.global))
    }

    /// Writes a variable, creating it with a generated label if it is unknown.
    pub fn set(&self, scope: VarScope, id: i32, value: VarValue) {
        self.scope(scope)
            .entry(id)
            .and_modify(|v| v.value = value.clone())
            .or_insert_with(|| Variable { id, label: format!("var{}", id), value });
    }

    pub fn clear_local(&self) {
        self.local.clear();
    }

    /// All variables of one scope, sorted by id.
    pub fn snapshot(&self, scope: VarScope) -> Vec<Variable> {
        let mut vars: Vec<Variable> = self.scope(scope).iter().map(|v| v.value().clone()).collect();
        vars.sort_by_key(|v| v.id);
        vars
    }

    /// Replaces a scope with the given variables.
    pub fn restore(&self, scope: VarScope, vars: Vec<Variable>) {
        let map = self.scope(scope);
        map.clear();
        for var in vars {
            map.insert(var.id, var);
        }
    }

    /// Evaluates a pre-compiled boolean expression over variable labels.
    /// Local variables shadow globals with the same label.
    pub fn evaluate(&self, expression: &EvalNode<DefaultNumericTypes>) -> Result<bool> {
        let mut ctx = HashMapContext::<DefaultNumericTypes>::new();
        for map in [&self.global, &self.local] {
            for var in map.iter() {
                if let Some(value) = var.value.to_eval() {
                    let _ = ctx.set_value(var.label.clone(), value);
                }
            }
        }
        Ok(expression.eval_boolean_with_context(&ctx)?)
    }
}
