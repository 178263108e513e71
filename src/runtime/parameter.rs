use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::runtime::active::{ENTRY_DELIMITER, RECORD_DELIMITER, RECORD_SEPARATOR};

/// Separates a parameter id from its literal inside a snapshot entry.
pub const VALUE_DELIMITER: char = '=';
const VECTOR_DELIMITER: char = ',';

const ESCAPE_CHAR: char = '*';

const ESCAPES: [(char, &str); 4] = [
    (ESCAPE_CHAR, "*STAR*"),
    (RECORD_DELIMITER, "*COLON*"),
    (RECORD_SEPARATOR, "*PIPE*"),
    (ENTRY_DELIMITER, "*SEMICOLON*"),
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    Integer,
    Float,
    String,
    Vector3,
    Boolean,
    PopUp,
    GameObject,
    Asset,
    GlobalVariable,
    LocalVariable,
    InventoryItem,
    Document,
}

/// Payload of a parameter. Exactly one field is active, selected by the variant.
///
/// Scene objects, inventory items, documents and variables are held by their
/// stable id; the host resolves the id again after a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Integer(i32),
    Float(f32),
    String(String),
    Vector3(Vector3),
    Boolean(bool),
    PopUp(i32),
    GameObject(i32),
    Asset(String),
    GlobalVariable(i32),
    LocalVariable(i32),
    InventoryItem(i32),
    Document(i32),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Integer(_) => ParameterKind::Integer,
            ParameterValue::Float(_) => ParameterKind::Float,
            ParameterValue::String(_) => ParameterKind::String,
            ParameterValue::Vector3(_) => ParameterKind::Vector3,
            ParameterValue::Boolean(_) => ParameterKind::Boolean,
            ParameterValue::PopUp(_) => ParameterKind::PopUp,
            ParameterValue::GameObject(_) => ParameterKind::GameObject,
            ParameterValue::Asset(_) => ParameterKind::Asset,
            ParameterValue::GlobalVariable(_) => ParameterKind::GlobalVariable,
            ParameterValue::LocalVariable(_) => ParameterKind::LocalVariable,
            ParameterValue::InventoryItem(_) => ParameterKind::InventoryItem,
            ParameterValue::Document(_) => ParameterKind::Document,
        }
    }

    pub fn default_for(kind: ParameterKind) -> Self {
        match kind {
            ParameterKind::Integer => ParameterValue::Integer(0),
            ParameterKind::Float => ParameterValue::Float(0.0),
            ParameterKind::String => ParameterValue::String(String::new()),
            ParameterKind::Vector3 => ParameterValue::Vector3(Vector3::default()),
            ParameterKind::Boolean => ParameterValue::Boolean(false),
            ParameterKind::PopUp => ParameterValue::PopUp(0),
            ParameterKind::GameObject => ParameterValue::GameObject(0),
            ParameterKind::Asset => ParameterValue::Asset(String::new()),
            ParameterKind::GlobalVariable => ParameterValue::GlobalVariable(0),
            ParameterKind::LocalVariable => ParameterValue::LocalVariable(0),
            ParameterKind::InventoryItem => ParameterValue::InventoryItem(0),
            ParameterKind::Document => ParameterValue::Document(0),
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            ParameterValue::Integer(v) | ParameterValue::PopUp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) | ParameterValue::Asset(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector3(&self) -> Option<Vector3> {
        match self {
            ParameterValue::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    /// Stable id of a referenced object, item, document or variable.
    pub fn as_reference(&self) -> Option<i32> {
        match self {
            ParameterValue::GameObject(id)
            | ParameterValue::GlobalVariable(id)
            | ParameterValue::LocalVariable(id)
            | ParameterValue::InventoryItem(id)
            | ParameterValue::Document(id) => Some(*id),
            _ => None,
        }
    }

    /// Kind-specific literal, before escaping.
    pub fn to_literal(&self) -> String {
        match self {
            ParameterValue::Integer(v)
            | ParameterValue::PopUp(v)
            | ParameterValue::GameObject(v)
            | ParameterValue::GlobalVariable(v)
            | ParameterValue::LocalVariable(v)
            | ParameterValue::InventoryItem(v)
            | ParameterValue::Document(v) => v.to_string(),
            ParameterValue::Float(v) => v.to_string(),
            ParameterValue::String(s) | ParameterValue::Asset(s) => s.clone(),
            ParameterValue::Vector3(v) => format!(
                "{}{sep}{}{sep}{}",
                v.x,
                v.y,
                v.z,
                sep = VECTOR_DELIMITER
            ),
            ParameterValue::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
        }
    }

    /// Parses an unescaped literal. Unparsable numbers become zero.
    pub fn parse_literal(kind: ParameterKind, text: &str) -> Self {
        let int = || text.trim().parse::<i32>().unwrap_or(0);
        let float = |s: &str| s.trim().parse::<f32>().unwrap_or(0.0);
        match kind {
            ParameterKind::Integer => ParameterValue::Integer(int()),
            ParameterKind::PopUp => ParameterValue::PopUp(int()),
            ParameterKind::GameObject => ParameterValue::GameObject(int()),
            ParameterKind::GlobalVariable => ParameterValue::GlobalVariable(int()),
            ParameterKind::LocalVariable => ParameterValue::LocalVariable(int()),
            ParameterKind::InventoryItem => ParameterValue::InventoryItem(int()),
            ParameterKind::Document => ParameterValue::Document(int()),
            ParameterKind::Float => ParameterValue::Float(float(text)),
            ParameterKind::String => ParameterValue::String(text.to_string()),
            ParameterKind::Asset => ParameterValue::Asset(text.to_string()),
            ParameterKind::Boolean => {
                ParameterValue::Boolean(matches!(text.trim(), "1" | "true" | "True"))
            }
            ParameterKind::Vector3 => {
                let mut parts = text.split(VECTOR_DELIMITER).map(float);
                let x = parts.next().unwrap_or(0.0);
                let y = parts.next().unwrap_or(0.0);
                let z = parts.next().unwrap_or(0.0);
                ParameterValue::Vector3(Vector3 { x, y, z })
            }
        }
    }
}

/// Replaces characters that would collide with the save-record delimiters.
/// The escape character itself is escaped, so decoding is unambiguous.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match ESCAPES.iter().find(|(raw, _)| *raw == c) {
            Some((_, token)) => out.push_str(token),
            None => out.push(c),
        }
    }
    out
}

/// Inverse of `escape_literal`. Decodes left to right in a single pass;
/// a `*` that starts no known token is kept as is.
pub fn unescape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(ESCAPE_CHAR) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ESCAPES.iter().find(|(_, token)| tail.starts_with(token)) {
            Some((raw, token)) => {
                out.push(*raw);
                rest = &tail[token.len()..];
            }
            None => {
                out.push(ESCAPE_CHAR);
                rest = &tail[ESCAPE_CHAR.len_utf8()..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: i32,
    #[serde(default)]
    pub label: String,
    pub value: ParameterValue,
}

impl Parameter {
    pub fn new(id: i32, label: impl Into<String>, value: ParameterValue) -> Self {
        Self { id, label: label.into(), value }
    }

    pub fn kind(&self) -> ParameterKind {
        self.value.kind()
    }

    /// Replaces the value when the kinds agree. Returns false otherwise.
    pub fn set(&mut self, value: ParameterValue) -> bool {
        if value.kind() != self.kind() {
            warn!(
                parameter_id = self.id,
                expected = ?self.kind(),
                got = ?value.kind(),
                "Parameter kind mismatch, value ignored"
            );
            return false;
        }
        self.value = value;
        true
    }

    pub fn set_integer(&mut self, value: i32) -> bool {
        match self.kind() {
            ParameterKind::PopUp => self.set(ParameterValue::PopUp(value)),
            _ => self.set(ParameterValue::Integer(value)),
        }
    }

    pub fn set_float(&mut self, value: f32) -> bool {
        self.set(ParameterValue::Float(value))
    }

    pub fn set_string(&mut self, value: impl Into<String>) -> bool {
        self.set(ParameterValue::String(value.into()))
    }

    pub fn set_bool(&mut self, value: bool) -> bool {
        self.set(ParameterValue::Boolean(value))
    }

    pub fn set_vector3(&mut self, value: Vector3) -> bool {
        self.set(ParameterValue::Vector3(value))
    }
}

/// The runtime parameters of one graph instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn get(&self, id: i32) -> Option<&Parameter> {
        self.params.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.id == id)
    }

    pub fn set(&mut self, id: i32, value: ParameterValue) -> bool {
        match self.get_mut(id) {
            Some(param) => param.set(value),
            None => {
                warn!(parameter_id = id, "No parameter with this id");
                false
            }
        }
    }

    pub fn assign_integer(&self, id: Option<i32>, field: &mut i32) {
        if let Some(v) = self.lookup(id).and_then(ParameterValue::as_integer) {
            *field = v;
        }
    }

    pub fn assign_float(&self, id: Option<i32>, field: &mut f32) {
        if let Some(v) = self.lookup(id).and_then(ParameterValue::as_float) {
            *field = v;
        }
    }

    pub fn assign_string(&self, id: Option<i32>, field: &mut String) {
        if let Some(v) = self.lookup(id).and_then(ParameterValue::as_str) {
            *field = v.to_string();
        }
    }

    pub fn assign_bool(&self, id: Option<i32>, field: &mut bool) {
        if let Some(v) = self.lookup(id).and_then(ParameterValue::as_bool) {
            *field = v;
        }
    }

    pub fn assign_vector3(&self, id: Option<i32>, field: &mut Vector3) {
        if let Some(v) = self.lookup(id).and_then(ParameterValue::as_vector3) {
            *field = v;
        }
    }

    /// Overwrites an object, item, document or variable id.
    pub fn assign_reference(&self, id: Option<i32>, field: &mut i32) {
        if let Some(v) = self.lookup(id).and_then(ParameterValue::as_reference) {
            *field = v;
        }
    }

    fn lookup(&self, id: Option<i32>) -> Option<&ParameterValue> {
        id.and_then(|id| self.get(id)).map(|p| &p.value)
    }

    /// Substitutes every `[param:ID]` token with the parameter's literal.
    pub fn replace_tokens(&self, text: &str) -> String {
        if !text.contains("[param:") {
            return text.to_string();
        }
        let mut out = text.to_string();
        for param in &self.params {
            let token = format!("[param:{}]", param.id);
            if out.contains(&token) {
                out = out.replace(&token, &param.value.to_literal());
            }
        }
        out
    }

    /// Serializes the current values as `id=literal` entries.
    pub fn to_snapshot(&self) -> String {
        self.params
            .iter()
            .map(|p| format!("{}{}{}", p.id, VALUE_DELIMITER, escape_literal(&p.value.to_literal())))
            .collect::<Vec<_>>()
            .join(&ENTRY_DELIMITER.to_string())
    }

    /// Restores values from a snapshot, parsing each literal as the kind of the
    /// matching definition. Unknown ids and malformed entries are skipped.
    pub fn apply_snapshot(&mut self, data: &str) {
        for entry in data.split(ENTRY_DELIMITER).filter(|e| !e.is_empty()) {
            let Some((id_text, literal)) = entry.split_once(VALUE_DELIMITER) else {
                warn!(entry, "Malformed parameter entry");
                continue;
            };
            let Ok(id) = id_text.trim().parse::<i32>() else {
                warn!(entry, "Parameter entry has no numeric id");
                continue;
            };
            let Some(param) = self.get_mut(id) else {
                warn!(parameter_id = id, "Snapshot names an unknown parameter");
                continue;
            };
            param.value = ParameterValue::parse_literal(param.kind(), &unescape_literal(literal));
        }
    }
}

impl From<Vec<Parameter>> for ParameterSet {
    fn from(params: Vec<Parameter>) -> Self {
        Self::new(params)
    }
}
