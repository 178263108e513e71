#![allow(dead_code)]

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use anyhow::Result;
use serde_json::{Value, json};
use cutscript::nodes::register_builtin;
use cutscript::runtime::blueprint::{Blueprint, BlueprintNode, ListSettings};
use cutscript::runtime::context::Context;
use cutscript::runtime::engine::Engine;
use cutscript::runtime::events::ListEvent;
use cutscript::runtime::node::{Action, ActionDefinition};
use cutscript::runtime::parameter::{Parameter, ParameterSet};

/// What recording nodes did: `effects` are their side effects, `calls` the methods invoked.
#[derive(Debug, Default)]
pub struct Journal {
    pub effects: Vec<String>,
    pub calls: Vec<String>,
}

pub type SharedJournal = Arc<Mutex<Journal>>;

pub fn effects(journal: &SharedJournal) -> Vec<String> {
    journal.lock().unwrap().effects.clone()
}

pub fn calls(journal: &SharedJournal) -> Vec<String> {
    journal.lock().unwrap().calls.clone()
}

/// Test node: records a tag, optionally waits, and branches on a shared choice.
#[derive(Debug, Clone)]
pub struct RecordAction {
    tag: String,
    wait: f32,
    sockets: usize,
    choice: Arc<AtomicI32>,
    value: i32,
    value_parameter: Option<i32>,
    journal: SharedJournal,
}

impl RecordAction {
    fn effect(&self) -> String {
        match self.value_parameter {
            Some(_) => format!("{}={}", self.tag, self.value),
            None => self.tag.clone(),
        }
    }

    fn note(&self, call: &str, effect: bool) {
        let mut journal = self.journal.lock().unwrap();
        journal.calls.push(format!("{}:{}", call, self.tag));
        if effect {
            journal.effects.push(self.effect());
        }
    }
}

impl Action for RecordAction {
    fn num_sockets(&self) -> usize {
        self.sockets
    }

    fn assign_values(&mut self, params: &ParameterSet) {
        params.assign_integer(self.value_parameter, &mut self.value);
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> f32 {
        if ctx.is_running() {
            self.note("rerun", false);
            ctx.set_running(false);
            return 0.0;
        }
        self.note("run", true);
        if self.wait > 0.0 {
            ctx.set_running(true);
            return self.wait;
        }
        0.0
    }

    fn skip(&mut self, _ctx: &mut Context<'_>) {
        self.note("skip", true);
    }

    fn next_output_index(&mut self, _ctx: &Context<'_>) -> i32 {
        self.choice.load(Ordering::SeqCst)
    }
}

pub struct RecordDefinition {
    pub journal: SharedJournal,
    pub choice: Arc<AtomicI32>,
}

impl ActionDefinition for RecordDefinition {
    fn name(&self) -> &str { "record" }

    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        Ok(Box::new(RecordAction {
            tag: params.get("tag").and_then(Value::as_str).unwrap_or("?").to_string(),
            wait: params.get("wait").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            sockets: params.get("sockets").and_then(Value::as_u64).unwrap_or(1) as usize,
            choice: self.choice.clone(),
            value: 0,
            value_parameter: params.get("value_parameter").and_then(Value::as_i64).map(|v| v as i32),
            journal: self.journal.clone(),
        }))
    }
}

pub struct Harness {
    pub engine: Engine,
    pub journal: SharedJournal,
    pub choice: Arc<AtomicI32>,
    pub events: Arc<Mutex<Vec<ListEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine(Engine::new())
    }

    pub fn with_engine(mut engine: Engine) -> Self {
        let journal = SharedJournal::default();
        let choice = Arc::new(AtomicI32::new(0));
        register_builtin(&mut engine);
        engine.register_node(Box::new(RecordDefinition { journal: journal.clone(), choice: choice.clone() }));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        engine.events_mut().register_observer("test", move |e| sink.lock().unwrap().push(e.clone()));

        Self { engine, journal, choice, events }
    }

    pub fn effects(&self) -> Vec<String> {
        effects(&self.journal)
    }

    pub fn calls(&self) -> Vec<String> {
        calls(&self.journal)
    }

    pub fn set_choice(&self, output: i32) {
        self.choice.store(output, Ordering::SeqCst);
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(ListEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| e.name() == name).count()
    }
}

pub fn record(tag: &str) -> BlueprintNode {
    BlueprintNode::new("record", json!({ "tag": tag }))
}

pub fn record_with(tag: &str, extra: Value) -> BlueprintNode {
    let mut params = json!({ "tag": tag });
    if let (Some(target), Some(source)) = (params.as_object_mut(), extra.as_object()) {
        for (k, v) in source {
            target.insert(k.clone(), v.clone());
        }
    }
    BlueprintNode::new("record", params)
}

pub fn blueprint(id: &str, nodes: Vec<BlueprintNode>) -> Blueprint {
    Blueprint {
        id: id.to_string(),
        name: id.to_string(),
        nodes,
        start_index: 0,
        parameters: Vec::new(),
        settings: ListSettings::default(),
    }
}

pub fn blueprint_with(id: &str, nodes: Vec<BlueprintNode>, settings: ListSettings, parameters: Vec<Parameter>) -> Blueprint {
    Blueprint { settings, parameters, ..blueprint(id, nodes) }
}
