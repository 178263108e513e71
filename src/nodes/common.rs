use serde_json::Value;
use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};
use crate::nodes::{binding, optional_f32};
use crate::runtime::context::Context;
use crate::runtime::node::{Action, ActionDefinition};
use crate::runtime::parameter::ParameterSet;

// --- COMMENT ---

/// Editor note. Does nothing at runtime.
#[derive(Debug, Clone)]
pub struct CommentAction {
    text: String,
}

pub struct CommentDefinition;

impl ActionDefinition for CommentDefinition {
    fn name(&self) -> &str { "comment" }
    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        let text = params.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(Box::new(CommentAction { text }))
    }
}

impl Action for CommentAction {
    fn run(&mut self, ctx: &mut Context<'_>) -> f32 {
        debug!(graph = ctx.graph_id, index = ctx.node_index, text = %self.text, "Comment");
        0.0
    }
}

// --- LOG ---

#[derive(Debug, Clone)]
pub struct LogAction {
    message: String,
    message_parameter: Option<i32>,
    resolved: String,
    level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Debug,
    Info,
    Warn,
}

pub struct LogDefinition;

impl ActionDefinition for LogDefinition {
    fn name(&self) -> &str { "log" }

    fn validate(&self, params: &Value) -> Result<()> {
        if params.get("message").is_none() && binding(params, "message").is_none() {
            return Err(anyhow!("Missing message"));
        }
        Ok(())
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        let message = params.get("message").and_then(Value::as_str).unwrap_or_default().to_string();
        let level = match params.get("level").and_then(Value::as_str).unwrap_or("info") {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            other => return Err(anyhow!("Unknown log level: {}", other)),
        };
        Ok(Box::new(LogAction {
            resolved: message.clone(),
            message,
            message_parameter: binding(&params, "message"),
            level,
        }))
    }
}

impl Action for LogAction {
    fn assign_values(&mut self, params: &ParameterSet) {
        let mut message = self.message.clone();
        params.assign_string(self.message_parameter, &mut message);
        self.resolved = params.replace_tokens(&message);
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> f32 {
        match self.level {
            LogLevel::Debug => debug!(graph = ctx.graph_id, index = ctx.node_index, "{}", self.resolved),
            LogLevel::Info => info!(graph = ctx.graph_id, index = ctx.node_index, "{}", self.resolved),
            LogLevel::Warn => warn!(graph = ctx.graph_id, index = ctx.node_index, "{}", self.resolved),
        }
        0.0
    }
}

// --- WAIT ---

/// Holds the branch for a number of seconds.
#[derive(Debug, Clone)]
pub struct WaitAction {
    seconds: f32,
    seconds_parameter: Option<i32>,
}

pub struct WaitDefinition;

impl ActionDefinition for WaitDefinition {
    fn name(&self) -> &str { "wait" }

    fn validate(&self, params: &Value) -> Result<()> {
        match optional_f32(params, "seconds") {
            Some(s) if s < 0.0 => Err(anyhow!("seconds must not be negative")),
            None if binding(params, "seconds").is_none() => Err(anyhow!("Missing seconds")),
            _ => Ok(()),
        }
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        Ok(Box::new(WaitAction {
            seconds: optional_f32(&params, "seconds").unwrap_or(0.0),
            seconds_parameter: binding(&params, "seconds"),
        }))
    }
}

impl WaitAction {
    pub fn new(seconds: f32) -> Self {
        Self { seconds, seconds_parameter: None }
    }
}

impl Action for WaitAction {
    fn assign_values(&mut self, params: &ParameterSet) {
        params.assign_float(self.seconds_parameter, &mut self.seconds);
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> f32 {
        if !ctx.is_running() && self.seconds > 0.0 {
            ctx.set_running(true);
            return self.seconds;
        }
        ctx.set_running(false);
        0.0
    }

    fn skip(&mut self, _ctx: &mut Context<'_>) {}
}

