use serde_json::Value;
use anyhow::{Result, anyhow};
use evalexpr::{build_operator_tree, DefaultNumericTypes, Node as EvalNode};
use tracing::warn;
use crate::nodes::required_str;
use crate::runtime::context::Context;
use crate::runtime::node::{Action, ActionDefinition, WAIT_NEXT_TICK};

fn compile(params: &Value) -> Result<(String, EvalNode<DefaultNumericTypes>)> {
    let raw = required_str(params, "condition")?.replace("${", "").replace('}', "");
    let compiled = build_operator_tree::<DefaultNumericTypes>(&raw)?;
    Ok((raw, compiled))
}

fn evaluate(ctx: &Context<'_>, raw: &str, condition: &EvalNode<DefaultNumericTypes>) -> bool {
    match ctx.variables.evaluate(condition) {
        Ok(b) => b,
        Err(e) => {
            warn!(graph = ctx.graph_id, index = ctx.node_index, condition = raw, error = %e, "Condition failed to evaluate, treated as false");
            false
        }
    }
}

// --- CHECK ---

/// Two-way branch on a variable expression. Socket 0 is taken when it holds.
#[derive(Debug, Clone)]
pub struct CheckAction {
    raw: String,
    condition: EvalNode<DefaultNumericTypes>,
}

pub struct CheckDefinition;

impl ActionDefinition for CheckDefinition {
    fn name(&self) -> &str { "check" }
    fn validate(&self, params: &Value) -> Result<()> {
        compile(params).map(|_| ())
    }
    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        let (raw, condition) = compile(&params)?;
        Ok(Box::new(CheckAction { raw, condition }))
    }
}

impl Action for CheckAction {
    fn num_sockets(&self) -> usize {
        2
    }

    fn run(&mut self, _ctx: &mut Context<'_>) -> f32 {
        0.0
    }

    fn next_output_index(&mut self, ctx: &Context<'_>) -> i32 {
        if evaluate(ctx, &self.raw, &self.condition) { 0 } else { 1 }
    }
}

// --- WAIT UNTIL ---

/// Polls every tick until the expression holds. A skip passes straight through.
#[derive(Debug, Clone)]
pub struct WaitUntilAction {
    raw: String,
    condition: EvalNode<DefaultNumericTypes>,
}

pub struct WaitUntilDefinition;

impl ActionDefinition for WaitUntilDefinition {
    fn name(&self) -> &str { "wait_until" }
    fn validate(&self, params: &Value) -> Result<()> {
        compile(params).map(|_| ())
    }
    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        let (raw, condition) = compile(&params)?;
        Ok(Box::new(WaitUntilAction { raw, condition }))
    }
}

impl Action for WaitUntilAction {
    fn run(&mut self, ctx: &mut Context<'_>) -> f32 {
        if evaluate(ctx, &self.raw, &self.condition) {
            ctx.set_running(false);
            return 0.0;
        }
        ctx.set_running(true);
        WAIT_NEXT_TICK
    }

    fn skip(&mut self, _ctx: &mut Context<'_>) {}
}

// --- CYCLE ---

/// Takes its outputs in turn, one per visit.
#[derive(Debug, Clone)]
pub struct CycleAction {
    outputs: usize,
    hold_last: bool,
    visits: usize,
}

pub struct CycleDefinition;

impl ActionDefinition for CycleDefinition {
    fn name(&self) -> &str { "cycle" }
    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("outputs").and_then(Value::as_u64) {
            Some(0) => Err(anyhow!("outputs must be at least 1")),
            _ => Ok(()),
        }
    }
    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        self.validate(&params)?;
        let outputs = params.get("outputs").and_then(Value::as_u64).unwrap_or(2) as usize;
        let hold_last = params.get("hold_last").and_then(Value::as_bool).unwrap_or(false);
        Ok(Box::new(CycleAction::new(outputs, hold_last)))
    }
}

impl CycleAction {
    pub fn new(outputs: usize, hold_last: bool) -> Self {
        Self { outputs: outputs.max(1), hold_last, visits: 0 }
    }

    fn advance(&mut self) -> usize {
        let index = if self.hold_last {
            self.visits.min(self.outputs - 1)
        } else {
            self.visits % self.outputs
        };
        self.visits += 1;
        index
    }
}

impl Action for CycleAction {
    fn num_sockets(&self) -> usize {
        self.outputs
    }

    fn run(&mut self, _ctx: &mut Context<'_>) -> f32 {
        0.0
    }

    fn next_output_index(&mut self, _ctx: &Context<'_>) -> i32 {
        self.advance() as i32
    }
}

// --- PARALLEL ---

/// Starts every output branch at once.
#[derive(Debug, Clone)]
pub struct ParallelAction {
    outputs: usize,
}

pub struct ParallelDefinition;

impl ActionDefinition for ParallelDefinition {
    fn name(&self) -> &str { "parallel" }
    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        let outputs = params.get("outputs").and_then(Value::as_u64).unwrap_or(2) as usize;
        Ok(Box::new(ParallelAction { outputs }))
    }
}

impl Action for ParallelAction {
    fn num_sockets(&self) -> usize {
        self.outputs
    }

    fn run_all_outputs(&self) -> bool {
        true
    }

    fn run(&mut self, _ctx: &mut Context<'_>) -> f32 {
        0.0
    }
}

// --- RUN GRAPH ---

/// Starts another graph, optionally holding until it is no longer running.
#[derive(Debug, Clone)]
pub struct RunGraphAction {
    graph: String,
    start_index: usize,
    wait_until_finish: bool,
}

pub struct RunGraphDefinition;

impl ActionDefinition for RunGraphDefinition {
    fn name(&self) -> &str { "run_graph" }
    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "graph").map(|_| ())
    }
    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        Ok(Box::new(RunGraphAction {
            graph: required_str(&params, "graph")?.to_string(),
            start_index: params.get("start_index").and_then(Value::as_u64).unwrap_or(0) as usize,
            wait_until_finish: params.get("wait").and_then(Value::as_bool).unwrap_or(false),
        }))
    }
}

impl Action for RunGraphAction {
    fn run(&mut self, ctx: &mut Context<'_>) -> f32 {
        if !ctx.is_running() {
            let graph = self.graph.clone();
            ctx.syscall().start(graph, self.start_index, true, false);
            if self.wait_until_finish {
                ctx.set_running(true);
                return WAIT_NEXT_TICK;
            }
            return 0.0;
        }
        if ctx.is_graph_running(&self.graph) {
            return WAIT_NEXT_TICK;
        }
        ctx.set_running(false);
        0.0
    }

    fn skip(&mut self, ctx: &mut Context<'_>) {
        let graph = self.graph.clone();
        ctx.syscall().start(graph, self.start_index, true, true);
    }
}

// --- CONTROL GRAPH ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphCommand {
    Kill,
    Pause,
    Resume { rerun: bool },
    Skip,
}

/// Kills, pauses, resumes or skips another graph.
#[derive(Debug, Clone)]
pub struct ControlGraphAction {
    graph: String,
    command: GraphCommand,
}

pub struct ControlGraphDefinition;

impl ActionDefinition for ControlGraphDefinition {
    fn name(&self) -> &str { "control_graph" }
    fn validate(&self, params: &Value) -> Result<()> {
        self.prepare(params.clone()).map(|_| ())
    }
    fn prepare(&self, params: Value) -> Result<Box<dyn Action>> {
        let graph = required_str(&params, "graph")?.to_string();
        let command = match required_str(&params, "command")? {
            "kill" => GraphCommand::Kill,
            "pause" => GraphCommand::Pause,
            "resume" => GraphCommand::Resume {
                rerun: params.get("rerun").and_then(Value::as_bool).unwrap_or(true),
            },
            "skip" => GraphCommand::Skip,
            other => return Err(anyhow!("Unknown graph command: {}", other)),
        };
        Ok(Box::new(ControlGraphAction { graph, command }))
    }
}

impl Action for ControlGraphAction {
    fn run(&mut self, ctx: &mut Context<'_>) -> f32 {
        let graph = self.graph.clone();
        match self.command {
            GraphCommand::Kill => ctx.syscall().kill(graph),
            GraphCommand::Pause => ctx.syscall().pause(graph),
            GraphCommand::Resume { rerun } => ctx.syscall().resume(graph, rerun),
            GraphCommand::Skip => ctx.syscall().skip(graph),
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_wraps_or_holds() {
        let mut wrap = CycleAction::new(2, false);
        let mut hold = CycleAction::new(2, true);
        let wraps: Vec<usize> = (0..4).map(|_| wrap.advance()).collect();
        let holds: Vec<usize> = (0..4).map(|_| hold.advance()).collect();
        assert_eq!(wraps, vec![0, 1, 0, 1]);
        assert_eq!(holds, vec![0, 1, 1, 1]);
    }

    #[test]
    fn control_graph_rejects_unknown_commands() {
        let params = serde_json::json!({ "graph": "intro", "command": "explode" });
        assert!(ControlGraphDefinition.validate(&params).is_err());
        let params = serde_json::json!({ "graph": "intro", "command": "resume" });
        assert!(ControlGraphDefinition.validate(&params).is_ok());
    }

    #[test]
    fn check_requires_a_parsable_condition() {
        assert!(CheckDefinition.validate(&serde_json::json!({ "condition": "(gold > 3" })).is_err());
        assert!(CheckDefinition.validate(&serde_json::json!({ "condition": "${gold} > 3" })).is_ok());
    }
}
