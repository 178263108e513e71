use std::fmt::Debug;
use serde_json::Value;
use anyhow::Result;
use crate::runtime::blueprint::BlueprintNode;
use crate::runtime::context::Context;
use crate::runtime::ending::Ending;
use crate::runtime::parameter::ParameterSet;

/// Returned from `run` by a node that wants to be polled again on the next tick.
pub const WAIT_NEXT_TICK: f32 = -1.0;

/// Behaviour of one node kind.
///
/// `run` returns how long to wait before it is called again. The node stays
/// suspended only while it marks itself running through the context.
pub trait Action: ActionClone + Debug + Send {
    /// Number of output sockets. Zero means the branch always stops here.
    fn num_sockets(&self) -> usize {
        1
    }

    /// Follow every ending at once instead of picking one.
    fn run_all_outputs(&self) -> bool {
        false
    }

    /// Pull bound parameter values into fields before each run.
    fn assign_values(&mut self, _params: &ParameterSet) {}

    fn run(&mut self, ctx: &mut Context<'_>) -> f32;

    /// Reach the final state synchronously.
    fn skip(&mut self, ctx: &mut Context<'_>) {
        self.run(ctx);
        ctx.set_running(false);
    }

    fn next_output_index(&mut self, _ctx: &Context<'_>) -> i32 {
        0
    }
}

pub trait ActionClone {
    fn clone_box(&self) -> Box<dyn Action>;
}

impl<T> ActionClone for T
where
    T: 'static + Action + Clone,
{
    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Action> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Factory for one node kind, keyed by `name`.
pub trait ActionDefinition: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    fn prepare(&self, params: Value) -> Result<Box<dyn Action>>;
}

/// A node slot inside an instance: template data plus live behaviour.
#[derive(Debug, Clone)]
pub struct ActionNode {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub enabled: bool,
    pub endings: Vec<Ending>,
    pub(crate) running: bool,
    pub(crate) last_output: Option<usize>,
    behaviour: Option<Box<dyn Action>>,
}

impl ActionNode {
    pub fn new(kind: impl Into<String>, behaviour: Box<dyn Action>) -> Self {
        Self {
            id: String::new(),
            kind: kind.into(),
            title: String::new(),
            enabled: true,
            endings: vec![Ending::Continue],
            running: false,
            last_output: None,
            behaviour: Some(behaviour),
        }
    }

    /// Template node whose factory failed or is unknown. It is passed over like a disabled one.
    pub fn from_blueprint(node: &BlueprintNode, behaviour: Option<Box<dyn Action>>) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind.clone(),
            title: node.title.clone(),
            enabled: node.enabled,
            endings: node.endings.clone(),
            running: false,
            last_output: None,
            behaviour,
        }
    }

    pub fn with_endings(mut self, endings: Vec<Ending>) -> Self {
        self.endings = endings;
        self
    }

    pub fn is_runnable(&self) -> bool {
        self.enabled && self.behaviour.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_output(&self) -> Option<usize> {
        self.last_output
    }

    pub fn behaviour(&self) -> Option<&dyn Action> {
        self.behaviour.as_deref()
    }

    pub fn num_sockets(&self) -> usize {
        self.behaviour.as_ref().map_or(0, |b| b.num_sockets())
    }

    pub fn run_all_outputs(&self) -> bool {
        self.behaviour.as_ref().is_some_and(|b| b.run_all_outputs())
    }

    pub(crate) fn assign_values(&mut self, params: &ParameterSet) {
        if let Some(behaviour) = self.behaviour.as_mut() {
            behaviour.assign_values(params);
        }
    }

    pub(crate) fn run(&mut self, ctx: &mut Context<'_>) -> (f32, bool) {
        let Some(behaviour) = self.behaviour.as_mut() else {
            self.running = false;
            return (0.0, false);
        };
        ctx.set_running(self.running);
        let wait = behaviour.run(ctx);
        self.running = ctx.is_running();
        (wait, self.running)
    }

    pub(crate) fn skip(&mut self, ctx: &mut Context<'_>) {
        if let Some(behaviour) = self.behaviour.as_mut() {
            ctx.set_running(false);
            behaviour.skip(ctx);
        }
        self.running = false;
    }

    pub(crate) fn next_output_index(&mut self, ctx: &Context<'_>) -> i32 {
        self.behaviour.as_mut().map_or(0, |b| b.next_output_index(ctx))
    }
}
