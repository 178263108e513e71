use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::runtime::blueprint::{Blueprint, ListMode, ListSettings, NodeIndex};
use crate::runtime::context::{Context, InstanceId, Services};
use crate::runtime::ending::Ending;
use crate::runtime::events::ListEvent;
use crate::runtime::node::ActionNode;
use crate::runtime::parameter::ParameterSet;
use crate::runtime::task::{Continuation, Step, Wake};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// Created or halted; nothing scheduled.
    Idle,
    Running,
    Paused,
    Finished,
}

/// One executing instance of a graph.
///
/// Branches advance through continuations: immediate ones are pumped in the
/// same call, deferred ones wait in `pending` until `update` finds them due.
#[derive(Debug)]
pub struct ActionList {
    id: InstanceId,
    graph_id: String,
    nodes: Vec<ActionNode>,
    parameters: ParameterSet,
    settings: ListSettings,
    default_start: NodeIndex,
    start_index: NodeIndex,
    conversation_on_end: Option<String>,
    state: ListState,
    pending: Vec<Continuation>,
    resume_indices: Vec<NodeIndex>,
    pause_requested: bool,
    is_skipping: bool,
    skip_hops: usize,
    template: Option<Arc<Blueprint>>,
}

impl ActionList {
    pub fn new(graph_id: impl Into<String>, nodes: Vec<ActionNode>, parameters: ParameterSet, settings: ListSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            graph_id: graph_id.into(),
            nodes,
            parameters,
            settings,
            default_start: 0,
            start_index: 0,
            conversation_on_end: None,
            state: ListState::Idle,
            pending: Vec::new(),
            resume_indices: Vec::new(),
            pause_requested: false,
            is_skipping: false,
            skip_hops: 0,
            template: None,
        }
    }

    pub(crate) fn from_template(template: Arc<Blueprint>, nodes: Vec<ActionNode>) -> Self {
        let mut list = Self::new(
            template.id.clone(),
            nodes,
            ParameterSet::new(template.parameters.clone()),
            template.settings.clone(),
        );
        list.default_start = template.start_index;
        list.template = Some(template);
        list
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    pub fn nodes(&self) -> &[ActionNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&ActionNode> {
        self.nodes.get(index)
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    pub fn settings(&self) -> &ListSettings {
        &self.settings
    }

    pub fn state(&self) -> ListState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ListState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == ListState::Paused
    }

    pub fn is_skipping(&self) -> bool {
        self.is_skipping
    }

    pub fn is_skippable(&self) -> bool {
        self.settings.is_skippable()
    }

    pub fn default_start(&self) -> NodeIndex {
        self.default_start
    }

    pub fn start_index(&self) -> NodeIndex {
        self.start_index
    }

    pub fn resume_indices(&self) -> &[NodeIndex] {
        &self.resume_indices
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn conversation_on_end(&self) -> Option<&str> {
        self.conversation_on_end.as_deref()
    }

    pub fn set_conversation_on_end(&mut self, conversation: Option<String>) {
        self.conversation_on_end = conversation;
    }

    pub(crate) fn template(&self) -> Option<&Arc<Blueprint>> {
        self.template.as_ref()
    }

    pub(crate) fn into_nodes(self) -> Vec<ActionNode> {
        self.nodes
    }

    /// Starts the list from `start_index`. A live run is killed first.
    pub fn interact(&mut self, start_index: NodeIndex, add_to_skip_queue: bool, sv: &mut Services<'_>) {
        if matches!(self.state, ListState::Running | ListState::Paused) {
            self.kill(sv);
        }
        if start_index >= self.nodes.len() {
            debug!(graph = %self.graph_id, start_index, "Nothing to run from this index");
            self.kill(sv);
            return;
        }

        self.reset_list();
        self.reset_skips();
        self.resume_indices.clear();
        self.pause_requested = false;
        self.start_index = start_index;
        self.state = ListState::Running;

        sv.registry.add_to_list(
            self.id,
            &self.graph_id,
            start_index,
            add_to_skip_queue && self.is_skippable(),
            self.conversation_on_end.clone(),
        );
        info!(instance_id = %self.id, graph = %self.graph_id, start_index, "Action list started");
        sv.events.emit(ListEvent::Begin {
            instance_id: self.id,
            graph_id: self.graph_id.clone(),
            start_index,
        });

        if self.settings.start_delay > 0.0 && start_index == 0 {
            let wake = self.deadline(self.settings.start_delay, sv);
            self.pending.push(Continuation::deferred(0, Step::Dispatch, None, wake));
        } else {
            self.pump(VecDeque::from([Continuation::now(start_index, Step::Dispatch, None)]), sv);
        }
    }

    /// Runs every remaining node to its final state within this call.
    pub fn skip(&mut self, start_index: NodeIndex, sv: &mut Services<'_>) {
        if start_index >= self.nodes.len() {
            self.kill(sv);
            return;
        }
        let was_active = matches!(self.state, ListState::Running | ListState::Paused);

        self.reset_list();
        if !was_active {
            // A new pass: memos left by earlier runs must not steer it.
            self.reset_skips();
        }
        self.resume_indices.clear();
        self.pause_requested = false;
        self.is_skipping = true;
        self.skip_hops = 0;
        self.start_index = start_index;
        self.state = ListState::Running;

        sv.registry.add_to_list(self.id, &self.graph_id, start_index, false, self.conversation_on_end.clone());
        if !was_active {
            sv.events.emit(ListEvent::Begin {
                instance_id: self.id,
                graph_id: self.graph_id.clone(),
                start_index,
            });
        }
        info!(instance_id = %self.id, graph = %self.graph_id, start_index, "Skipping action list");
        sv.events.emit(ListEvent::Skip {
            instance_id: self.id,
            graph_id: self.graph_id.clone(),
            start_index,
        });

        self.pump(VecDeque::from([Continuation::now(start_index, Step::Dispatch, None)]), sv);
    }

    /// Requests a pause. Takes effect once every in-flight node has finished.
    pub fn pause(&mut self, sv: &mut Services<'_>) {
        if self.state != ListState::Running || self.is_skipping {
            debug!(graph = %self.graph_id, state = ?self.state, "Pause ignored");
            return;
        }
        self.pause_requested = true;
        self.resume_indices.clear();

        // Deferred dispatches have not started their node yet; resume at their producer.
        // A fan-out producer would re-resolve every output on resume, so its
        // deferred branch is left to start and finish under the pause instead.
        for c in std::mem::take(&mut self.pending) {
            match (c.step, c.from) {
                (Step::Dispatch, Some(from)) if !self.nodes.get(from).is_some_and(ActionNode::run_all_outputs) => {
                    self.resume_indices.push(from)
                }
                _ => self.pending.push(c),
            }
        }
        if self.pending.is_empty() {
            self.finish_pause(sv);
        }
    }

    /// Continues a paused run. With no indices the list simply restarts from `start_index`.
    pub fn resume(
        &mut self,
        start_index: NodeIndex,
        resume_indices: &[NodeIndex],
        parameter_data: &str,
        rerun_actions: bool,
        sv: &mut Services<'_>,
    ) {
        if resume_indices.is_empty() {
            self.interact(start_index, true, sv);
            return;
        }
        if self.state == ListState::Running {
            warn!(graph = %self.graph_id, "Resuming a running list, killing the current run");
            self.kill(sv);
        }

        self.reset_list();
        self.resume_indices.clear();
        self.pause_requested = false;
        self.start_index = start_index;
        if !parameter_data.is_empty() {
            self.parameters.apply_snapshot(parameter_data);
        }
        self.state = ListState::Running;

        sv.registry.add_to_list(
            self.id,
            &self.graph_id,
            start_index,
            self.is_skippable(),
            self.conversation_on_end.clone(),
        );
        info!(instance_id = %self.id, graph = %self.graph_id, indices = ?resume_indices, "Action list resumed");
        sv.events.emit(ListEvent::Resume {
            instance_id: self.id,
            graph_id: self.graph_id.clone(),
        });

        let step = if rerun_actions { Step::Dispatch } else { Step::Resolve };
        let mut queue = VecDeque::new();
        for &index in resume_indices {
            if index < self.nodes.len() {
                queue.push_back(Continuation::now(index, step, None));
            } else {
                warn!(graph = %self.graph_id, index, "Resume index out of range, dropped");
            }
        }
        if queue.is_empty() {
            self.end_list(sv);
            return;
        }
        self.pump(queue, sv);
    }

    /// Terminates the run. Fires `End` only if the list was running or paused.
    pub fn kill(&mut self, sv: &mut Services<'_>) {
        let was_active = matches!(self.state, ListState::Running | ListState::Paused);
        self.reset_list();
        self.resume_indices.clear();
        self.pause_requested = false;
        self.state = ListState::Finished;
        sv.registry.end_list(self.id);
        if was_active {
            info!(instance_id = %self.id, graph = %self.graph_id, "Action list killed");
            sv.events.emit(ListEvent::End {
                instance_id: self.id,
                graph_id: self.graph_id.clone(),
                killed: true,
            });
        }
    }

    /// Stops all branches and clears running flags. Branch memos survive.
    pub fn reset_list(&mut self) {
        self.pending.clear();
        self.is_skipping = false;
        for node in &mut self.nodes {
            node.running = false;
        }
    }

    /// Forgets skip state: branch memos and the hop counter.
    pub fn reset_skips(&mut self) {
        self.skip_hops = 0;
        for node in &mut self.nodes {
            node.last_output = None;
        }
    }

    pub(crate) fn halt(&mut self) {
        self.reset_list();
        self.pause_requested = false;
        if self.state == ListState::Running {
            self.state = ListState::Idle;
        }
    }

    /// Per-tick driver: runs the continuations whose wake condition is met.
    pub fn update(&mut self, sv: &mut Services<'_>) {
        if self.state != ListState::Running || self.pending.is_empty() {
            return;
        }
        if !sv.registry.is_live(self.id) {
            warn!(instance_id = %self.id, graph = %self.graph_id, "List is no longer registered, halting");
            self.reset_list();
            self.state = ListState::Finished;
            return;
        }

        let (due, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|c| c.is_due(sv.clock));
        self.pending = waiting;
        if due.is_empty() {
            return;
        }

        if sv.scene_loading {
            if self.settings.survive_scene_change && !self.is_skippable() {
                info!(graph = %self.graph_id, "Terminated by scene change");
                self.kill(sv);
                return;
            }
            self.pending.extend(due);
            return;
        }
        self.pump(due.into(), sv);
    }

    fn pump(&mut self, mut queue: VecDeque<Continuation>, sv: &mut Services<'_>) {
        while let Some(next) = queue.pop_front() {
            if self.state != ListState::Running {
                return;
            }
            match next.step {
                Step::Dispatch => self.dispatch(next.node_index, &mut queue, sv),
                Step::Rerun => self.rerun(next.node_index, &mut queue, sv),
                Step::Resolve => self.finish(next.node_index, &mut queue, sv),
            }
        }
    }

    fn dispatch(&mut self, index: NodeIndex, queue: &mut VecDeque<Continuation>, sv: &mut Services<'_>) {
        if self.is_skipping {
            self.skip_hops += 1;
            let limit = self.nodes.len() * sv.config.skip_hop_factor.max(1);
            if self.skip_hops > limit {
                warn!(
                    instance_id = %self.id,
                    graph = %self.graph_id,
                    hops = self.skip_hops,
                    "Skip exceeded its hop limit, terminating looping graph"
                );
                self.kill(sv);
                return;
            }
        }

        let Some(node) = self.nodes.get(index) else {
            self.check_end(queue, sv);
            return;
        };
        if !node.is_runnable() {
            if node.enabled {
                debug!(graph = %self.graph_id, index, kind = %node.kind, "Node has no behaviour, passing over");
            }
            queue.push_back(Continuation::now(index + 1, Step::Dispatch, Some(index)));
            return;
        }

        let ActionList { id, graph_id, nodes, parameters, is_skipping, .. } = self;
        let node = &mut nodes[index];
        if !parameters.is_empty() {
            node.assign_values(parameters);
        }
        node.running = false;
        let mut ctx = Context::new(*id, graph_id, index, *is_skipping, sv);
        if *is_skipping {
            node.skip(&mut ctx);
            self.finish(index, queue, sv);
            return;
        }

        let (wait, running) = node.run(&mut ctx);
        if running && wait != 0.0 {
            self.suspend(index, wait, sv);
        } else {
            self.finish(index, queue, sv);
        }
    }

    fn rerun(&mut self, index: NodeIndex, queue: &mut VecDeque<Continuation>, sv: &mut Services<'_>) {
        let ActionList { id, graph_id, nodes, is_skipping, .. } = self;
        let Some(node) = nodes.get_mut(index) else {
            self.check_end(queue, sv);
            return;
        };
        let mut ctx = Context::new(*id, graph_id, index, *is_skipping, sv);
        let (wait, running) = node.run(&mut ctx);
        if running {
            self.suspend(index, wait, sv);
        } else {
            self.finish(index, queue, sv);
        }
    }

    fn suspend(&mut self, index: NodeIndex, wait: f32, sv: &mut Services<'_>) {
        let wake = if wait > 0.0 {
            self.deadline(wait, sv)
        } else {
            Wake::NextTick { hold_while_frozen: !self.runs_in_realtime(sv) }
        };
        self.pending.push(Continuation::deferred(index, Step::Rerun, Some(index), wake));
    }

    fn finish(&mut self, index: NodeIndex, queue: &mut VecDeque<Continuation>, sv: &mut Services<'_>) {
        let Some(node) = self.nodes.get_mut(index) else {
            self.check_end(queue, sv);
            return;
        };
        node.running = false;

        if self.pause_requested {
            self.resume_indices.push(index);
            if queue.is_empty() && self.pending.is_empty() {
                self.finish_pause(sv);
            }
            return;
        }

        let node = &self.nodes[index];
        let endings: Vec<Ending> = if node.run_all_outputs() && node.num_sockets() > 0 {
            node.endings.iter().take(node.num_sockets()).cloned().collect()
        } else {
            vec![self.resolve_ending(index, sv)]
        };

        let mut spawned = false;
        for ending in endings {
            if let Some(next) = self.process_ending(index, ending, sv) {
                spawned = true;
                if next.is_immediate() {
                    queue.push_back(next);
                } else {
                    self.pending.push(next);
                }
            }
        }
        if !spawned {
            self.check_end(queue, sv);
        }
    }

    fn resolve_ending(&mut self, index: NodeIndex, sv: &mut Services<'_>) -> Ending {
        let ActionList { id, graph_id, nodes, is_skipping, .. } = self;
        let node = &mut nodes[index];
        let sockets = node.num_sockets();
        if sockets == 0 {
            return Ending::Stop;
        }

        let memo = if *is_skipping && sockets > 1 { node.last_output.take() } else { None };
        let chosen = match memo {
            Some(output) => output as i32,
            None => {
                let ctx = Context::new(*id, graph_id, index, *is_skipping, sv);
                let output = node.next_output_index(&ctx);
                if !*is_skipping && output >= 0 {
                    node.last_output = Some(output as usize);
                }
                output
            }
        };

        match usize::try_from(chosen).ok().and_then(|i| node.endings.get(i)) {
            Some(ending) => ending.clone(),
            None => {
                warn!(graph = %graph_id, index, output = chosen, "Output index out of range, stopping branch");
                Ending::Stop
            }
        }
    }

    fn process_ending(&mut self, index: NodeIndex, ending: Ending, sv: &mut Services<'_>) -> Option<Continuation> {
        match ending {
            Ending::Stop => None,
            Ending::Continue => Some(Continuation::now(index + 1, Step::Dispatch, Some(index))),
            Ending::SkipTo(target) => {
                if target == index && !self.is_skipping {
                    // A node looping onto itself waits a tick between runs.
                    let wake = Wake::NextTick { hold_while_frozen: false };
                    Some(Continuation::deferred(target, Step::Dispatch, Some(index), wake))
                } else {
                    Some(Continuation::now(target, Step::Dispatch, Some(index)))
                }
            }
            Ending::RunGraph(graph_id) if graph_id == self.graph_id => {
                if self.settings.start_delay > 0.0 && !self.is_skipping {
                    let wake = self.deadline(self.settings.start_delay, sv);
                    Some(Continuation::deferred(0, Step::Dispatch, Some(index), wake))
                } else {
                    Some(Continuation::now(0, Step::Dispatch, Some(index)))
                }
            }
            Ending::RunGraph(graph_id) => {
                debug!(from = %self.graph_id, to = %graph_id, "Handing off to another graph");
                sv.syscall.start(graph_id, 0, true, self.is_skipping);
                None
            }
        }
    }

    fn check_end(&mut self, queue: &VecDeque<Continuation>, sv: &mut Services<'_>) {
        if self.state != ListState::Running || !queue.is_empty() || !self.pending.is_empty() {
            return;
        }
        if self.pause_requested && !self.resume_indices.is_empty() {
            self.finish_pause(sv);
        } else {
            self.end_list(sv);
        }
    }

    fn finish_pause(&mut self, sv: &mut Services<'_>) {
        self.pause_requested = false;
        self.is_skipping = false;
        self.state = ListState::Paused;
        sv.registry.mark_paused(self.id, self.resume_indices.clone(), self.parameters.to_snapshot());
        info!(instance_id = %self.id, graph = %self.graph_id, indices = ?self.resume_indices, "Action list paused");
        sv.events.emit(ListEvent::Pause {
            instance_id: self.id,
            graph_id: self.graph_id.clone(),
            resume_indices: self.resume_indices.clone(),
        });
    }

    fn end_list(&mut self, sv: &mut Services<'_>) {
        self.state = ListState::Finished;
        self.is_skipping = false;
        self.pause_requested = false;
        self.pending.clear();
        sv.registry.end_list(self.id);
        info!(instance_id = %self.id, graph = %self.graph_id, "Action list finished");
        sv.events.emit(ListEvent::End {
            instance_id: self.id,
            graph_id: self.graph_id.clone(),
            killed: false,
        });
        if let Some(conversation) = &self.conversation_on_end {
            sv.events.emit(ListEvent::ConversationOnEnd {
                instance_id: self.id,
                graph_id: self.graph_id.clone(),
                conversation: conversation.clone(),
            });
        }
    }

    fn unfreezes_pause_menus(&self, sv: &Services<'_>) -> bool {
        self.settings.unfreeze_pause_menus.unwrap_or(sv.config.unfreeze_pause_menus)
    }

    fn runs_in_realtime(&self, sv: &Services<'_>) -> bool {
        self.settings.mode == ListMode::PauseGameplay && !self.unfreezes_pause_menus(sv) && sv.clock.pause_menus_on()
    }

    fn deadline(&self, seconds: f32, sv: &Services<'_>) -> Wake {
        let realtime = self.runs_in_realtime(sv);
        let now = if realtime { sv.clock.real_time() } else { sv.clock.scaled_time() };
        Wake::At { deadline: now + f64::from(seconds), realtime }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::config::EngineConfig;
    use crate::nodes::common::WaitAction;
    use crate::nodes::flow::CycleAction;
    use crate::runtime::clock::Clock;
    use crate::runtime::events::EventBus;
    use crate::runtime::registry::ActiveListManager;
    use crate::runtime::syscall::Syscall;
    use crate::runtime::variables::Variables;

    #[derive(Default)]
    struct Parts {
        clock: Clock,
        variables: Variables,
        registry: ActiveListManager,
        events: EventBus,
        syscall: Syscall,
        config: EngineConfig,
    }

    impl Parts {
        fn services(&mut self) -> Services<'_> {
            Services {
                clock: &self.clock,
                variables: &self.variables,
                registry: &mut self.registry,
                events: &mut self.events,
                syscall: &mut self.syscall,
                config: &self.config,
                scene_loading: false,
            }
        }
    }

    fn cycle_then_wait() -> ActionList {
        let nodes = vec![
            ActionNode::new("cycle", Box::new(CycleAction::new(2, false)))
                .with_endings(vec![Ending::Continue, Ending::Stop]),
            ActionNode::new("wait", Box::new(WaitAction::new(1.0))),
        ];
        ActionList::new("memo", nodes, ParameterSet::default(), ListSettings::default())
    }

    fn memos(list: &ActionList) -> Vec<Option<usize>> {
        list.nodes().iter().map(ActionNode::last_output).collect()
    }

    #[test]
    fn reset_list_keeps_memos_and_reset_skips_is_idempotent() {
        let mut parts = Parts::default();
        let mut list = cycle_then_wait();
        list.interact(0, true, &mut parts.services());
        assert_eq!(list.state(), ListState::Running);
        assert_eq!(list.pending_count(), 1);
        assert!(list.node(1).unwrap().is_running());

        list.reset_list();
        assert_eq!(list.pending_count(), 0);
        assert!(!list.node(1).unwrap().is_running());
        assert_eq!(memos(&list), vec![Some(0), None]);

        list.reset_skips();
        let once = memos(&list);
        list.reset_skips();
        assert_eq!(memos(&list), once);
        assert_eq!(once, vec![None, None]);
    }

    #[test]
    fn update_halts_lists_missing_from_registry() {
        let mut parts = Parts::default();
        let mut list = cycle_then_wait();
        list.interact(0, true, &mut parts.services());
        parts.registry.clear();
        parts.clock.advance(Duration::from_secs(2));

        list.update(&mut parts.services());

        assert_eq!(list.state(), ListState::Finished);
        assert_eq!(list.pending_count(), 0);
    }

    #[test]
    fn pause_converts_deferred_dispatch_into_resume_point() {
        let mut parts = Parts::default();
        let nodes = vec![ActionNode::new("wait", Box::new(WaitAction::new(0.0))).with_endings(vec![Ending::SkipTo(0)])];
        let mut list = ActionList::new("loop", nodes, ParameterSet::default(), ListSettings::default());
        list.interact(0, true, &mut parts.services());
        assert_eq!(list.pending_count(), 1);

        list.pause(&mut parts.services());

        assert_eq!(list.state(), ListState::Paused);
        assert_eq!(list.resume_indices(), &[0]);
        assert!(parts.registry.records()[0].is_paused());
    }
}
